//! Fixed-capacity ring buffer
//!
//! Backs one aggregation window. Writes never fail: once the buffer is full,
//! each write overwrites the slot `capacity` positions behind it.

/// Circular store of the last `capacity` values written.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    /// Backing slots, grown up to `capacity` and then overwritten in place
    slots: Vec<T>,
    /// Next slot to write
    cursor: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            slots: Vec::with_capacity(capacity),
            cursor: 0,
            capacity,
        }
    }

    /// Store `value` at the cursor and advance it modulo capacity.
    pub fn write(&mut self, value: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(value);
        } else {
            self.slots[self.cursor] = value;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    /// Current contents in raw slot order.
    ///
    /// This is not recency order once the buffer has wrapped; callers that
    /// need chronology have to rotate by the cursor themselves.
    pub fn items(&self) -> &[T] {
        &self.slots
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
