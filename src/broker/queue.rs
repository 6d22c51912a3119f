//! Per-subscriber bounded queue
//!
//! Pushing never blocks: when the queue is full the oldest value is dropped
//! to make room, so a stalled consumer only ever loses its own backlog.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Notify;
use uuid::Uuid;

/// Identifier of one subscription
pub type SubscriberId = Uuid;

/// Why [`Subscription::try_recv`] returned nothing
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    #[error("No value available")]
    Empty,

    #[error("Subscription closed")]
    Closed,
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
    dropped: u64,
}

pub(crate) struct SubscriberQueue<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
    capacity: usize,
}

impl<T> SubscriberQueue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
                dropped: 0,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue `value`. Returns `false` when an older value had to be dropped.
    pub(crate) fn push(&self, value: T) -> bool {
        let mut state = self.lock();
        if state.closed {
            return true;
        }
        let mut kept_all = true;
        if state.items.len() >= self.capacity {
            state.items.pop_front();
            state.dropped += 1;
            kept_all = false;
        }
        state.items.push_back(value);
        drop(state);

        self.notify.notify_one();
        kept_all
    }

    /// Mark the queue closed; queued values stay readable.
    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    /// Mark the queue closed and discard anything queued.
    pub(crate) fn close_and_clear(&self) {
        {
            let mut state = self.lock();
            state.closed = true;
            state.items.clear();
        }
        self.notify.notify_one();
    }

    fn try_pop(&self) -> Result<T, TryRecvError> {
        let mut state = self.lock();
        match state.items.pop_front() {
            Some(value) => Ok(value),
            None if state.closed => Err(TryRecvError::Closed),
            None => Err(TryRecvError::Empty),
        }
    }

    async fn pop(&self) -> Option<T> {
        loop {
            match self.try_pop() {
                Ok(value) => return Some(value),
                Err(TryRecvError::Closed) => return None,
                Err(TryRecvError::Empty) => self.notify.notified().await,
            }
        }
    }

    fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Receiving end of a broker registration.
///
/// Also the handle passed back to
/// [`Broker::unsubscribe`](super::Broker::unsubscribe).
pub struct Subscription<T> {
    id: SubscriberId,
    queue: std::sync::Arc<SubscriberQueue<T>>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(id: SubscriberId, queue: std::sync::Arc<SubscriberQueue<T>>) -> Self {
        Self { id, queue }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next value. `None` once unsubscribed or the broker stopped
    /// and the backlog is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.queue.pop().await
    }

    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.queue.try_pop()
    }

    /// Values discarded because this subscriber fell behind
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn subscription(capacity: usize) -> (Arc<SubscriberQueue<u32>>, Subscription<u32>) {
        let queue = Arc::new(SubscriberQueue::new(capacity));
        let sub = Subscription::new(Uuid::new_v4(), Arc::clone(&queue));
        (queue, sub)
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let (queue, mut sub) = subscription(2);
        assert!(queue.push(1));
        assert!(queue.push(2));
        assert!(!queue.push(3));

        assert_eq!(sub.try_recv(), Ok(2));
        assert_eq!(sub.try_recv(), Ok(3));
        assert_eq!(sub.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(sub.dropped(), 1);
    }

    #[test]
    fn test_close_keeps_backlog() {
        let (queue, mut sub) = subscription(4);
        queue.push(1);
        queue.close();
        queue.push(2);

        assert!(sub.is_closed());
        assert_eq!(sub.try_recv(), Ok(1));
        assert_eq!(sub.try_recv(), Err(TryRecvError::Closed));
    }

    #[test]
    fn test_close_and_clear_discards_backlog() {
        let (queue, mut sub) = subscription(4);
        queue.push(1);
        queue.close_and_clear();
        assert_eq!(sub.try_recv(), Err(TryRecvError::Closed));
    }

    #[tokio::test]
    async fn test_recv_wakes_on_push() {
        let (queue, mut sub) = subscription(4);
        let waiter = tokio::spawn(async move { sub.recv().await });

        tokio::task::yield_now().await;
        queue.push(42);

        assert_eq!(waiter.await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn test_recv_ends_on_close() {
        let (queue, mut sub) = subscription(4);
        let waiter = tokio::spawn(async move { sub.recv().await });

        tokio::task::yield_now().await;
        queue.close();

        assert_eq!(waiter.await.unwrap(), None);
    }
}
