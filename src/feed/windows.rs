//! Windowed max aggregation
//!
//! Three ring buffers of increasing capacity receive every sample. Because
//! each write lands in all three at once, the short window's history is
//! always a suffix of the medium window's, which is a suffix of the long
//! window's, so the per-window maxima are nested.

use std::time::Duration;

use super::error::{FeedError, FeedResult};
use super::report::Report;
use super::ring_buffer::RingBuffer;
use super::source::Sample;

/// Window lengths expressed as durations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpans {
    pub short: Duration,
    pub medium: Duration,
    pub long: Duration,
}

impl Default for WindowSpans {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(60),
            medium: Duration::from_secs(60 * 60),
            long: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Window lengths expressed as sample counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCapacities {
    pub short: usize,
    pub medium: usize,
    pub long: usize,
}

impl WindowCapacities {
    pub fn new(short: usize, medium: usize, long: usize) -> Self {
        Self {
            short,
            medium,
            long,
        }
    }

    /// Number of samples each window holds when one sample arrives per
    /// `interval`. Partial intervals round up; every window holds at least one.
    pub fn from_spans(interval: Duration, spans: WindowSpans) -> FeedResult<Self> {
        if interval.is_zero() {
            return Err(FeedError::InvalidWindows(
                "sampling interval must be non-zero".to_string(),
            ));
        }
        let slots = |span: Duration| -> usize {
            let n = span.as_nanos().div_ceil(interval.as_nanos());
            usize::try_from(n).unwrap_or(usize::MAX).max(1)
        };
        let capacities = Self::new(slots(spans.short), slots(spans.medium), slots(spans.long));
        capacities.validate()?;
        Ok(capacities)
    }

    /// Capacities must be non-zero and non-decreasing.
    pub fn validate(&self) -> FeedResult<()> {
        if self.short == 0 || self.medium == 0 || self.long == 0 {
            return Err(FeedError::InvalidWindows(format!(
                "capacities must be non-zero, got {}/{}/{}",
                self.short, self.medium, self.long
            )));
        }
        if self.short > self.medium || self.medium > self.long {
            return Err(FeedError::InvalidWindows(format!(
                "capacities must be nested, got {}/{}/{}",
                self.short, self.medium, self.long
            )));
        }
        Ok(())
    }
}

impl Default for WindowCapacities {
    fn default() -> Self {
        Self::new(1, 60, 1440)
    }
}

/// Tracks the largest sample over a short, medium and long window
#[derive(Debug, Clone)]
pub struct WindowedAggregator {
    short: RingBuffer<Sample>,
    medium: RingBuffer<Sample>,
    long: RingBuffer<Sample>,
}

impl WindowedAggregator {
    pub fn new(capacities: WindowCapacities) -> FeedResult<Self> {
        capacities.validate()?;
        Ok(Self {
            short: RingBuffer::new(capacities.short),
            medium: RingBuffer::new(capacities.medium),
            long: RingBuffer::new(capacities.long),
        })
    }

    pub fn capacities(&self) -> WindowCapacities {
        WindowCapacities::new(
            self.short.capacity(),
            self.medium.capacity(),
            self.long.capacity(),
        )
    }

    /// Record `sample` in every window.
    pub fn update(&mut self, sample: Sample) {
        self.short.write(sample.clone());
        self.medium.write(sample.clone());
        self.long.write(sample);
    }

    /// Largest sample per window, or `None` before the first update.
    pub fn report(&self) -> Option<Report> {
        let short = max_by_size(self.short.items())?;
        let medium = max_by_size(self.medium.items())?;
        let long = max_by_size(self.long.items())?;

        let nested = short.size <= medium.size && medium.size <= long.size;
        debug_assert!(
            nested,
            "window maxima not nested: {} / {} / {}",
            short.size, medium.size, long.size
        );
        if !nested {
            tracing::error!(
                short = short.size,
                medium = medium.size,
                long = long.size,
                "Window maxima not nested"
            );
        }

        Some(Report::new(short.clone(), medium.clone(), long.clone()))
    }

    /// Raw contents of each window as `(short, medium, long)`
    pub fn windows(&self) -> (&[Sample], &[Sample], &[Sample]) {
        (self.short.items(), self.medium.items(), self.long.items())
    }
}

/// First sample with the largest size, in scan order.
fn max_by_size(samples: &[Sample]) -> Option<&Sample> {
    samples.iter().fold(None, |best, sample| match best {
        Some(b) if b.size >= sample.size => Some(b),
        _ => Some(sample),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feeds `rounds` runs of 60 increasing sizes, each run starting one
    /// step of 10 below the previous.
    fn drive_rounds(aggregator: &mut WindowedAggregator, first_baseline: u64, rounds: usize) {
        let mut baseline = first_baseline;
        for _ in 0..rounds {
            for i in 1..=60 {
                aggregator.update(Sample::sized(baseline + i));
                let report = aggregator.report().unwrap();
                let (short, medium, long) = report.sizes();
                assert!(short <= medium && medium <= long);
            }
            baseline = baseline.saturating_sub(10);
        }
    }

    #[test]
    fn test_empty_aggregator_has_no_report() {
        let aggregator = WindowedAggregator::new(WindowCapacities::default()).unwrap();
        assert!(aggregator.report().is_none());
    }

    #[test]
    fn test_long_window_keeps_older_peak() {
        let mut aggregator = WindowedAggregator::new(WindowCapacities::new(1, 60, 1440)).unwrap();

        // Runs 101..160, 91..150, ..., 1..60
        drive_rounds(&mut aggregator, 100, 11);

        let report = aggregator.report().unwrap();
        assert_eq!(report.short, Sample::sized(60));
        assert_eq!(report.medium, Sample::sized(60));
        assert_eq!(report.long, Sample::sized(160));
    }

    #[test]
    fn test_full_day_of_rounds() {
        let mut aggregator = WindowedAggregator::new(WindowCapacities::new(1, 60, 1440)).unwrap();

        // 24 runs from 241..300 down to 11..70 exactly fill the long window
        drive_rounds(&mut aggregator, 240, 24);

        let report = aggregator.report().unwrap();
        assert_eq!(report.sizes(), (70, 70, 300));

        // One more run evicts the first 60 samples from the long window
        drive_rounds(&mut aggregator, 0, 1);
        let report = aggregator.report().unwrap();
        assert_eq!(report.sizes(), (60, 60, 290));
    }

    #[test]
    fn test_nesting_holds_for_arbitrary_sequence() {
        let mut aggregator = WindowedAggregator::new(WindowCapacities::new(3, 7, 20)).unwrap();

        // Small LCG so the sequence is deterministic
        let mut state: u64 = 0x2545_f491;
        for _ in 0..500 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            aggregator.update(Sample::sized((state >> 33) % 1000));

            let (short, medium, long) = aggregator.report().unwrap().sizes();
            assert!(short <= medium, "short {} > medium {}", short, medium);
            assert!(medium <= long, "medium {} > long {}", medium, long);
        }
    }

    #[test]
    fn test_ties_pick_first_in_scan_order() {
        let mut aggregator = WindowedAggregator::new(WindowCapacities::new(1, 3, 3)).unwrap();
        aggregator.update(Sample::new("first", "", "a", 5));
        aggregator.update(Sample::new("second", "", "b", 5));
        aggregator.update(Sample::new("third", "", "c", 1));

        let report = aggregator.report().unwrap();
        assert_eq!(report.medium.diff, "first");
        assert_eq!(report.long.diff, "first");
        assert_eq!(report.short.diff, "third");
    }

    #[test]
    fn test_update_writes_every_window() {
        let mut aggregator = WindowedAggregator::new(WindowCapacities::new(1, 2, 4)).unwrap();
        aggregator.update(Sample::sized(1));
        aggregator.update(Sample::sized(2));

        let (short, medium, long) = aggregator.windows();
        assert_eq!(short, &[Sample::sized(2)]);
        assert_eq!(medium, &[Sample::sized(1), Sample::sized(2)]);
        assert_eq!(long, &[Sample::sized(1), Sample::sized(2)]);
    }

    #[test]
    fn test_capacities_from_spans() {
        let caps =
            WindowCapacities::from_spans(Duration::from_secs(60), WindowSpans::default()).unwrap();
        assert_eq!(caps, WindowCapacities::new(1, 60, 1440));

        let caps =
            WindowCapacities::from_spans(Duration::from_secs(30), WindowSpans::default()).unwrap();
        assert_eq!(caps, WindowCapacities::new(2, 120, 2880));

        // 70s ticks: partial intervals round up, never below one slot
        let caps =
            WindowCapacities::from_spans(Duration::from_secs(70), WindowSpans::default()).unwrap();
        assert_eq!(caps, WindowCapacities::new(1, 52, 1235));
    }

    #[test]
    fn test_invalid_capacities_rejected() {
        let err = WindowedAggregator::new(WindowCapacities::new(0, 60, 1440)).unwrap_err();
        assert!(matches!(err, FeedError::InvalidWindows(_)));

        let err = WindowedAggregator::new(WindowCapacities::new(1, 100, 50)).unwrap_err();
        assert!(matches!(err, FeedError::InvalidWindows(_)));

        let err = WindowCapacities::from_spans(Duration::ZERO, WindowSpans::default()).unwrap_err();
        assert!(matches!(err, FeedError::InvalidWindows(_)));
    }
}
