//! Feed
//!
//! Samples the largest recent change on a timer, keeps the largest sample
//! per window and publishes a report after every successful cycle.
//!
//! ## Architecture
//!
//! - **RingBuffer**: fixed-capacity circular store backing one window
//! - **WindowedAggregator**: short/medium/long windows fed with every sample
//! - **Pipeline**: fetch → judge → aggregate → publish, under a deadline
//! - **forward_reports**: drains pipeline reports into the broker
//!
//! ## Data Flow
//!
//! 1. The pipeline ticks and asks the [`Source`] for the top change
//! 2. The optional [`Judge`] reviews it within its own budget
//! 3. The aggregator folds the sample in and builds a [`Report`]
//! 4. The report replaces the previous one on the pipeline's watch channel

mod error;
mod forward;
mod pipeline;
mod report;
mod ring_buffer;
mod source;
mod windows;

pub use error::{FeedError, FeedResult, JudgeError, SourceError};
pub use forward::forward_reports;
pub use pipeline::{Pipeline, PipelineConfig};
pub use report::{DiffPayload, Report, ReportPayload, SharedReport};
pub use ring_buffer::RingBuffer;
pub use source::{Judge, Sample, Source};
pub use windows::{WindowCapacities, WindowSpans, WindowedAggregator};
