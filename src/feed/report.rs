//! Reports and their wire payload
//!
//! A report is an immutable snapshot of the largest sample in each window.
//! The JSON shape sent to clients is
//! `{"minute": {...}, "hour": {...}, "day": {...}}` where each entry has
//! `diffstring`, `comment`, `user` and `review`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::source::Sample;

/// Report shared between the pipeline, the broker and every subscriber
pub type SharedReport = Arc<Report>;

/// Largest sample per window at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub short: Sample,
    pub medium: Sample,
    pub long: Sample,
    /// When the report was built
    pub built_at: DateTime<Utc>,
}

impl Report {
    pub fn new(short: Sample, medium: Sample, long: Sample) -> Self {
        Self {
            short,
            medium,
            long,
            built_at: Utc::now(),
        }
    }

    /// Sizes as `(short, medium, long)`
    pub fn sizes(&self) -> (u64, u64, u64) {
        (self.short.size, self.medium.size, self.long.size)
    }

    /// Borrowing view in the wire shape
    pub fn to_payload(&self) -> ReportPayload<'_> {
        ReportPayload {
            minute: DiffPayload::from(&self.short),
            hour: DiffPayload::from(&self.medium),
            day: DiffPayload::from(&self.long),
        }
    }

    /// Serialize the wire payload.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_payload())
    }
}

/// Wire payload for a report
#[derive(Debug, Serialize)]
pub struct ReportPayload<'a> {
    pub minute: DiffPayload<'a>,
    pub hour: DiffPayload<'a>,
    pub day: DiffPayload<'a>,
}

/// Wire payload for one window's sample
#[derive(Debug, Serialize)]
pub struct DiffPayload<'a> {
    #[serde(rename = "diffstring")]
    pub diff_string: &'a str,
    pub comment: &'a str,
    pub user: &'a str,
    pub review: Option<&'a str>,
}

impl<'a> From<&'a Sample> for DiffPayload<'a> {
    fn from(sample: &'a Sample) -> Self {
        Self {
            diff_string: &sample.diff,
            comment: &sample.comment,
            user: &sample.user,
            review: sample.review.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let mut reviewed = Sample::new("+x", "added x", "bob", 40);
        reviewed.review = Some("nit: spacing".to_string());
        let report = Report::new(
            Sample::new("+a", "fix", "alice", 10),
            Sample::new("+b", "more", "carol", 20),
            reviewed,
        );

        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["minute"]["diffstring"], "+a");
        assert_eq!(value["minute"]["comment"], "fix");
        assert_eq!(value["minute"]["user"], "alice");
        assert!(value["minute"]["review"].is_null());
        assert_eq!(value["hour"]["user"], "carol");
        assert_eq!(value["day"]["review"], "nit: spacing");

        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 3);
        assert!(value["day"].get("size").is_none());
    }

    #[test]
    fn test_sizes() {
        let report = Report::new(Sample::sized(1), Sample::sized(2), Sample::sized(3));
        assert_eq!(report.sizes(), (1, 2, 3));
    }
}
