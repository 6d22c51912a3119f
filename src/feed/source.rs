//! Samples and the collaborators that produce and annotate them

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::error::{JudgeError, SourceError};

/// One observed change, ranked by `size`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Unified diff of the change
    pub diff: String,
    /// Edit summary left by the author
    pub comment: String,
    /// Author of the change
    pub user: String,
    /// Judge annotation, set at most once before aggregation
    pub review: Option<String>,
    /// Magnitude of the change in bytes
    pub size: u64,
}

impl Sample {
    pub fn new(
        diff: impl Into<String>,
        comment: impl Into<String>,
        user: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            diff: diff.into(),
            comment: comment.into(),
            user: user.into(),
            review: None,
            size,
        }
    }

    /// Sample carrying only a magnitude
    pub fn sized(size: u64) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    /// Prompt handed to the judge: the diff followed by the edit summary.
    pub fn review_prompt(&self) -> String {
        format!("{}\ncomment: {}", self.diff, self.comment)
    }
}

/// Produces the largest change observed since a point in time.
#[async_trait]
pub trait Source: Send + Sync {
    /// Fetch the top change made after `window_start`.
    ///
    /// Called once per cycle and may be cancelled at any await point.
    async fn fetch_top(&self, window_start: DateTime<Utc>) -> Result<Sample, SourceError>;
}

/// Annotates a sample with a free-text review.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Produce an annotation for `prompt`, finishing before `deadline`.
    async fn annotate(&self, deadline: Instant, prompt: &str) -> Result<String, JudgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_prompt() {
        let sample = Sample::new("-a\n+b", "typo", "alice", 1);
        assert_eq!(sample.review_prompt(), "-a\n+b\ncomment: typo");
    }

    #[test]
    fn test_new_sample_is_unannotated() {
        let sample = Sample::new("d", "c", "u", 12);
        assert!(sample.review.is_none());
        assert_eq!(sample.size, 12);
    }
}
