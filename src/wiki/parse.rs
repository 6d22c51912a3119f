//! Turning MediaWiki responses into samples

use super::types::{Comparison, RecentChange};
use crate::feed::SourceError;

const BODY_PREFIX: &str = "<tr><td colspan=\"4\"><pre>";
const BODY_SUFFIX: &str = "</pre></td></tr>";

/// Unified diff text from a unified-format compare body, with a git-style
/// header naming the page.
pub fn parse_diff_text(comparison: &Comparison) -> Result<String, SourceError> {
    let diff = comparison
        .body
        .strip_prefix(BODY_PREFIX)
        .ok_or_else(|| SourceError::Parse("compare body missing <pre> prefix".to_string()))?;
    let diff = diff
        .strip_suffix(BODY_SUFFIX)
        .ok_or_else(|| SourceError::Parse("compare body missing </pre> suffix".to_string()))?;

    let title = &comparison.from_title;
    Ok(format!("diff --git a/{title} a/{title}\n\n{diff}"))
}

/// Change with the largest byte delta; the first one wins ties.
pub fn longest_change(changes: &[RecentChange]) -> Option<&RecentChange> {
    changes.iter().fold(None, |best, change| match best {
        Some(b) if b.size() >= change.size() => Some(b),
        _ => Some(change),
    })
}
