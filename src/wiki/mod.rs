//! Wikipedia Source
//!
//! Production [`Source`](crate::feed::Source): picks the recent main-namespace
//! edit with the largest byte delta and returns its unified diff.

mod client;
mod parse;
mod types;

pub use client::{WikiClient, WikiConfig};
pub use parse::{longest_change, parse_diff_text};
pub use types::{CompareResponse, Comparison, RecentChange, RecentChangesResponse};
