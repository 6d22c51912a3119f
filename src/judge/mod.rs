//! Review Judge
//!
//! Production [`Judge`](crate::feed::Judge) asking Gemini for a light-hearted
//! code review of each edit.

mod gemini;

pub use gemini::{GeminiConfig, GeminiJudge};
