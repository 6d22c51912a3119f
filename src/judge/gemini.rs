//! Gemini Judge
//!
//! Reviews an edit the way a senior developer reviews a pull request, using
//! the `generateContent` REST endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::feed::{Judge, JudgeError};

const SYSTEM_INSTRUCTION: &str = "\
Act as a senior dev doing code review on a pull request, except the change is \
an edit to a Wikipedia article. Keep it light: your teammates enjoy some ribbing. \
The input is a unified diff followed by a line starting with \"comment: \", \
which you should read as the commit message. \
Reply with two or three short sentences about the change itself, then finish \
with a short list of conventional-comment items (nit, suggestion, issue). \
Answer in plain text only, without JSON, YAML or escape sequences.";

/// Configuration for the Gemini judge
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub max_output_tokens: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: String::new(),
            max_output_tokens: 100,
        }
    }
}

/// [`Judge`] backed by Google's Gemini API
pub struct GeminiJudge {
    client: Client,
    config: GeminiConfig,
}

impl GeminiJudge {
    pub fn new(config: GeminiConfig) -> Result<Self, JudgeError> {
        if config.api_key.is_empty() {
            return Err(JudgeError::MissingApiKey);
        }
        let client = Client::builder()
            .build()
            .map_err(|e| JudgeError::Request(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn request_body<'a>(&self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            system_instruction: Content {
                parts: vec![Part {
                    text: SYSTEM_INSTRUCTION,
                }],
            },
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.config.max_output_tokens,
            },
        }
    }
}

#[async_trait]
impl Judge for GeminiJudge {
    async fn annotate(&self, deadline: Instant, prompt: &str) -> Result<String, JudgeError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(JudgeError::Timeout);
        }

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .timeout(remaining)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    JudgeError::Timeout
                } else {
                    JudgeError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(JudgeError::Status(status.as_u16()));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| JudgeError::Request(e.to_string()))?;
        let review = body.text();
        tracing::debug!(chars = review.len(), "Received review");

        if review.trim().is_empty() {
            return Err(JudgeError::EmptyResponse);
        }
        Ok(review)
    }
}

// ============================================
// Request/Response DTOs
// ============================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    /// All candidate parts concatenated
    fn text(&self) -> String {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .map(|p| p.text.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn judge() -> GeminiJudge {
        GeminiJudge::new(GeminiConfig {
            api_key: "test-key".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_missing_key_rejected() {
        let err = GeminiJudge::new(GeminiConfig::default()).err().unwrap();
        assert!(matches!(err, JudgeError::MissingApiKey));
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            judge().endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let judge = judge();
        let value = serde_json::to_value(judge.request_body("-a\n+b\ncomment: fix")).unwrap();

        assert_eq!(value["contents"][0]["parts"][0]["text"], "-a\n+b\ncomment: fix");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 100);
        assert!(value["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("senior dev"));
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let json = r#"{"candidates": [
            {"content": {"parts": [{"text": "Nice cleanup. "}, {"text": "nit: typo"}]}},
            {"finishReason": "SAFETY"}
        ]}"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), "Nice cleanup. nit: typo");

        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.text(), "");
    }

    #[tokio::test]
    async fn test_expired_deadline_times_out() {
        let deadline = Instant::now() - Duration::from_millis(1);
        let err = judge().annotate(deadline, "prompt").await.unwrap_err();
        assert!(matches!(err, JudgeError::Timeout));
    }
}
