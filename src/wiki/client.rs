//! Wikipedia API Client
//!
//! Finds the largest edit since a point in time and fetches its unified diff.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::parse::{longest_change, parse_diff_text};
use super::types::{CompareResponse, RecentChangesResponse};
use crate::feed::{Sample, Source, SourceError};

/// Configuration for the Wikipedia client
#[derive(Debug, Clone)]
pub struct WikiConfig {
    /// MediaWiki action API endpoint
    pub api_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// User-Agent sent with every request
    pub user_agent: String,
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            api_url: "https://en.wikipedia.org/w/api.php".to_string(),
            request_timeout: Duration::from_secs(10),
            user_agent: format!("widiff/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// [`Source`] backed by the MediaWiki action API
pub struct WikiClient {
    client: Client,
    config: WikiConfig,
}

impl WikiClient {
    pub fn new(config: WikiConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SourceError::Request(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &WikiConfig {
        &self.config
    }

    /// Main-namespace edits made after `since`
    pub async fn recent_changes(
        &self,
        since: DateTime<Utc>,
    ) -> Result<RecentChangesResponse, SourceError> {
        let rcend = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        tracing::debug!(rcend = %rcend, "Requesting recent changes");

        let response = self
            .client
            .get(&self.config.api_url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("list", "recentchanges"),
                ("rcnamespace", "0"),
                ("rctype", "edit"),
                ("rclimit", "500"),
                ("rcprop", "title|timestamp|ids|sizes|parsedcomment"),
                ("rcend", rcend.as_str()),
            ])
            .send()
            .await
            .map_err(map_request_error)?;

        read_json(response).await
    }

    /// Unified diff between two revisions of `title`
    pub async fn compare(
        &self,
        title: &str,
        from_rev: u64,
        to_rev: u64,
    ) -> Result<CompareResponse, SourceError> {
        let from_rev = from_rev.to_string();
        let to_rev = to_rev.to_string();
        tracing::debug!(title, from_rev = %from_rev, to_rev = %to_rev, "Requesting diff");

        let response = self
            .client
            .get(&self.config.api_url)
            .header(header::ACCEPT, "application/json")
            .query(&[
                ("action", "compare"),
                ("format", "json"),
                ("formatversion", "2"),
                ("fromtitle", title),
                ("fromrev", from_rev.as_str()),
                ("totitle", title),
                ("torev", to_rev.as_str()),
                ("difftype", "unified"),
                ("prop", "diff|ids|title|user|comment"),
                ("utf8", "1"),
            ])
            .send()
            .await
            .map_err(map_request_error)?;

        read_json(response).await
    }
}

#[async_trait]
impl Source for WikiClient {
    async fn fetch_top(&self, window_start: DateTime<Utc>) -> Result<Sample, SourceError> {
        let recent = self.recent_changes(window_start).await?;
        let changes = &recent.query.recent_changes;
        tracing::debug!(changes = changes.len(), "Received recent changes");

        let longest = longest_change(changes).ok_or(SourceError::NoChanges)?;
        let compared = self
            .compare(&longest.title, longest.old_rev_id, longest.rev_id)
            .await?
            .compare;
        let diff = parse_diff_text(&compared)?;

        let comment = if compared.to_comment.is_empty() {
            longest.parsed_comment.clone()
        } else {
            compared.to_comment
        };

        Ok(Sample::new(diff, comment, compared.to_user, longest.size()))
    }
}

fn map_request_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Request(e.to_string())
    }
}

/// Decode a JSON body, rejecting error statuses and HTML error pages.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, SourceError> {
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.contains("application/json") {
        return Err(SourceError::Parse(format!(
            "expected JSON response, got {content_type:?}"
        )));
    }

    let body = response.text().await.map_err(map_request_error)?;
    serde_json::from_str(&body).map_err(|e| SourceError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WikiConfig::default();
        assert_eq!(config.api_url, "https://en.wikipedia.org/w/api.php");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(config.user_agent.starts_with("widiff/"));
    }

    #[tokio::test]
    async fn test_unreachable_api_is_source_error() {
        let client = WikiClient::new(WikiConfig {
            api_url: "http://127.0.0.1:1/w/api.php".to_string(),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();

        let err = client.fetch_top(Utc::now()).await.unwrap_err();
        assert!(matches!(err, SourceError::Request(_) | SourceError::Timeout));
    }
}
