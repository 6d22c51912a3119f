//! MediaWiki API response DTOs (formatversion=2)

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RecentChangesResponse {
    #[serde(default)]
    pub query: RecentChangesQuery,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecentChangesQuery {
    #[serde(default, rename = "recentchanges")]
    pub recent_changes: Vec<RecentChange>,
}

/// One entry of `list=recentchanges`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentChange {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub ns: i64,
    pub title: String,
    /// Also usable as `curid` in page links
    #[serde(default, rename = "pageid")]
    pub page_id: u64,
    #[serde(rename = "revid")]
    pub rev_id: u64,
    #[serde(default, rename = "old_revid")]
    pub old_rev_id: u64,
    #[serde(default)]
    pub rcid: u64,
    #[serde(default, rename = "oldlen")]
    pub old_len: u64,
    #[serde(default, rename = "newlen")]
    pub new_len: u64,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, rename = "parsedcomment")]
    pub parsed_comment: String,
}

impl RecentChange {
    /// Absolute byte delta of the edit
    pub fn size(&self) -> u64 {
        self.old_len.abs_diff(self.new_len)
    }
}

#[derive(Debug, Deserialize)]
pub struct CompareResponse {
    pub compare: Comparison,
}

/// Result of `action=compare`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Comparison {
    #[serde(default, rename = "fromtitle")]
    pub from_title: String,
    #[serde(default, rename = "fromrevid")]
    pub from_rev_id: u64,
    #[serde(default, rename = "totitle")]
    pub to_title: String,
    #[serde(default, rename = "torevid")]
    pub to_rev_id: u64,
    #[serde(default, rename = "touser")]
    pub to_user: String,
    #[serde(default, rename = "tocomment")]
    pub to_comment: String,
    #[serde(default)]
    pub body: String,
}
