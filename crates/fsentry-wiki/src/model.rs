//! Remote data model shared by every pipeline stage.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The user right required to suppress revisions.
pub const SUPPRESS_RIGHT: &str = "suppressrevision";

/// Opaque revision identifier. The API sends numbers; we keep the decimal text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(pub String);

impl RevisionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RevisionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for RevisionId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

/// One revision as seen by the pipeline, either from the recent-changes feed
/// or from a page history.
///
/// Stages pass these around by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: RevisionId,
    /// Title of the page the revision belongs to.
    pub subject: String,
    /// The revision is already suppressed upstream.
    pub suppressed: bool,
    /// Defaults to the Unix epoch when the API did not report one.
    pub timestamp: DateTime<Utc>,
    pub content: Option<String>,
}

impl ChangeEvent {
    pub fn new(id: impl Into<RevisionId>, subject: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            suppressed: false,
            timestamp,
            content: None,
        }
    }

    pub fn with_suppressed(mut self, suppressed: bool) -> Self {
        self.suppressed = suppressed;
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// The authenticated account behind the access token.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub rights: Vec<String>,
}

impl UserInfo {
    pub fn has_right(&self, right: &str) -> bool {
        self.rights.iter().any(|r| r == right)
    }

    pub fn can_suppress(&self) -> bool {
        self.has_right(SUPPRESS_RIGHT)
    }
}
