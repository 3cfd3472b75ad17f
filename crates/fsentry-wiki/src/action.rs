//! The closed set of remote operations and their outcomes.
//!
//! Each variant knows how to describe itself as action API form parameters.
//! Parsing the matching response lives in `response.rs`.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::model::{ChangeEvent, RevisionId, UserInfo};

/// Upper bound the API accepts for a single list / revisions query.
pub const CHANGES_LIMIT: u32 = 5_000;
pub const HISTORY_LIMIT: u32 = 5_000;

const LIST_SEPARATOR: &str = "|";

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Non-bot edits newer than a watermark, oldest first.
    ListChanges(ListChanges),
    /// Revisions of one page (history, or latest content).
    FetchRevisions(FetchRevisions),
    /// Hide fields of a set of revisions. Write action.
    Suppress(SuppressRevisions),
    /// Rights of the account behind the access token.
    CheckCapability,
    /// A fresh CSRF token for write actions.
    CsrfToken,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::ListChanges(_) => "list-changes",
            Action::FetchRevisions(_) => "fetch-revisions",
            Action::Suppress(_) => "suppress",
            Action::CheckCapability => "check-capability",
            Action::CsrfToken => "csrf-token",
        }
    }

    /// Write actions must carry a CSRF token.
    pub fn is_write(&self) -> bool {
        matches!(self, Action::Suppress(_))
    }

    /// Form parameters, without `format` and `token`.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut p = Params::default();
        match self {
            Action::ListChanges(q) => {
                p.set("action", "query");
                p.set("list", "recentchanges");
                p.set(
                    "rcstart",
                    q.since.to_rfc3339_opts(SecondsFormat::Secs, true),
                );
                p.set("rcdir", "newer");
                p.list("rcprop", &["title", "timestamp", "ids", "user"]);
                p.list("rcshow", &["!bot"]);
                p.set("rclimit", q.limit.to_string());
                p.list("rctype", &["edit"]);
                p.flag("rctoponly", q.top_only);
            }
            Action::FetchRevisions(q) => {
                p.set("action", "query");
                p.set("prop", "revisions");
                p.set("titles", q.page.clone());
                p.flag("redirects", true);
                if q.with_content {
                    p.list("rvprop", &["ids", "content"]);
                } else {
                    p.list("rvprop", &["ids", "timestamp", "user"]);
                }
                p.set("rvlimit", q.limit.to_string());
            }
            Action::Suppress(s) => {
                p.set("action", "revisiondelete");
                p.set("type", "revision");
                let ids: Vec<&str> = s.ids.iter().map(RevisionId::as_str).collect();
                p.list("ids", &ids);
                if !s.hide.is_empty() {
                    let hide: Vec<&str> = s.hide.iter().map(String::as_str).collect();
                    p.list("hide", &hide);
                }
                if s.suppress {
                    p.set("suppress", "yes");
                }
            }
            Action::CheckCapability => {
                p.set("action", "query");
                p.set("meta", "userinfo");
                p.list("uiprop", &["rights"]);
            }
            Action::CsrfToken => {
                p.set("action", "query");
                p.set("meta", "tokens");
                p.list("type", &["csrf"]);
            }
        }
        p.0
    }
}

#[derive(Default)]
struct Params(Vec<(String, String)>);

impl Params {
    fn set(&mut self, key: &str, value: impl Into<String>) {
        self.0.push((key.to_string(), value.into()));
    }

    fn list(&mut self, key: &str, values: &[&str]) {
        self.set(key, values.join(LIST_SEPARATOR));
    }

    /// Booleans are sent as `1` when true and omitted when false.
    fn flag(&mut self, key: &str, on: bool) {
        if on {
            self.set(key, "1");
        }
    }
}

// ---------------------------------------------------------------------------
// Variant payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListChanges {
    pub since: DateTime<Utc>,
    pub limit: u32,
    /// Only the latest revision of each page.
    pub top_only: bool,
}

impl ListChanges {
    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since,
            limit: CHANGES_LIMIT,
            top_only: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRevisions {
    pub page: String,
    pub with_content: bool,
    pub limit: u32,
}

impl FetchRevisions {
    /// Full history (ids, timestamps, users), redirects followed.
    pub fn history(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            with_content: false,
            limit: HISTORY_LIMIT,
        }
    }

    /// Only the newest revision, with its content.
    pub fn latest_content(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            with_content: true,
            limit: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressRevisions {
    pub ids: Vec<RevisionId>,
    pub hide: Vec<String>,
    /// Hide from administrators as well.
    pub suppress: bool,
}

impl SuppressRevisions {
    /// Hide author and edit summary, suppressed from administrators too.
    pub fn author_and_comment(ids: Vec<RevisionId>) -> Self {
        Self {
            ids,
            hide: vec!["user".to_string(), "comment".to_string()],
            suppress: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Changes(Vec<ChangeEvent>),
    Revisions(Vec<ChangeEvent>),
    Suppressed(SuppressReport),
    Capability(UserInfo),
    Token(String),
}

impl ActionOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionOutcome::Changes(_) => "changes",
            ActionOutcome::Revisions(_) => "revisions",
            ActionOutcome::Suppressed(_) => "suppressed",
            ActionOutcome::Capability(_) => "capability",
            ActionOutcome::Token(_) => "token",
        }
    }
}

/// Per-request summary of a `revisiondelete` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SuppressReport {
    pub status: String,
    pub succeeded: usize,
    /// Ids the server reported as not updated.
    pub failed: Vec<RevisionId>,
}
