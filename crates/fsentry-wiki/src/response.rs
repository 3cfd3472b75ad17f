//! Response decoding for each [`Action`] variant.
//!
//! The body is parsed once into a JSON value, checked for the API `error`
//! envelope, then deserialized into the typed shape the action expects.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::action::{Action, ActionOutcome, SuppressReport};
use crate::error::ApiError;
use crate::model::{ChangeEvent, RevisionId, UserInfo};

pub(crate) fn parse(action: &Action, body: &str) -> Result<ActionOutcome, ApiError> {
    let v: Value = serde_json::from_str(body)
        .map_err(|e| ApiError::Decode(format!("{} response is not json: {e}", action.name())))?;

    if let Some(err) = v.get("error") {
        let env = ErrorBody::deserialize(err).unwrap_or_default();
        return Err(ApiError::Api {
            code: env.code,
            info: env.info,
        });
    }

    match action {
        Action::ListChanges(_) => {
            let q: RecentChangesBody = query_section(&v, action)?;
            Ok(ActionOutcome::Changes(
                q.recentchanges.into_iter().map(RawChange::into_event).collect(),
            ))
        }
        Action::FetchRevisions(_) => {
            let q: PagesBody = query_section(&v, action)?;
            Ok(ActionOutcome::Revisions(q.into_events()?))
        }
        Action::Suppress(_) => {
            let section = v.get("revisiondelete").ok_or_else(|| {
                ApiError::UnexpectedResponse("response has no `revisiondelete` section".into())
            })?;
            let raw = RawDeleteResult::deserialize(section).map_err(shape_error(action))?;
            Ok(ActionOutcome::Suppressed(raw.into_report()))
        }
        Action::CheckCapability => {
            let q: UserinfoBody = query_section(&v, action)?;
            Ok(ActionOutcome::Capability(q.userinfo))
        }
        Action::CsrfToken => {
            let q: TokensBody = query_section(&v, action)?;
            Ok(ActionOutcome::Token(q.tokens.csrftoken))
        }
    }
}

fn query_section<'a, T: Deserialize<'a>>(v: &'a Value, action: &Action) -> Result<T, ApiError> {
    let query = v
        .get("query")
        .ok_or_else(|| ApiError::UnexpectedResponse("response has no `query` section".into()))?;
    T::deserialize(query).map_err(shape_error(action))
}

fn shape_error(action: &Action) -> impl Fn(serde_json::Error) -> ApiError + '_ {
    move |e| ApiError::UnexpectedResponse(format!("{} response: {e}", action.name()))
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Revision ids arrive as numbers; accept strings too.
fn revid<'de, D: Deserializer<'de>>(d: D) -> Result<RevisionId, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Text(String),
    }
    Ok(match Raw::deserialize(d)? {
        Raw::Num(n) => RevisionId::from(n),
        Raw::Text(s) => RevisionId(s),
    })
}

/// Boolean flags are signalled by the presence of the key, whatever its value.
fn present<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    IgnoredAny::deserialize(d)?;
    Ok(true)
}

fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct RecentChangesBody {
    recentchanges: Vec<RawChange>,
}

#[derive(Debug, Deserialize)]
struct RawChange {
    #[serde(deserialize_with = "revid")]
    revid: RevisionId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default, deserialize_with = "present")]
    suppressed: bool,
}

impl RawChange {
    fn into_event(self) -> ChangeEvent {
        ChangeEvent {
            id: self.revid,
            subject: self.title,
            suppressed: self.suppressed,
            timestamp: parse_timestamp(self.timestamp.as_deref()),
            content: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PagesBody {
    pages: BTreeMap<String, RawPage>,
}

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default)]
    title: String,
    #[serde(default, deserialize_with = "present")]
    missing: bool,
    #[serde(default, deserialize_with = "present")]
    invalid: bool,
    revisions: Option<Vec<RawRevision>>,
}

#[derive(Debug, Deserialize)]
struct RawRevision {
    #[serde(deserialize_with = "revid")]
    revid: RevisionId,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default, rename = "*")]
    content: Option<String>,
    #[serde(default, deserialize_with = "present")]
    suppressed: bool,
}

impl PagesBody {
    /// Only one title is ever requested; the first page wins.
    fn into_events(self) -> Result<Vec<ChangeEvent>, ApiError> {
        let Some((_, page)) = self.pages.into_iter().next() else {
            return Err(ApiError::UnexpectedResponse("`pages` is empty".into()));
        };

        if page.missing || page.invalid {
            return Ok(Vec::new());
        }

        let revisions = page.revisions.ok_or_else(|| {
            ApiError::UnexpectedResponse(format!("page `{}` has no revisions", page.title))
        })?;

        Ok(revisions
            .into_iter()
            .map(|r| ChangeEvent {
                id: r.revid,
                subject: page.title.clone(),
                suppressed: r.suppressed,
                timestamp: parse_timestamp(r.timestamp.as_deref()),
                content: r.content,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct UserinfoBody {
    userinfo: UserInfo,
}

#[derive(Debug, Deserialize)]
struct TokensBody {
    tokens: RawTokens,
}

#[derive(Debug, Deserialize)]
struct RawTokens {
    csrftoken: String,
}

#[derive(Debug, Deserialize)]
struct RawDeleteResult {
    #[serde(default)]
    status: String,
    #[serde(default)]
    items: Vec<RawDeleteItem>,
}

#[derive(Debug, Deserialize)]
struct RawDeleteItem {
    #[serde(deserialize_with = "revid")]
    id: RevisionId,
    #[serde(default)]
    status: String,
    #[serde(default)]
    errors: Vec<IgnoredAny>,
}

impl RawDeleteResult {
    fn into_report(self) -> SuppressReport {
        let mut report = SuppressReport {
            status: self.status,
            ..SuppressReport::default()
        };
        for item in self.items {
            if item.status.eq_ignore_ascii_case("success") && item.errors.is_empty() {
                report.succeeded += 1;
            } else {
                report.failed.push(item.id);
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{FetchRevisions, ListChanges, SuppressRevisions};
    use chrono::TimeZone;

    fn list_changes() -> Action {
        Action::ListChanges(ListChanges::since(Utc::now()))
    }

    #[test]
    fn recent_changes_are_decoded() {
        let body = r#"{
            "batchcomplete": "",
            "query": {"recentchanges": [
                {"type":"edit","title":"Foo","revid":101,"timestamp":"2024-03-01T10:00:00Z"},
                {"type":"edit","title":"Bar","revid":102,"timestamp":"2024-03-01T10:00:07Z","suppressed":""}
            ]}
        }"#;

        let ActionOutcome::Changes(events) = parse(&list_changes(), body).unwrap() else {
            panic!("wrong outcome");
        };
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id.as_str(), "101");
        assert_eq!(events[0].subject, "Foo");
        assert!(!events[0].suppressed);
        assert_eq!(
            events[0].timestamp,
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
        );
        assert!(events[1].suppressed);
    }

    #[test]
    fn recent_changes_without_list_is_unexpected() {
        let err = parse(&list_changes(), r#"{"query":{}}"#).unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedResponse(_)), "{err:?}");

        let err = parse(&list_changes(), r#"{"batchcomplete":""}"#).unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedResponse(_)), "{err:?}");
    }

    #[test]
    fn unparseable_timestamp_falls_back_to_epoch() {
        let body = r#"{"query":{"recentchanges":[{"title":"Foo","revid":1,"timestamp":"yesterday"}]}}"#;
        let ActionOutcome::Changes(events) = parse(&list_changes(), body).unwrap() else {
            panic!("wrong outcome");
        };
        assert_eq!(events[0].timestamp, DateTime::<Utc>::default());
    }

    #[test]
    fn error_envelope_wins() {
        let body = r#"{"error":{"code":"permissiondenied","info":"You do not have permission."}}"#;
        let err = parse(&Action::CheckCapability, body).unwrap_err();
        assert_eq!(
            err,
            ApiError::Api {
                code: "permissiondenied".to_string(),
                info: "You do not have permission.".to_string()
            }
        );
    }

    #[test]
    fn non_json_is_decode_error() {
        let err = parse(&Action::CsrfToken, "{invalid json}").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn page_history_and_content() {
        let body = r#"{"query":{"pages":{"77":{"pageid":77,"ns":0,"title":"Foo","revisions":[
            {"revid":5,"parentid":4,"user":"A","timestamp":"2024-01-01T00:00:00Z"},
            {"revid":4,"parentid":0,"user":"B","timestamp":"2023-12-31T00:00:00Z","suppressed":""}
        ]}}}}"#;
        let action = Action::FetchRevisions(FetchRevisions::history("Foo"));
        let ActionOutcome::Revisions(revs) = parse(&action, body).unwrap() else {
            panic!("wrong outcome");
        };
        assert_eq!(revs.len(), 2);
        assert_eq!(revs[0].subject, "Foo");
        assert!(revs[1].suppressed);

        let body = r#"{"query":{"pages":{"9":{"title":"List","revisions":[{"revid":12,"*":"Foo\nBar\n"}]}}}}"#;
        let action = Action::FetchRevisions(FetchRevisions::latest_content("List"));
        let ActionOutcome::Revisions(revs) = parse(&action, body).unwrap() else {
            panic!("wrong outcome");
        };
        assert_eq!(revs[0].content.as_deref(), Some("Foo\nBar\n"));
    }

    #[test]
    fn missing_page_yields_no_revisions() {
        let body = r#"{"query":{"pages":{"-1":{"ns":0,"title":"Nope","missing":""}}}}"#;
        let action = Action::FetchRevisions(FetchRevisions::history("Nope"));
        assert_eq!(
            parse(&action, body).unwrap(),
            ActionOutcome::Revisions(vec![])
        );
    }

    #[test]
    fn revision_without_id_is_unexpected() {
        let body = r#"{"query":{"pages":{"1":{"title":"Foo","revisions":[{"user":"A"}]}}}}"#;
        let action = Action::FetchRevisions(FetchRevisions::history("Foo"));
        assert!(matches!(
            parse(&action, body).unwrap_err(),
            ApiError::UnexpectedResponse(_)
        ));
    }

    #[test]
    fn userinfo_and_token() {
        let body = r#"{"query":{"userinfo":{"id":3,"name":"SentryBot","rights":["read","suppressrevision"]}}}"#;
        let ActionOutcome::Capability(info) = parse(&Action::CheckCapability, body).unwrap() else {
            panic!("wrong outcome");
        };
        assert!(info.can_suppress());
        assert_eq!(info.name, "SentryBot");

        let body = r#"{"query":{"tokens":{"csrftoken":"abc123+\\"}}}"#;
        assert_eq!(
            parse(&Action::CsrfToken, body).unwrap(),
            ActionOutcome::Token("abc123+\\".to_string())
        );
    }

    #[test]
    fn suppress_report_splits_failures() {
        let body = r#"{"revisiondelete":{"status":"Success","target":"Foo","items":[
            {"status":"success","id":1},
            {"status":"fail","id":2,"errors":[{"code":"x"}]}
        ]}}"#;
        let action = Action::Suppress(SuppressRevisions::author_and_comment(vec![
            "1".into(),
            "2".into(),
        ]));
        let ActionOutcome::Suppressed(report) = parse(&action, body).unwrap() else {
            panic!("wrong outcome");
        };
        assert_eq!(report.status, "Success");
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, vec![RevisionId::from("2")]);
    }
}
