//! HTTP-backed action executor.

use std::fmt;
use std::sync::Arc;

use fsentry_http::{HttpRequest, HttpSender};
use tracing::debug;

use crate::action::{Action, ActionOutcome};
use crate::error::ApiError;
use crate::response;

/// Longest slice of an error body kept in [`ApiError::Http`].
const ERROR_BODY_LIMIT: usize = 512;

/// Single entry point for every remote operation.
///
/// Implementations return exactly the [`ActionOutcome`] variant matching the
/// [`Action`] variant they were given.
#[async_trait::async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: Action) -> Result<ActionOutcome, ApiError>;
}

#[async_trait::async_trait]
impl<T: ActionExecutor + ?Sized> ActionExecutor for Arc<T> {
    async fn execute(&self, action: Action) -> Result<ActionOutcome, ApiError> {
        (**self).execute(action).await
    }
}

/// Executes actions against one API endpoint with a bearer token.
///
/// Write actions fetch a fresh CSRF token first; the token request goes
/// through the same sender and is therefore rate limited too.
pub struct MediaWikiApi<S> {
    sender: S,
    endpoint: String,
    access_token: String,
    user_agent: String,
}

impl<S> fmt::Debug for MediaWikiApi<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaWikiApi")
            .field("endpoint", &self.endpoint)
            .field("access_token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl<S: HttpSender> MediaWikiApi<S> {
    pub fn new(
        sender: S,
        endpoint: impl Into<String>,
        access_token: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            endpoint: endpoint.into(),
            access_token: access_token.into(),
            user_agent: user_agent.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request(&self, action: &Action, token: Option<&str>) -> HttpRequest {
        let mut form = action.to_params();
        form.push(("format".to_string(), "json".to_string()));
        if let Some(token) = token {
            form.push(("token".to_string(), token.to_string()));
        }
        HttpRequest::post_form(self.endpoint.clone(), form)
            .header("User-Agent", self.user_agent.clone())
            .header("Authorization", format!("Bearer {}", self.access_token))
    }

    async fn send_action(
        &self,
        action: &Action,
        token: Option<&str>,
    ) -> Result<ActionOutcome, ApiError> {
        let req = self.build_request(action, token);
        let resp = self.sender.send(&req).await?;

        debug!(
            action = action.name(),
            status = resp.status.as_u16(),
            bytes = resp.body.len(),
            "api response"
        );

        if resp.is_error() {
            return Err(ApiError::Http {
                status: resp.status.as_u16(),
                body: truncate(&resp.body, ERROR_BODY_LIMIT),
            });
        }

        response::parse(action, &resp.body)
    }

    async fn csrf_token(&self) -> Result<String, ApiError> {
        match self.send_action(&Action::CsrfToken, None).await? {
            ActionOutcome::Token(t) => Ok(t),
            other => Err(ApiError::UnexpectedResponse(format!(
                "csrf-token returned {}",
                other.kind()
            ))),
        }
    }
}

#[async_trait::async_trait]
impl<S: HttpSender> ActionExecutor for MediaWikiApi<S> {
    async fn execute(&self, action: Action) -> Result<ActionOutcome, ApiError> {
        let token = if action.is_write() {
            Some(self.csrf_token().await?)
        } else {
            None
        };
        self.send_action(&action, token.as_deref()).await
    }
}

fn truncate(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        return body.to_string();
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsentry_http::{HttpResponse, StatusCode, TransportError};
    use std::sync::Mutex;

    /// Replays canned bodies and records every request.
    struct Canned {
        replies: Mutex<Vec<HttpResponse>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Canned {
        fn new(replies: Vec<HttpResponse>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl HttpSender for Canned {
        async fn send(&self, req: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(req.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| TransportError::Connect("no more replies".into()))
        }
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse::new(StatusCode::OK, body)
    }

    #[tokio::test]
    async fn read_action_sends_no_token() {
        let api = MediaWikiApi::new(
            Canned::new(vec![ok(r#"{"query":{"userinfo":{"id":1,"name":"Bot","rights":[]}}}"#)]),
            "https://wiki.example/w/api.php",
            "secret",
            "FreedomSentry/1",
        );
        let out = api.execute(Action::CheckCapability).await.unwrap();
        assert_eq!(out.kind(), "capability");

        let seen = api.sender.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].form_value("format"), Some("json"));
        assert_eq!(seen[0].form_value("token"), None);
        assert!(seen[0]
            .headers
            .contains(&("Authorization".to_string(), "Bearer secret".to_string())));
    }

    #[tokio::test]
    async fn http_error_status_is_not_parsed() {
        let api = MediaWikiApi::new(
            Canned::new(vec![HttpResponse::new(StatusCode::BAD_GATEWAY, "upstream down")]),
            "https://wiki.example/w/api.php",
            "secret",
            "FreedomSentry/1",
        );
        let err = api.execute(Action::CsrfToken).await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Http {
                status: 502,
                body: "upstream down".to_string()
            }
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééé", 3), "é...");
    }

    #[test]
    fn debug_redacts_token() {
        let api = MediaWikiApi::new(
            Canned::new(vec![]),
            "https://wiki.example/w/api.php",
            "secret",
            "FreedomSentry/1",
        );
        let dbg = format!("{api:?}");
        assert!(!dbg.contains("secret"));
    }
}
