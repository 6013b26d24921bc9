//! Session resolution against the external session-issuing service.
//!
//! The gate only depends on the [`SessionResolver`] trait; [`HttpSessionResolver`] is
//! the production implementation. There is no cache: every call forwards the
//! caller's current cookie state, so sign-out and expiry are visible immediately.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, header};
use chrono::Utc;
use thiserror::Error;
use url::Url;

use crate::services::auth::session::{PayloadError, SessionRecord, parse_session_payload};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Connection failure, timeout or non-2xx answer. Callers must not read this as
    /// "no session".
    #[error("session backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("malformed session payload: {0}")]
    MalformedSession(#[from] PayloadError),
}

/// Credential-bearing headers of the incoming request that the provider needs.
#[derive(Debug, Clone, Default)]
pub struct SessionLookup {
    pub cookie: Option<HeaderValue>,
    pub authorization: Option<HeaderValue>,
}

impl SessionLookup {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        // HTTP/2 clients may split cookies across several `cookie` fields.
        let cookies: Vec<&str> = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();

        let cookie = if cookies.is_empty() {
            None
        } else {
            HeaderValue::from_str(&cookies.join("; ")).ok()
        };

        Self {
            cookie,
            authorization: headers.get(header::AUTHORIZATION).cloned(),
        }
    }

    /// Nothing the provider could identify the caller by.
    pub fn is_anonymous(&self) -> bool {
        self.cookie.is_none() && self.authorization.is_none()
    }
}

#[async_trait]
pub trait SessionResolver: Send + Sync + 'static {
    // Returns:
    // - Ok(Some(_)) => valid session for the presented credentials
    // - Ok(None)    => no session
    // - Err(_)      => backend unreachable or unintelligible
    async fn resolve(&self, lookup: &SessionLookup) -> Result<Option<SessionRecord>, ResolveError>;
}

/// Calls the provider's `get-session` endpoint with the caller's credentials.
#[derive(Clone, Debug)]
pub struct HttpSessionResolver {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpSessionResolver {
    pub fn new(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl SessionResolver for HttpSessionResolver {
    async fn resolve(
        &self,
        lookup: &SessionLookup,
    ) -> Result<Option<SessionRecord>, ResolveError> {
        if lookup.is_anonymous() {
            return Ok(None);
        }

        let mut request = self
            .client
            .get(self.endpoint.clone())
            .header(header::ACCEPT, "application/json");

        if let Some(cookie) = &lookup.cookie {
            request = request.header(header::COOKIE, cookie.clone());
        }
        if let Some(authorization) = &lookup.authorization {
            request = request.header(header::AUTHORIZATION, authorization.clone());
        }

        let response = request.send().await.map_err(|e| {
            ResolveError::BackendUnavailable(if e.is_timeout() {
                "timed out".to_string()
            } else {
                e.to_string()
            })
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::BackendUnavailable(format!(
                "unexpected status {status}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ResolveError::BackendUnavailable(e.to_string()))?;

        Ok(parse_session_payload(&body, Utc::now())?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use std::time::Duration;

    use axum::{
        Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get,
    };
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::services::auth::provider::build_http_client;

    #[derive(Clone, Default)]
    struct FakeProvider {
        hits: Arc<AtomicUsize>,
    }

    // Mimics the provider: the cookie value selects the answer.
    async fn get_session(
        State(fake): State<FakeProvider>,
        headers: HeaderMap,
    ) -> axum::response::Response {
        fake.hits.fetch_add(1, Ordering::SeqCst);
        let cookie = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if cookie.contains("session_token=valid") {
            let expires = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
            Json(json!({
                "session": { "id": "s1", "userId": "u1", "expiresAt": expires },
                "user": { "id": "u1", "email": "u1@example.com" }
            }))
            .into_response()
        } else if cookie.contains("session_token=garbage") {
            "<html>not json</html>".into_response()
        } else if cookie.contains("session_token=boom") {
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        } else if cookie.contains("session_token=slow") {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!(null)).into_response()
        } else {
            Json(json!(null)).into_response()
        }
    }

    async fn spawn_provider() -> (Url, FakeProvider) {
        let fake = FakeProvider::default();
        let app = Router::new()
            .route("/api/auth/get-session", get(get_session))
            .with_state(fake.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let endpoint = Url::parse(&format!("http://{addr}/api/auth/get-session")).unwrap();
        (endpoint, fake)
    }

    fn resolver(endpoint: Url, timeout: Duration) -> HttpSessionResolver {
        HttpSessionResolver::new(build_http_client(timeout).unwrap(), endpoint)
    }

    fn lookup_with_cookie(cookie: &'static str) -> SessionLookup {
        SessionLookup {
            cookie: Some(HeaderValue::from_static(cookie)),
            authorization: None,
        }
    }

    #[test]
    fn lookup_joins_split_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("session_token=valid"));

        let lookup = SessionLookup::from_headers(&headers);
        assert_eq!(lookup.cookie.unwrap(), "a=1; session_token=valid");
        assert!(lookup.authorization.is_none());
        assert!(SessionLookup::from_headers(&HeaderMap::new()).is_anonymous());
    }

    #[tokio::test]
    async fn resolves_valid_session_cookie() {
        let (endpoint, fake) = spawn_provider().await;
        let resolver = resolver(endpoint, Duration::from_secs(2));

        let session = resolver
            .resolve(&lookup_with_cookie("theme=dark; session_token=valid"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(session.user_id, "u1");
        assert_eq!(session.user.email, "u1@example.com");
        assert_eq!(fake.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn null_body_means_no_session() {
        let (endpoint, _) = spawn_provider().await;
        let resolver = resolver(endpoint, Duration::from_secs(2));

        let session = resolver
            .resolve(&lookup_with_cookie("session_token=signed-out"))
            .await
            .unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn anonymous_lookup_skips_the_network() {
        let (endpoint, fake) = spawn_provider().await;
        let resolver = resolver(endpoint, Duration::from_secs(2));

        let session = resolver.resolve(&SessionLookup::default()).await.unwrap();
        assert!(session.is_none());
        assert_eq!(fake.hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn every_call_reaches_the_provider() {
        let (endpoint, fake) = spawn_provider().await;
        let resolver = resolver(endpoint, Duration::from_secs(2));
        let lookup = lookup_with_cookie("session_token=valid");

        resolver.resolve(&lookup).await.unwrap();
        resolver.resolve(&lookup).await.unwrap();
        assert_eq!(fake.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unparseable_payload_is_malformed() {
        let (endpoint, _) = spawn_provider().await;
        let resolver = resolver(endpoint, Duration::from_secs(2));

        let err = resolver
            .resolve(&lookup_with_cookie("session_token=garbage"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::MalformedSession(_)), "{err:?}");
    }

    #[tokio::test]
    async fn non_success_status_is_backend_unavailable() {
        let (endpoint, _) = spawn_provider().await;
        let resolver = resolver(endpoint, Duration::from_secs(2));

        let err = resolver
            .resolve(&lookup_with_cookie("session_token=boom"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::BackendUnavailable(_)), "{err:?}");
    }

    #[tokio::test]
    async fn slow_provider_times_out_as_backend_unavailable() {
        let (endpoint, _) = spawn_provider().await;
        let resolver = resolver(endpoint, Duration::from_millis(100));

        let err = resolver
            .resolve(&lookup_with_cookie("session_token=slow"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::BackendUnavailable(_)), "{err:?}");
    }

    #[tokio::test]
    async fn unreachable_provider_is_backend_unavailable() {
        // Bind and drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = Url::parse(&format!("http://{addr}/api/auth/get-session")).unwrap();
        let resolver = resolver(endpoint, Duration::from_secs(2));

        let err = resolver
            .resolve(&lookup_with_cookie("session_token=valid"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::BackendUnavailable(_)), "{err:?}");
    }
}
