//! Auth gate: route policy + session lookup → AuthCtx を extensions に入れる
//!
//! Per request: `Start → PolicyResolved → SessionChecked → {Allowed, Rejected}`.
//!
//! | policy   | session | no session      | backend unavailable    | malformed       |
//! |----------|---------|-----------------|------------------------|-----------------|
//! | public   | (never looked up, anonymous context)                                  |
//! | optional | allow   | allow anonymous | allow anonymous        | allow anonymous |
//! | required | allow   | 401             | 503                    | 401             |
//!
//! The resolver is called at most once per request. If the request future is dropped
//! while the lookup is in flight (client gone, global timeout), the lookup is dropped
//! with it and no context is ever attached.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::api::extractors::AuthCtx;
use crate::error::AppError;
use crate::middleware::auth::policy::{RoutePolicy, RoutePolicyRegistry};
use crate::services::auth::{ResolveError, SessionLookup, SessionResolver};

/// State captured by one path's gate layer at registration time.
#[derive(Clone)]
pub struct GateState {
    path: Arc<str>,
    registry: Arc<RoutePolicyRegistry>,
    resolver: Arc<dyn SessionResolver>,
}

impl GateState {
    pub fn new(
        path: &str,
        registry: Arc<RoutePolicyRegistry>,
        resolver: Arc<dyn SessionResolver>,
    ) -> Self {
        Self {
            path: Arc::from(path),
            registry,
            resolver,
        }
    }
}

pub async fn auth_gate(
    State(gate): State<GateState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let policy = gate.registry.policy_of(req.method(), &gate.path);
    let auth_ctx = evaluate(policy, gate.resolver.as_ref(), req.headers()).await?;
    tracing::debug!(
        %policy,
        authenticated = auth_ctx.is_authenticated(),
        session_id = ?auth_ctx.session().map(|s| s.session_id.as_str()),
        "auth gate passed"
    );

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(auth_ctx);

    Ok(next.run(req).await)
}

/// Decides the request's fate from its route policy and the caller's credentials.
pub async fn evaluate(
    policy: RoutePolicy,
    resolver: &dyn SessionResolver,
    headers: &HeaderMap,
) -> Result<AuthCtx, AppError> {
    if policy == RoutePolicy::Public {
        return Ok(AuthCtx::anonymous());
    }

    let lookup = SessionLookup::from_headers(headers);

    let session = match resolver.resolve(&lookup).await {
        Ok(session) => session,
        Err(ResolveError::BackendUnavailable(reason)) => {
            return match policy {
                RoutePolicy::Optional => {
                    tracing::warn!(
                        %policy,
                        %reason,
                        "session backend unavailable, continuing anonymously"
                    );
                    Ok(AuthCtx::anonymous())
                }
                _ => {
                    tracing::warn!(%policy, %reason, "session backend unavailable, rejecting");
                    Err(AppError::AuthBackendUnavailable)
                }
            };
        }
        Err(ResolveError::MalformedSession(err)) => {
            // Same outcome as "no session", but kept apart in the logs.
            tracing::warn!(
                %policy,
                error = %err,
                "malformed session payload treated as no session"
            );
            None
        }
    };

    match (session, policy) {
        (Some(session), _) => {
            tracing::debug!(%policy, user_id = %session.user_id, "request authenticated");
            Ok(AuthCtx::authenticated(session))
        }
        (None, RoutePolicy::Optional) => Ok(AuthCtx::anonymous()),
        (None, _) => {
            tracing::debug!(%policy, "no session on required route");
            Err(AppError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::pending;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::Router;
    use axum::http::{HeaderValue, Method, StatusCode, header};
    use chrono::Utc;
    use serde_json::Map;
    use tower::ServiceExt;

    use super::*;
    use crate::middleware::auth::PolicyRouter;
    use crate::services::auth::session::PayloadError;
    use crate::services::auth::{SessionRecord, SessionUser};

    #[derive(Clone, Copy)]
    enum Outcome {
        Session,
        NoSession,
        Unavailable,
        Malformed,
        Hang,
    }

    struct StubResolver {
        outcome: Outcome,
        calls: AtomicUsize,
    }

    impl StubResolver {
        fn new(outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionResolver for StubResolver {
        async fn resolve(&self, _: &SessionLookup) -> Result<Option<SessionRecord>, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Outcome::Session => Ok(Some(SessionRecord {
                    session_id: "s1".into(),
                    user_id: "u1".into(),
                    user: SessionUser {
                        id: "u1".into(),
                        email: "u1@example.com".into(),
                        role: Some("member".into()),
                        extra: Map::new(),
                    },
                    expires_at: Utc::now() + chrono::Duration::hours(1),
                })),
                Outcome::NoSession => Ok(None),
                Outcome::Unavailable => Err(ResolveError::BackendUnavailable("refused".into())),
                Outcome::Malformed => {
                    Err(ResolveError::MalformedSession(PayloadError::OwnerMismatch))
                }
                Outcome::Hang => pending::<Result<Option<SessionRecord>, ResolveError>>().await,
            }
        }
    }

    fn cookie_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session_token=abc"));
        headers
    }

    #[tokio::test]
    async fn public_never_consults_the_resolver() {
        for outcome in [Outcome::Session, Outcome::Unavailable, Outcome::Hang] {
            let resolver = StubResolver::new(outcome);
            let ctx = evaluate(RoutePolicy::Public, resolver.as_ref(), &cookie_headers())
                .await
                .unwrap();

            assert!(!ctx.is_authenticated());
            assert_eq!(ctx.user_id(), None);
            assert_eq!(resolver.calls(), 0);
        }
    }

    #[tokio::test]
    async fn session_is_attached_with_its_user_id() {
        for policy in [RoutePolicy::Required, RoutePolicy::Optional] {
            let resolver = StubResolver::new(Outcome::Session);
            let ctx = evaluate(policy, resolver.as_ref(), &cookie_headers())
                .await
                .unwrap();

            assert_eq!(ctx.user_id(), Some("u1"));
            assert_eq!(ctx.session().unwrap().session_id, "s1");
            assert_eq!(resolver.calls(), 1);
        }
    }

    #[tokio::test]
    async fn required_without_session_is_unauthorized() {
        for outcome in [Outcome::NoSession, Outcome::Malformed] {
            let resolver = StubResolver::new(outcome);
            let err = evaluate(RoutePolicy::Required, resolver.as_ref(), &HeaderMap::new())
                .await
                .unwrap_err();

            assert!(matches!(err, AppError::Unauthorized));
        }
    }

    #[tokio::test]
    async fn required_with_backend_down_is_not_unauthorized() {
        let resolver = StubResolver::new(Outcome::Unavailable);
        let err = evaluate(RoutePolicy::Required, resolver.as_ref(), &cookie_headers())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::AuthBackendUnavailable));
    }

    #[tokio::test]
    async fn optional_degrades_to_anonymous() {
        for outcome in [Outcome::NoSession, Outcome::Malformed, Outcome::Unavailable] {
            let resolver = StubResolver::new(outcome);
            let ctx = evaluate(RoutePolicy::Optional, resolver.as_ref(), &cookie_headers())
                .await
                .unwrap();

            assert!(ctx.session().is_none());
            assert!(ctx.user_id().is_none());
            assert_eq!(resolver.calls(), 1);
        }
    }

    fn guarded_app(resolver: Arc<StubResolver>, hits: Arc<AtomicUsize>) -> Router {
        let handler = move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                "handled"
            }
        };

        let (router, _) = PolicyRouter::new(resolver)
            .optional(Method::GET, "/guarded", handler.clone())
            .required(Method::POST, "/guarded", handler)
            .finish()
            .unwrap();
        router
    }

    #[tokio::test]
    async fn rejected_requests_never_reach_the_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = guarded_app(StubResolver::new(Outcome::NoSession), hits.clone());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/guarded")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn gate_reads_the_policy_of_the_matched_method() {
        let hits = Arc::new(AtomicUsize::new(0));
        let resolver = StubResolver::new(Outcome::NoSession);
        let app = guarded_app(resolver.clone(), hits.clone());

        let read = app
            .clone()
            .oneshot(Request::builder().uri("/guarded").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(read.status(), StatusCode::OK);

        let write = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/guarded")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(write.status(), StatusCode::UNAUTHORIZED);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn cancelled_lookup_attaches_nothing_and_skips_the_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let resolver = StubResolver::new(Outcome::Hang);
        let app = guarded_app(resolver.clone(), hits.clone());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/guarded")
            .header(header::COOKIE, "session_token=abc")
            .body(Body::empty())
            .unwrap();

        // Dropping the in-flight request future is what hyper does on disconnect.
        let outcome =
            tokio::time::timeout(Duration::from_millis(50), app.oneshot(request)).await;

        assert!(outcome.is_err());
        assert_eq!(resolver.calls(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
