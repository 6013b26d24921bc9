//! CORS policy and trusted-origin enforcement for browser clients.
//!
//! Note:
//! - Requests whose `Origin` is not trusted are rejected here with 403, before any
//!   route's auth gate runs.
//! - Requests without an `Origin` header (same-origin navigations, server-to-server)
//!   are not affected.
//!
//! Policy:
//! - Allowlist origins from Config (`TRUSTED_ORIGINS`), WITH credentials.
//! - An empty allowlist trusts no cross-origin caller at all.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Method, Request, header},
    middleware::{self, Next},
    response::Response,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::AppError;

/// Process-wide set of trusted origins; immutable after startup.
#[derive(Debug, Clone, Default)]
pub struct TrustedOriginSet {
    origins: Arc<HashSet<String>>,
}

impl TrustedOriginSet {
    /// Expects origins already normalized by `Config` (`scheme://host[:port]`).
    pub fn new<I, T>(origins: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            origins: Arc::new(origins.into_iter().map(Into::into).collect()),
        }
    }

    pub fn contains(&self, origin: &HeaderValue) -> bool {
        origin
            .to_str()
            .map(|o| self.origins.contains(o.trim_end_matches('/')))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}

/// Apply the trusted-origin guard and the CORS policy to the given Router.
///
/// IMPORTANT:
/// - Credentials are allowed, so the origin list must never be a wildcard.
pub fn apply(router: Router, trusted: TrustedOriginSet) -> Router {
    let allow = trusted.clone();
    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _req| {
        allow.contains(origin)
    });

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
        ])
        .max_age(std::time::Duration::from_secs(60 * 10));

    // Outer CORS layer answers preflights; the guard sits between it and the routes.
    router
        .layer(middleware::from_fn_with_state(trusted, origin_guard))
        .layer(cors)
}

async fn origin_guard(
    State(trusted): State<TrustedOriginSet>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(origin) = req.headers().get(header::ORIGIN)
        && !trusted.contains(origin)
    {
        tracing::warn!(
            origin = ?origin,
            path = %req.uri().path(),
            "request from untrusted origin rejected"
        );
        return Err(AppError::ForbiddenOrigin);
    }

    Ok(next.run(req).await)
}
