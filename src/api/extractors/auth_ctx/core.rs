use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::auth::SessionRecord;

use super::AuthCtx;

/// Handler で現在の session を受け取るための extractor
///
/// `None` means the route is public, or optional and the caller has no session.
/// On required routes the gate guarantees `Some`.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Option<Arc<SessionRecord>>);

/// Handler で現在の user id を受け取るための extractor
#[derive(Debug, Clone)]
pub struct CurrentUserId(pub Option<String>);

// gate を通っていない route で使われた = 配線ミス。401 にはせず 500 で即座に表面化させる
fn auth_ctx(parts: &Parts, accessor: &'static str) -> Result<AuthCtx, AppError> {
    parts.extensions.get::<AuthCtx>().cloned().ok_or_else(|| {
        tracing::error!(
            accessor,
            path = %parts.uri.path(),
            "auth context accessed on a route the gate did not run for"
        );
        AppError::ContextNotAvailable
    })
}

impl<S> FromRequestParts<S> for AuthCtx
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        auth_ctx(parts, "auth_ctx")
    }
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        auth_ctx(parts, "current_session")
            .map(|ctx| CurrentSession(ctx.shared_session()))
    }
}

impl<S> FromRequestParts<S> for CurrentUserId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        auth_ctx(parts, "current_user_id")
            .map(|ctx| CurrentUserId(ctx.user_id().map(str::to_owned)))
    }
}
