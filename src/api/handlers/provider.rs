/*
 * Responsibility
 * - {AUTH_BASE_PATH}/{*path} を session-issuing service へそのまま中継する
 *   (sign-in, callback, sign-out, get-session ...)
 * - API_PREFIX は付かない。gate も通さない (provider 自身が認証を扱う)
 */
use axum::{
    body::{Body, Bytes},
    extract::{OriginalUri, State},
    http::{HeaderMap, Method},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::ForwardError;
use crate::state::AppState;

pub async fn forward_to_provider(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    // OriginalUri: nest で削られる前の path (= provider 側の path と同じ)
    let path_and_query = original_uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| original_uri.path());

    let forwarded = state
        .forwarder
        .forward(method, path_and_query, &headers, body)
        .await
        .map_err(|err| match err {
            ForwardError::Target(reason) => {
                tracing::warn!(%reason, "refusing to forward provider request");
                AppError::not_found("route")
            }
            ForwardError::Unreachable(reason) => {
                tracing::warn!(%reason, "session provider unreachable");
                AppError::AuthBackendUnavailable
            }
        })?;

    let mut response = Response::new(Body::from(forwarded.body));
    *response.status_mut() = forwarded.status;
    *response.headers_mut() = forwarded.headers;

    Ok(response)
}
