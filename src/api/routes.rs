/*
 * Responsibility
 * - アプリケーション routes の URL 構造と route policy を一か所で宣言する
 * - provider namespace (auth) の routes は別に返す (API_PREFIX を付けないため)
 */
use std::sync::Arc;

use axum::{Router, http::Method, routing::any};

use crate::middleware::auth::{PolicyError, PolicyRouter, RoutePolicyRegistry};
use crate::state::AppState;

use crate::api::handlers::{feed::feed, health::health, me::me, provider::forward_to_provider};

/// Application routes, to be nested under `API_PREFIX`.
pub fn routes(
    state: &AppState,
) -> Result<(Router<AppState>, Arc<RoutePolicyRegistry>), PolicyError> {
    PolicyRouter::new(state.resolver.clone())
        .public(Method::GET, "/health", health)
        .optional(Method::GET, "/feed", feed)
        .required(Method::GET, "/me", me)
        .finish()
}

/// Provider namespace, to be nested under `AUTH_BASE_PATH` as-is.
pub fn provider_routes() -> Router<AppState> {
    Router::new().route("/{*path}", any(forward_to_provider))
}
