/*
 * Responsibility
 * - GET {API_PREFIX}/feed (optional)
 * - session があれば個人向け、なければ匿名向けに応答する
 */
use axum::Json;
use serde::Serialize;

use crate::api::extractors::CurrentSession;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub viewer: Option<String>,
    pub greeting: String,
}

pub async fn feed(CurrentSession(session): CurrentSession) -> Json<FeedResponse> {
    let response = match session {
        Some(session) => FeedResponse {
            viewer: Some(session.user_id.clone()),
            greeting: format!("welcome back, {}", session.user.email),
        },
        None => FeedResponse {
            viewer: None,
            greeting: "welcome, guest".to_string(),
        },
    };

    Json(response)
}
