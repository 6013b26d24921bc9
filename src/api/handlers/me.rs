/*
 * Responsibility
 * - GET {API_PREFIX}/me (required)
 * - gate が付けた session をそのまま返す
 */
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::extractors::{CurrentSession, CurrentUserId};
use crate::error::AppError;
use crate::services::auth::SessionUser;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: String,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
    pub user: SessionUser,
}

pub async fn me(
    CurrentUserId(user_id): CurrentUserId,
    CurrentSession(session): CurrentSession,
) -> Result<Json<MeResponse>, AppError> {
    // Required route: the gate has already rejected requests without a session.
    let (Some(user_id), Some(session)) = (user_id, session) else {
        return Err(AppError::Unauthorized);
    };

    Ok(Json(MeResponse {
        user_id,
        session_id: session.session_id.clone(),
        expires_at: session.expires_at,
        user: session.user.clone(),
    }))
}
