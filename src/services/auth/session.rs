//! Session payload returned by the session-issuing service, and its normalized form.
//!
//! The provider answers `get-session` with either a falsy body (no session) or
//! `{ "session": {...}, "user": {...} }`. Everything the gate and handlers see is a
//! [`SessionRecord`]; provider wire types never leave this module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity attached to a session.
///
/// `extra` keeps provider-specific fields (name, image, plugin fields...) so handlers
/// can read them without this crate knowing about every provider plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Normalized, read-only session for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub user: SessionUser,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("session payload is not valid json: {0}")]
    Json(String),
    #[error("session payload has unexpected shape: {0}")]
    Shape(String),
    #[error("session user id does not match session owner")]
    OwnerMismatch,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSession {
    id: String,
    user_id: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct WireEnvelope {
    session: Option<WireSession>,
    user: Option<SessionUser>,
}

/// Parses a `get-session` body.
///
/// - `Ok(None)`: no session (empty body, `null`, `false`, `""`, `{"session": null}`)
/// - `Ok(Some(_))`: valid, not yet expired session
/// - `Err(_)`: the body could not be understood
pub fn parse_session_payload(
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<Option<SessionRecord>, PayloadError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: Value =
        serde_json::from_slice(body).map_err(|e| PayloadError::Json(e.to_string()))?;

    match &value {
        Value::Null | Value::Bool(false) => return Ok(None),
        Value::String(s) if s.is_empty() => return Ok(None),
        Value::Object(_) => {}
        other => {
            return Err(PayloadError::Shape(format!(
                "expected object, got {}",
                json_kind(other)
            )));
        }
    }

    let envelope: WireEnvelope =
        serde_json::from_value(value).map_err(|e| PayloadError::Shape(e.to_string()))?;

    let Some(session) = envelope.session else {
        return Ok(None);
    };
    let user = envelope
        .user
        .ok_or_else(|| PayloadError::Shape("session without user".into()))?;

    if session.id.trim().is_empty() || session.user_id.trim().is_empty() {
        return Err(PayloadError::Shape("empty session identifiers".into()));
    }
    if user.id != session.user_id {
        return Err(PayloadError::OwnerMismatch);
    }

    if session.expires_at <= now {
        tracing::debug!(
            session_id = %session.id,
            expires_at = %session.expires_at,
            "provider returned an expired session"
        );
        return Ok(None);
    }

    Ok(Some(SessionRecord {
        session_id: session.id,
        user_id: session.user_id,
        user,
        expires_at: session.expires_at,
    }))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
