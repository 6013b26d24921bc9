/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - gate / resolver / forwarder の失敗を HTTP の意味に揃える
 */
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Seconds a client should wait before retrying while the session backend is down.
const BACKEND_RETRY_AFTER_SECONDS: &str = "5";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("authentication backend unavailable")]
    AuthBackendUnavailable,
    #[error("origin not allowed")]
    ForbiddenOrigin,
    #[error("auth context not available")]
    ContextNotAvailable,
    #[error("not found: {resource}")]
    NotFound { resource: &'static str },
}

impl AppError {
    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::AuthBackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ForbiddenOrigin => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::ContextNotAvailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match &self {
            AppError::Unauthorized => ("UNAUTHORIZED", "unauthorized".into()),
            AppError::AuthBackendUnavailable => (
                "AUTH_BACKEND_UNAVAILABLE",
                "authentication service is temporarily unavailable".into(),
            ),
            AppError::ForbiddenOrigin => ("FORBIDDEN_ORIGIN", "origin not allowed".into()),
            AppError::NotFound { resource } => ("NOT_FOUND", format!("{resource} not found.")),
            // Never leak which accessor was misused; the log line carries the detail.
            AppError::ContextNotAvailable => {
                ("INTERNAL_SERVER_ERROR", "internal server error".into())
            }
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, AppError::AuthBackendUnavailable) {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from_static(BACKEND_RETRY_AFTER_SECONDS),
            );
        }
        response
    }
}
