use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tollgate_db::services::admin_service::OverrideError;

use crate::services::webhook_service::WebhookError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<OverrideError> for AppError {
    fn from(err: OverrideError) -> Self {
        match err {
            OverrideError::UserNotFound(_) | OverrideError::SessionNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            OverrideError::SessionNotPaid(_)
            | OverrideError::SessionAlreadyBound(_)
            | OverrideError::UserAlreadyBound(_) => AppError::Conflict(err.to_string()),
            OverrideError::Storage(e) => AppError::Internal(format!("{:#}", e)),
        }
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Signature(_) | WebhookError::Payload(_) => AppError::BadRequest(err.to_string()),
            // Storage failures must not be acknowledged, so the processor retries.
            WebhookError::Storage(e) => AppError::Internal(format!("{:#}", e)),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{:#}", err))
    }
}
