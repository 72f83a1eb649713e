use axum::{
    Json,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
};
use tracing::error;

use crate::error::AppError;
use crate::services::webhook_service::WebhookError;
use crate::state::AppState;

/// POST /webhook, POST /webhook/stripe
///
/// The body is taken raw; the signature covers the exact bytes sent.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    match state.webhook.handle(&body, signature).await {
        Ok(_) => Ok(Json(serde_json::json!({ "success": true }))),
        Err(WebhookError::Storage(e)) => {
            error!("Failed to record webhook: {:#}", e);
            Err(WebhookError::Storage(e).into())
        }
        Err(e) => Err(e.into()),
    }
}
