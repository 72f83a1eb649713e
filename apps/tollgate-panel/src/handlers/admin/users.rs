use axum::{
    extract::{Form, Path, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct BindForm {
    pub session_id: String,
}

fn back_to_dashboard(state: &AppState) -> Redirect {
    Redirect::to(&format!("{}/dashboard", state.admin_path()))
}

/// POST {admin}/users/{id}/mark-paid
pub async fn mark_paid(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.admin.force_mark_paid_and_fulfilled(user_id).await?;
    Ok(back_to_dashboard(&state))
}

/// POST {admin}/users/{id}/delete
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.admin.delete_user(user_id).await?;
    Ok(back_to_dashboard(&state))
}

/// POST {admin}/users/{id}/bind
pub async fn bind_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Form(form): Form<BindForm>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = form.session_id.trim();
    if session_id.is_empty() {
        return Err(AppError::BadRequest("session_id is required".to_string()));
    }
    state.admin.force_bind(user_id, session_id).await?;
    Ok(back_to_dashboard(&state))
}
