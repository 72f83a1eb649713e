use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};

use crate::error::AppError;
use crate::state::AppState;

pub struct UserRow {
    pub user_id: i64,
    pub label: String,
    pub bound_session_id: String,
    pub session_hint: String,
    pub fulfilled: bool,
    pub delivered: bool,
    pub last_seen: String,
}

pub struct PaymentRow {
    pub session_id: String,
    pub paid: bool,
    pub created_at: String,
    pub owner: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub admin_path: String,
    pub users: Vec<UserRow>,
    pub payments: Vec<PaymentRow>,
    pub unbound_paid: usize,
}

/// GET {admin}/dashboard
pub async fn get_dashboard(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let users = state.admin.list_users().await?;
    let payments = state.admin.list_payments().await?;

    let unbound_paid = payments
        .iter()
        .filter(|p| p.paid && p.bound_user_id.is_none())
        .count();

    let users = users
        .into_iter()
        .map(|u| UserRow {
            user_id: u.user_id,
            label: u.label(),
            bound_session_id: u.bound_session_id.clone().unwrap_or_default(),
            session_hint: u.session_hint.clone().unwrap_or_default(),
            fulfilled: u.fulfilled,
            delivered: u.delivered,
            last_seen: u.last_seen.format("%Y-%m-%d %H:%M").to_string(),
        })
        .collect();

    let payments = payments
        .into_iter()
        .map(|p| PaymentRow {
            session_id: p.session_id,
            paid: p.paid,
            created_at: p.created_at.format("%Y-%m-%d %H:%M").to_string(),
            owner: p.bound_user_id.map(|id| id.to_string()).unwrap_or_default(),
        })
        .collect();

    Ok(DashboardTemplate {
        admin_path: state.admin_path().to_string(),
        users,
        payments,
        unbound_paid,
    })
}
