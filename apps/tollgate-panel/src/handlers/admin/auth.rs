use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;
use tracing::{info, warn};

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "admin_session";

#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub admin_path: String,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub password: String,
}

pub async fn is_authenticated(state: &AppState, jar: &CookieJar) -> bool {
    match jar.get(SESSION_COOKIE) {
        Some(cookie) => state.sessions.is_valid(cookie.value()).await,
        None => false,
    }
}

/// Redirects anonymous requests to the login page.
pub async fn require_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    if is_authenticated(&state, &jar).await {
        return next.run(request).await;
    }
    Redirect::to(&format!("{}/login", state.admin_path())).into_response()
}

/// Lifetime matches the server-side session, which is never shorter than an hour.
pub fn session_cookie(token: String, ttl_hours: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::hours(ttl_hours.max(1)))
        .build()
}

/// GET {admin}/login
pub async fn get_login(State(state): State<AppState>) -> impl IntoResponse {
    LoginTemplate {
        admin_path: state.admin_path().to_string(),
        error: None,
    }
}

/// POST {admin}/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let hash = &state.config.admin_password_hash;
    let is_valid = !hash.is_empty() && bcrypt::verify(&form.password, hash).unwrap_or(false);

    if !is_valid {
        warn!("Failed admin login attempt");
        return LoginTemplate {
            admin_path: state.admin_path().to_string(),
            error: Some("Invalid password".to_string()),
        }
        .into_response();
    }

    let token = state.sessions.create().await;
    info!("Admin session created (token: {}...)", &token[..6]);

    (
        jar.add(session_cookie(token, state.config.session_ttl_hours)),
        Redirect::to(&format!("{}/dashboard", state.admin_path())),
    )
        .into_response()
}

/// POST {admin}/logout
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.revoke(cookie.value()).await;
    }
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::to(&format!("{}/login", state.admin_path())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_lifetime_is_at_least_an_hour() {
        let cookie = session_cookie("tok".to_string(), 0);
        assert_eq!(cookie.max_age(), Some(Duration::hours(1)));

        let cookie = session_cookie("tok".to_string(), -5);
        assert_eq!(cookie.max_age(), Some(Duration::hours(1)));

        let cookie = session_cookie("tok".to_string(), 24);
        assert_eq!(cookie.max_age(), Some(Duration::hours(24)));
        assert_eq!(cookie.http_only(), Some(true));
    }
}
