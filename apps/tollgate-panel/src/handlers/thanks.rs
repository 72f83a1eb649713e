use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Template, WebTemplate)]
#[template(path = "thanks.html")]
pub struct ThanksTemplate {
    pub bot_username: String,
    pub deep_link: String,
}

#[derive(Deserialize)]
pub struct ThanksQuery {
    pub session_id: Option<String>,
}

/// `https://t.me/<bot>?start=<session>`. The bot receives the token as `/start <session>`.
pub fn deep_link(bot_username: &str, session_id: &str) -> String {
    format!(
        "https://t.me/{}?start={}",
        bot_username.trim_start_matches('@'),
        urlencoding::encode(session_id)
    )
}

fn render(state: &AppState, session_id: &str) -> ThanksTemplate {
    ThanksTemplate {
        bot_username: state.config.bot_username.trim_start_matches('@').to_string(),
        deep_link: deep_link(&state.config.bot_username, session_id),
    }
}

/// GET /thanks?session_id=...
pub async fn thanks(
    State(state): State<AppState>,
    Query(query): Query<ThanksQuery>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = query
        .session_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("session_id is required".to_string()))?;
    Ok(render(&state, session_id.trim()))
}

/// GET /success/{session_id}
pub async fn success(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    render(&state, &session_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_link_encodes_session() {
        assert_eq!(
            deep_link("@guide_bot", "cs_test_a1"),
            "https://t.me/guide_bot?start=cs_test_a1"
        );
        assert_eq!(deep_link("guide_bot", "a b"), "https://t.me/guide_bot?start=a%20b");
    }
}
