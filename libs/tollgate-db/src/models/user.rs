use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserAccount {
    pub user_id: i64,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub bound_session_id: Option<String>,
    /// Last deep-link token the user arrived with. Untrusted.
    pub session_hint: Option<String>,
    pub fulfilled: bool,
    pub delivered: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl UserAccount {
    pub fn label(&self) -> String {
        match (&self.username, &self.display_name) {
            (Some(username), _) => format!("@{}", username),
            (None, Some(name)) => name.clone(),
            (None, None) => self.user_id.to_string(),
        }
    }
}

/// Outcome of a first-contact upsert.
#[derive(Debug, Clone)]
pub struct ContactResult {
    pub account: UserAccount,
    pub created: bool,
    /// Set when the supplied token was bound on the spot.
    pub bound_from_hint: bool,
}
