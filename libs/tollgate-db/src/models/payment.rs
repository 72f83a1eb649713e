use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Evidence that the processor completed a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentRecord {
    pub id: i64,
    pub session_id: String,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

/// Ledger row joined with the account it is bound to, if any.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentWithOwner {
    pub id: i64,
    pub session_id: String,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
    pub bound_user_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestResult {
    pub created: bool,
}
