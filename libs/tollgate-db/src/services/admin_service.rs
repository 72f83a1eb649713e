use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::payment::PaymentWithOwner;
use crate::models::user::UserAccount;
use crate::repositories::payment_repo::PaymentRepository;
use crate::repositories::user_repo::UserRepository;

#[derive(Error, Debug)]
pub enum OverrideError {
    #[error("User {0} not found")]
    UserNotFound(i64),

    #[error("Session {0} not found")]
    SessionNotFound(String),

    #[error("Session {0} is not paid")]
    SessionNotPaid(String),

    #[error("Session {0} is already bound to another user")]
    SessionAlreadyBound(String),

    #[error("User {0} is already bound to a session")]
    UserAlreadyBound(i64),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Privileged mutations that bypass reconciliation. Callers are expected to
/// have checked the admin session already.
#[derive(Debug, Clone)]
pub struct AdminService {
    payments: PaymentRepository,
    users: UserRepository,
}

impl AdminService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            payments: PaymentRepository::new(pool.clone()),
            users: UserRepository::new(pool),
        }
    }

    pub async fn list_users(&self) -> Result<Vec<UserAccount>, OverrideError> {
        Ok(self.users.list_all().await?)
    }

    pub async fn list_payments(&self) -> Result<Vec<PaymentWithOwner>, OverrideError> {
        Ok(self.payments.list_with_owner().await?)
    }

    /// Grant the guide regardless of any binding.
    pub async fn force_mark_paid_and_fulfilled(&self, user_id: i64) -> Result<(), OverrideError> {
        if !self.users.force_fulfilled(user_id).await? {
            return Err(OverrideError::UserNotFound(user_id));
        }
        info!("Admin: user {} force-marked fulfilled", user_id);
        Ok(())
    }

    /// Delete the account and release its session back to the pool.
    /// Returns the session that was freed, if any.
    pub async fn delete_user(&self, user_id: i64) -> Result<Option<String>, OverrideError> {
        let removed = self
            .users
            .delete(user_id)
            .await?
            .ok_or(OverrideError::UserNotFound(user_id))?;

        match &removed.bound_session_id {
            Some(session_id) => info!("Admin: deleted user {}, session {} released", user_id, session_id),
            None => info!("Admin: deleted user {}", user_id),
        }
        Ok(removed.bound_session_id)
    }

    /// Attach a specific paid session to a user, keeping the binding one-to-one.
    pub async fn force_bind(&self, user_id: i64, session_id: &str) -> Result<(), OverrideError> {
        let account = self
            .users
            .get(user_id)
            .await?
            .ok_or(OverrideError::UserNotFound(user_id))?;
        if account.bound_session_id.is_some() {
            return Err(OverrideError::UserAlreadyBound(user_id));
        }

        let record = self
            .payments
            .get(session_id)
            .await?
            .ok_or_else(|| OverrideError::SessionNotFound(session_id.to_string()))?;
        if !record.paid {
            return Err(OverrideError::SessionNotPaid(session_id.to_string()));
        }

        if self.users.bind(user_id, session_id).await? {
            info!("Admin: user {} force-bound to {}", user_id, session_id);
            return Ok(());
        }

        // Lost to a concurrent bind; report whichever side changed.
        warn!("Admin: force-bind of {} to user {} lost a race", session_id, user_id);
        match self.users.get(user_id).await? {
            None => Err(OverrideError::UserNotFound(user_id)),
            Some(a) if a.bound_session_id.is_some() => Err(OverrideError::UserAlreadyBound(user_id)),
            Some(_) => Err(OverrideError::SessionAlreadyBound(session_id.to_string())),
        }
    }
}
