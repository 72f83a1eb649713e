use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::models::user::{ContactResult, UserAccount};

const USER_COLUMNS: &str = "user_id, display_name, username, bound_session_id, session_hint, \
                            fulfilled, delivered, created_at, last_seen";

/// User registry. One row per chat user, holding at most one bound payment.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a user on first contact, or refresh profile fields on a later one.
    /// An existing binding or fulfillment flag is never touched. A supplied token
    /// is bound straight away only for a brand-new account and only if it names a
    /// paid, unbound ledger record.
    pub async fn upsert_on_contact(
        &self,
        user_id: i64,
        display_name: Option<&str>,
        username: Option<&str>,
        supplied_session_id: Option<&str>,
    ) -> Result<ContactResult> {
        let now = Utc::now();
        let inserted = sqlx::query(
            r#"
            INSERT INTO users (user_id, display_name, username, session_hint, created_at, last_seen)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .bind(username)
        .bind(supplied_session_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to insert user")?;

        let created = inserted.rows_affected() == 1;
        if !created {
            sqlx::query(
                r#"
                UPDATE users SET
                    display_name = COALESCE(?2, display_name),
                    username = COALESCE(?3, username),
                    session_hint = COALESCE(?4, session_hint),
                    last_seen = ?5
                WHERE user_id = ?1
                "#,
            )
            .bind(user_id)
            .bind(display_name)
            .bind(username)
            .bind(supplied_session_id)
            .bind(now)
            .execute(&self.pool)
            .await
            .context("Failed to refresh user")?;
        }

        let mut bound_from_hint = false;
        if created {
            info!("Registry: new user {}", user_id);
            if let Some(session_id) = supplied_session_id {
                bound_from_hint = self.bind(user_id, session_id).await?;
                if bound_from_hint {
                    info!("Registry: user {} bound to {} from deep link", user_id, session_id);
                }
            }
        }

        let account = self
            .get(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User {} vanished during upsert", user_id))?;

        Ok(ContactResult {
            account,
            created,
            bound_from_hint,
        })
    }

    pub async fn get(&self, user_id: i64) -> Result<Option<UserAccount>> {
        sqlx::query_as::<_, UserAccount>(&format!(
            "SELECT {} FROM users WHERE user_id = ?",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")
    }

    pub async fn list_all(&self) -> Result<Vec<UserAccount>> {
        sqlx::query_as::<_, UserAccount>(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")
    }

    /// See [`UserRepository::bind_with`].
    pub async fn bind(&self, user_id: i64, session_id: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        Self::bind_with(&mut conn, user_id, session_id).await
    }

    /// Bind a paid ledger record to an unbound user. Returns false when the user
    /// is missing or already bound, the record is unpaid, or another account
    /// holds the record (including losing the race on the unique index).
    pub async fn bind_with(
        conn: &mut SqliteConnection,
        user_id: i64,
        session_id: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET bound_session_id = ?1
            WHERE user_id = ?2
              AND bound_session_id IS NULL
              AND EXISTS (SELECT 1 FROM payments WHERE session_id = ?1 AND paid = 1)
              AND NOT EXISTS (SELECT 1 FROM users WHERE bound_session_id = ?1)
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() == 1),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                debug!("Registry: {} already bound elsewhere", session_id);
                Ok(false)
            }
            Err(e) => Err(e).context("Failed to bind session"),
        }
    }

    pub async fn mark_fulfilled(&self, user_id: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        Self::mark_fulfilled_with(&mut conn, user_id).await
    }

    /// Flip `fulfilled` for a user. Returns false if it was already set (or the
    /// user is gone), so exactly one concurrent caller wins.
    pub async fn mark_fulfilled_with(conn: &mut SqliteConnection, user_id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET fulfilled = 1 WHERE user_id = ? AND fulfilled = 0")
            .bind(user_id)
            .execute(&mut *conn)
            .await
            .context("Failed to mark user fulfilled")?;
        Ok(result.rows_affected() == 1)
    }

    /// Unconditional variant used by manual correction. Returns false only if the
    /// user does not exist.
    pub async fn force_fulfilled(&self, user_id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET fulfilled = 1 WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to force user fulfilled")?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn mark_delivered(&self, user_id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET delivered = 1 WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to mark guide delivered")?;
        Ok(())
    }

    /// Remove the account. Its payment, if any, returns to the claimable pool.
    pub async fn delete(&self, user_id: i64) -> Result<Option<UserAccount>> {
        sqlx::query_as::<_, UserAccount>(&format!(
            "DELETE FROM users WHERE user_id = ? RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to delete user")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_memory;
    use crate::repositories::payment_repo::PaymentRepository;

    async fn setup() -> (PaymentRepository, UserRepository) {
        let pool = connect_memory().await.unwrap();
        (PaymentRepository::new(pool.clone()), UserRepository::new(pool))
    }

    #[tokio::test]
    async fn upsert_keeps_binding_and_fulfillment() {
        let (payments, users) = setup().await;
        payments.ingest("cs_1", true).await.unwrap();

        let first = users
            .upsert_on_contact(7, Some("Ann"), Some("ann"), Some("cs_1"))
            .await
            .unwrap();
        assert!(first.created);
        assert!(first.bound_from_hint);
        assert!(users.mark_fulfilled(7).await.unwrap());

        let again = users
            .upsert_on_contact(7, None, Some("ann_new"), Some("cs_other"))
            .await
            .unwrap();
        assert!(!again.created);
        assert!(!again.bound_from_hint);
        assert_eq!(again.account.bound_session_id.as_deref(), Some("cs_1"));
        assert!(again.account.fulfilled);
        assert_eq!(again.account.display_name.as_deref(), Some("Ann"));
        assert_eq!(again.account.username.as_deref(), Some("ann_new"));
        assert_eq!(again.account.session_hint.as_deref(), Some("cs_other"));
    }

    #[tokio::test]
    async fn hint_for_unknown_session_is_only_remembered() {
        let (_payments, users) = setup().await;
        let contact = users
            .upsert_on_contact(1, None, None, Some("cs_future"))
            .await
            .unwrap();
        assert!(!contact.bound_from_hint);
        assert_eq!(contact.account.bound_session_id, None);
        assert_eq!(contact.account.session_hint.as_deref(), Some("cs_future"));
    }

    #[tokio::test]
    async fn hint_already_bound_elsewhere_is_refused() {
        let (payments, users) = setup().await;
        payments.ingest("cs_1", true).await.unwrap();
        users.upsert_on_contact(1, None, None, Some("cs_1")).await.unwrap();

        let second = users
            .upsert_on_contact(2, None, None, Some("cs_1"))
            .await
            .unwrap();
        assert!(!second.bound_from_hint);
        assert_eq!(second.account.bound_session_id, None);
    }

    #[tokio::test]
    async fn mark_fulfilled_reports_only_first_flip() {
        let (_payments, users) = setup().await;
        users.upsert_on_contact(3, None, None, None).await.unwrap();
        assert!(users.mark_fulfilled(3).await.unwrap());
        assert!(!users.mark_fulfilled(3).await.unwrap());
        assert!(!users.mark_fulfilled(404).await.unwrap());
    }

    #[tokio::test]
    async fn delete_returns_removed_account() {
        let (payments, users) = setup().await;
        payments.ingest("cs_1", true).await.unwrap();
        users.upsert_on_contact(5, None, None, Some("cs_1")).await.unwrap();

        let removed = users.delete(5).await.unwrap().unwrap();
        assert_eq!(removed.bound_session_id.as_deref(), Some("cs_1"));
        assert!(users.get(5).await.unwrap().is_none());
        assert!(users.delete(5).await.unwrap().is_none());
        assert!(payments.is_claimable("cs_1").await.unwrap());
    }
}
