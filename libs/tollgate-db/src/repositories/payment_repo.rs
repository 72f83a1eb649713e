use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::models::payment::{IngestResult, PaymentRecord, PaymentWithOwner};

/// Payment ledger. Rows are only ever inserted or flipped to paid, never removed.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a completed checkout. Re-delivery of the same session is absorbed.
    pub async fn ingest(&self, session_id: &str, paid: bool) -> Result<IngestResult> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (session_id, paid, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(session_id) DO NOTHING
            "#,
        )
        .bind(session_id)
        .bind(paid)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to ingest payment")?;

        let created = result.rows_affected() == 1;
        if created {
            info!("Ledger: recorded session {} (paid: {})", session_id, paid);
        } else {
            debug!("Ledger: duplicate delivery for session {} ignored", session_id);
        }
        Ok(IngestResult { created })
    }

    /// Mark a session paid once its delayed payment settles. Inserts the row if
    /// the completion event never arrived. Returns true if anything changed.
    pub async fn confirm_paid(&self, session_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO payments (session_id, paid, created_at)
            VALUES (?1, 1, ?2)
            ON CONFLICT(session_id) DO UPDATE SET paid = 1
            WHERE payments.paid = 0
            "#,
        )
        .bind(session_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to confirm payment")?;

        let changed = result.rows_affected() == 1;
        if changed {
            info!("Ledger: session {} confirmed paid", session_id);
        }
        Ok(changed)
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<PaymentRecord>> {
        sqlx::query_as::<_, PaymentRecord>(
            "SELECT id, session_id, paid, created_at FROM payments WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch payment")
    }

    /// Unknown sessions count as unpaid.
    pub async fn is_paid(&self, session_id: &str) -> Result<bool> {
        Ok(self.get(session_id).await?.is_some_and(|p| p.paid))
    }

    /// Paid and not referenced by any account.
    pub async fn is_claimable(&self, session_id: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM payments p
                WHERE p.session_id = ?1 AND p.paid = 1
                  AND NOT EXISTS (SELECT 1 FROM users u WHERE u.bound_session_id = p.session_id)
            )
            "#,
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check claimability")
    }

    /// Oldest paid session no account is bound to. This only nominates a
    /// candidate; the binding itself is taken by the reconciliation engine.
    pub async fn claim_oldest_unbound(&self) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.session_id FROM payments p
            WHERE p.paid = 1
              AND NOT EXISTS (SELECT 1 FROM users u WHERE u.bound_session_id = p.session_id)
            ORDER BY p.created_at ASC, p.id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up unbound payments")
    }

    pub async fn list_with_owner(&self) -> Result<Vec<PaymentWithOwner>> {
        sqlx::query_as::<_, PaymentWithOwner>(
            r#"
            SELECT p.id, p.session_id, p.paid, p.created_at, u.user_id AS bound_user_id
            FROM payments p
            LEFT JOIN users u ON u.bound_session_id = p.session_id
            ORDER BY p.created_at DESC, p.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list payments")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_memory;

    #[tokio::test]
    async fn duplicate_ingest_is_absorbed() {
        let repo = PaymentRepository::new(connect_memory().await.unwrap());

        assert!(repo.ingest("cs_1", true).await.unwrap().created);
        assert!(!repo.ingest("cs_1", true).await.unwrap().created);
        assert!(!repo.ingest("cs_1", false).await.unwrap().created);

        let all = repo.list_with_owner().await.unwrap();
        assert_eq!(all.len(), 1);
        // The second delivery must not downgrade the first.
        assert!(all[0].paid);
    }

    #[tokio::test]
    async fn unknown_session_is_not_paid() {
        let repo = PaymentRepository::new(connect_memory().await.unwrap());
        assert!(!repo.is_paid("cs_missing").await.unwrap());
        assert!(!repo.is_claimable("cs_missing").await.unwrap());
    }

    #[tokio::test]
    async fn confirm_paid_upgrades_pending_session() {
        let repo = PaymentRepository::new(connect_memory().await.unwrap());
        repo.ingest("cs_async", false).await.unwrap();
        assert!(!repo.is_paid("cs_async").await.unwrap());
        assert_eq!(repo.claim_oldest_unbound().await.unwrap(), None);

        assert!(repo.confirm_paid("cs_async").await.unwrap());
        assert!(!repo.confirm_paid("cs_async").await.unwrap());
        assert!(repo.is_paid("cs_async").await.unwrap());
        assert_eq!(
            repo.claim_oldest_unbound().await.unwrap().as_deref(),
            Some("cs_async")
        );
    }

    #[tokio::test]
    async fn confirm_paid_inserts_missing_session() {
        let repo = PaymentRepository::new(connect_memory().await.unwrap());
        assert!(repo.confirm_paid("cs_late").await.unwrap());
        assert!(repo.is_paid("cs_late").await.unwrap());
    }

    #[tokio::test]
    async fn oldest_unbound_follows_ingest_order() {
        let repo = PaymentRepository::new(connect_memory().await.unwrap());
        repo.ingest("cs_a", true).await.unwrap();
        repo.ingest("cs_b", true).await.unwrap();

        assert_eq!(
            repo.claim_oldest_unbound().await.unwrap().as_deref(),
            Some("cs_a")
        );
        // Nominating does not reserve.
        assert_eq!(
            repo.claim_oldest_unbound().await.unwrap().as_deref(),
            Some("cs_a")
        );
    }
}
