use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::user::UserAccount;
use crate::repositories::payment_repo::PaymentRepository;
use crate::repositories::user_repo::UserRepository;

/// Upper bound on claim attempts lost to concurrent reconciliations.
const MAX_CLAIM_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// This call granted the asset; the caller must deliver it.
    Fulfill { session_id: String },
    /// Granted earlier. `delivered` tells whether the document reached the user.
    AlreadyFulfilled { delivered: bool },
    NotFound(NotFoundReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// No account yet; the user has to start the bot first.
    NoAccount,
    /// Nothing paid is available for this user right now.
    NoPayment,
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileConfig {
    /// How long to wait for a webhook whose session the user already presented.
    pub settle_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            settle_timeout: Duration::from_secs(3),
            poll_interval: Duration::from_millis(500),
        }
    }
}

enum Step {
    Done(Decision),
    /// Nothing claimable; carries the account as last seen.
    Exhausted(UserAccount),
}

/// Decides, per user, whether the guide may be granted and performs the
/// binding that justifies it.
#[derive(Debug, Clone)]
pub struct ReconcileService {
    pool: SqlitePool,
    payments: PaymentRepository,
    users: UserRepository,
    config: ReconcileConfig,
}

impl ReconcileService {
    pub fn new(pool: SqlitePool, config: ReconcileConfig) -> Self {
        Self {
            payments: PaymentRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            pool,
            config,
        }
    }

    pub fn payments(&self) -> &PaymentRepository {
        &self.payments
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub async fn reconcile(&self, user_id: i64) -> Result<Decision> {
        let account = match self.step(user_id).await? {
            Step::Done(decision) => return Ok(decision),
            Step::Exhausted(account) => account,
        };

        let Some(hint) = account.session_hint.clone() else {
            return Ok(Decision::NotFound(NotFoundReason::NoPayment));
        };
        if self.config.settle_timeout.is_zero() || self.payments.get(&hint).await?.is_some() {
            return Ok(Decision::NotFound(NotFoundReason::NoPayment));
        }

        // The user holds a session the ledger has not seen yet; its webhook is
        // most likely in flight.
        debug!("Reconcile: user {} waiting for session {}", user_id, hint);
        let waited = tokio::time::timeout(self.config.settle_timeout, async {
            loop {
                tokio::time::sleep(self.config.poll_interval).await;
                if let Step::Done(decision) = self.step(user_id).await? {
                    return Ok::<_, anyhow::Error>(decision);
                }
            }
        })
        .await;

        match waited {
            Ok(decision) => decision,
            Err(_) => {
                info!("Reconcile: session {} still unknown after settle window", hint);
                Ok(Decision::NotFound(NotFoundReason::NoPayment))
            }
        }
    }

    /// One pass of the decision procedure, retrying lost claims internally.
    async fn step(&self, user_id: i64) -> Result<Step> {
        for attempt in 0..MAX_CLAIM_ATTEMPTS {
            let Some(account) = self.users.get(user_id).await? else {
                return Ok(Step::Done(Decision::NotFound(NotFoundReason::NoAccount)));
            };

            if account.fulfilled {
                return Ok(Step::Done(Decision::AlreadyFulfilled {
                    delivered: account.delivered,
                }));
            }

            if let Some(session_id) = account.bound_session_id.clone() {
                if !self.payments.is_paid(&session_id).await? {
                    return Ok(Step::Exhausted(account));
                }
                if self.users.mark_fulfilled(user_id).await? {
                    info!("Reconcile: user {} fulfilled via bound session {}", user_id, session_id);
                    return Ok(Step::Done(Decision::Fulfill { session_id }));
                }
                // A concurrent call flipped it first; re-read.
                continue;
            }

            let Some(candidate) = self.nominate().await? else {
                return Ok(Step::Exhausted(account));
            };

            if self.try_claim(user_id, &candidate).await? {
                info!("Reconcile: user {} claimed session {}", user_id, candidate);
                return Ok(Step::Done(Decision::Fulfill {
                    session_id: candidate,
                }));
            }
            debug!(
                "Reconcile: user {} lost session {} (attempt {}), retrying",
                user_id,
                candidate,
                attempt + 1
            );
        }

        warn!("Reconcile: user {} gave up after {} contended attempts", user_id, MAX_CLAIM_ATTEMPTS);
        Ok(Step::Done(Decision::NotFound(NotFoundReason::NoPayment)))
    }

    /// Oldest paid unbound record. The deep-link hint plays no part here; it
    /// only binds on first contact and triggers the settle window.
    async fn nominate(&self) -> Result<Option<String>> {
        self.payments.claim_oldest_unbound().await
    }

    /// Bind and fulfill in one transaction. False means someone else got there
    /// first: the record was taken, or the account changed under us.
    async fn try_claim(&self, user_id: i64, session_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to open claim transaction")?;

        if !UserRepository::bind_with(&mut *tx, user_id, session_id).await? {
            tx.rollback().await.context("Failed to roll back claim")?;
            return Ok(false);
        }
        if !UserRepository::mark_fulfilled_with(&mut *tx, user_id).await? {
            tx.rollback().await.context("Failed to roll back claim")?;
            return Ok(false);
        }

        tx.commit().await.context("Failed to commit claim")?;
        Ok(true)
    }
}
