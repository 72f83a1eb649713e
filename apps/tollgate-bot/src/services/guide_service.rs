use anyhow::Result;
use async_trait::async_trait;
use tollgate_db::models::user::ContactResult;
use tollgate_db::services::reconcile_service::{Decision, NotFoundReason, ReconcileService};
use tracing::{error, info};

/// Sends the guide to a user's private chat.
#[async_trait]
pub trait GuideDelivery: Send + Sync {
    async fn deliver_guide(&self, user_id: i64) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Delivered,
    /// Granted, but the document did not go out. The grant stands.
    DeliveryFailed,
    AlreadyDelivered,
    NoAccount,
    NoPayment,
}

#[derive(Clone)]
pub struct GuideService {
    reconcile: ReconcileService,
}

impl GuideService {
    pub fn new(reconcile: ReconcileService) -> Self {
        Self { reconcile }
    }

    pub async fn register_contact(
        &self,
        user_id: i64,
        display_name: Option<&str>,
        username: Option<&str>,
        token: Option<&str>,
    ) -> Result<ContactResult> {
        self.reconcile
            .users()
            .upsert_on_contact(user_id, display_name, username, token)
            .await
    }

    /// Reconcile the user and hand the guide over if that is authorized.
    pub async fn check(&self, user_id: i64, delivery: &dyn GuideDelivery) -> Result<CheckOutcome> {
        match self.reconcile.reconcile(user_id).await? {
            Decision::Fulfill { session_id } => {
                info!("Granting guide to user {} (session {})", user_id, session_id);
                self.deliver(user_id, delivery).await
            }
            // Granted before but never arrived: retry the send only.
            Decision::AlreadyFulfilled { delivered: false } => self.deliver(user_id, delivery).await,
            Decision::AlreadyFulfilled { delivered: true } => Ok(CheckOutcome::AlreadyDelivered),
            Decision::NotFound(NotFoundReason::NoAccount) => Ok(CheckOutcome::NoAccount),
            Decision::NotFound(NotFoundReason::NoPayment) => Ok(CheckOutcome::NoPayment),
        }
    }

    async fn deliver(&self, user_id: i64, delivery: &dyn GuideDelivery) -> Result<CheckOutcome> {
        match delivery.deliver_guide(user_id).await {
            Ok(()) => {
                self.reconcile.users().mark_delivered(user_id).await?;
                Ok(CheckOutcome::Delivered)
            }
            Err(e) => {
                error!("Failed to deliver guide to user {}: {:?}", user_id, e);
                Ok(CheckOutcome::DeliveryFailed)
            }
        }
    }
}
