use thiserror::Error;
use tollgate_db::repositories::payment_repo::PaymentRepository;
use tracing::{info, warn};

use super::stripe::{CheckoutSession, SignatureError, StripeEvent, StripeVerifier};

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Invalid signature: {0}")]
    Signature(#[from] SignatureError),
    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Recorded { session_id: String, created: bool, paid: bool },
    Confirmed { session_id: String },
    Ignored { event_type: String },
}

/// Turns verified processor notifications into ledger writes.
#[derive(Debug, Clone)]
pub struct WebhookService {
    payments: PaymentRepository,
    verifier: StripeVerifier,
}

impl WebhookService {
    pub fn new(payments: PaymentRepository, verifier: StripeVerifier) -> Self {
        Self { payments, verifier }
    }

    pub async fn handle(&self, payload: &str, signature: Option<&str>) -> Result<WebhookOutcome, WebhookError> {
        if let Err(e) = self.verifier.verify(payload, signature) {
            warn!("Rejected webhook: {}", e);
            return Err(e.into());
        }

        let event: StripeEvent = serde_json::from_str(payload)?;
        match event.event_type.as_str() {
            "checkout.session.completed" => {
                let session: CheckoutSession = serde_json::from_value(event.data.object)?;
                // Delayed methods complete with "unpaid" and settle later.
                let paid = session.payment_status.as_deref() != Some("unpaid");
                let result = self.payments.ingest(&session.id, paid).await?;
                if result.created {
                    info!(
                        "Recorded checkout session {} (paid: {}, reference: {}, event {})",
                        session.id,
                        paid,
                        session.client_reference_id.as_deref().unwrap_or("-"),
                        event.id
                    );
                } else {
                    info!("Duplicate notification for session {} (event {})", session.id, event.id);
                }
                Ok(WebhookOutcome::Recorded {
                    session_id: session.id,
                    created: result.created,
                    paid,
                })
            }
            "checkout.session.async_payment_succeeded" => {
                let session: CheckoutSession = serde_json::from_value(event.data.object)?;
                let changed = self.payments.confirm_paid(&session.id).await?;
                info!("Async payment succeeded for session {} (changed: {})", session.id, changed);
                Ok(WebhookOutcome::Confirmed { session_id: session.id })
            }
            other => {
                info!("Ignoring webhook event {} ({})", event.id, other);
                Ok(WebhookOutcome::Ignored {
                    event_type: other.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::stripe::sign;

    const SECRET: &str = "whsec_unit";

    async fn service() -> (WebhookService, PaymentRepository) {
        let pool = tollgate_db::connect_memory().await.unwrap();
        let payments = PaymentRepository::new(pool);
        let service = WebhookService::new(payments.clone(), StripeVerifier::new(SECRET, 300));
        (service, payments)
    }

    fn event(event_type: &str, session_id: &str, payment_status: &str) -> String {
        serde_json::json!({
            "id": format!("evt_{}", session_id),
            "type": event_type,
            "data": { "object": { "id": session_id, "payment_status": payment_status } }
        })
        .to_string()
    }

    fn signed(payload: &str) -> String {
        sign(SECRET, payload, chrono::Utc::now().timestamp())
    }

    #[tokio::test]
    async fn completed_event_records_paid_session() {
        let (service, payments) = service().await;
        let payload = event("checkout.session.completed", "cs_1", "paid");

        let outcome = service.handle(&payload, Some(&signed(&payload))).await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Recorded { session_id: "cs_1".into(), created: true, paid: true }
        );
        assert!(payments.is_paid("cs_1").await.unwrap());

        let again = service.handle(&payload, Some(&signed(&payload))).await.unwrap();
        assert_eq!(
            again,
            WebhookOutcome::Recorded { session_id: "cs_1".into(), created: false, paid: true }
        );
    }

    #[tokio::test]
    async fn async_payment_is_confirmed_later() {
        let (service, payments) = service().await;
        let completed = event("checkout.session.completed", "cs_async", "unpaid");
        service.handle(&completed, Some(&signed(&completed))).await.unwrap();
        assert!(!payments.is_paid("cs_async").await.unwrap());

        let succeeded = event("checkout.session.async_payment_succeeded", "cs_async", "paid");
        service.handle(&succeeded, Some(&signed(&succeeded))).await.unwrap();
        assert!(payments.is_paid("cs_async").await.unwrap());
    }

    #[tokio::test]
    async fn unsigned_event_writes_nothing() {
        let (service, payments) = service().await;
        let payload = event("checkout.session.completed", "cs_forged", "paid");

        let err = service.handle(&payload, None).await.unwrap_err();
        assert!(matches!(err, WebhookError::Signature(SignatureError::MissingHeader)));
        assert!(payments.get("cs_forged").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unrelated_events_are_ignored() {
        let (service, payments) = service().await;
        let payload = event("invoice.paid", "in_1", "paid");

        let outcome = service.handle(&payload, Some(&signed(&payload))).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored { event_type: "invoice.paid".into() });
        assert!(payments.get("in_1").await.unwrap().is_none());
    }
}
