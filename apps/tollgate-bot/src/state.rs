use std::sync::Arc;

use crate::services::guide_service::{GuideDelivery, GuideService};

#[derive(Clone)]
pub struct AppState {
    pub guide_service: GuideService,
    pub delivery: Arc<dyn GuideDelivery>,
    pub bot_username: String,
}
