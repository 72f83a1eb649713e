use std::sync::Arc;

use tollgate_db::services::admin_service::AdminService;

use crate::config::PanelConfig;
use crate::services::session_service::SessionService;
use crate::services::webhook_service::WebhookService;

#[derive(Clone)]
pub struct AppState {
    pub admin: AdminService,
    pub webhook: Arc<WebhookService>,
    pub sessions: SessionService,
    pub config: Arc<PanelConfig>,
}

impl AppState {
    pub fn admin_path(&self) -> &str {
        &self.config.admin_path
    }
}
