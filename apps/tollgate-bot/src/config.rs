use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tollgate_db::services::reconcile_service::ReconcileConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub bot_token: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_guide_path")]
    pub guide_path: String,
    #[serde(default = "default_guide_filename")]
    pub guide_filename: String,
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,
    #[serde(default = "default_settle_poll_ms")]
    pub settle_poll_ms: u64,
}

fn default_database_url() -> String {
    "sqlite://tollgate.db".to_string()
}

fn default_guide_path() -> String {
    "guide.pdf".to_string()
}

fn default_guide_filename() -> String {
    "guide.pdf".to_string()
}

fn default_settle_timeout_ms() -> u64 {
    3000
}

fn default_settle_poll_ms() -> u64 {
    500
}

impl BotConfig {
    pub fn load() -> Result<Self> {
        let config_paths = ["/etc/tollgate/bot.toml", "./bot.toml"];

        for path in config_paths {
            if let Ok(contents) = fs::read_to_string(path) {
                tracing::info!("Loading config from {}", path);
                return toml::from_str(&contents).with_context(|| format!("Invalid config in {}", path));
            }
        }

        tracing::info!("Loading config from environment");
        Self::from_env()
    }

    fn from_env() -> Result<Self> {
        Ok(Self {
            bot_token: std::env::var("BOT_TOKEN").context("BOT_TOKEN is not set")?,
            database_url: std::env::var("DATABASE_URL").unwrap_or_else(|_| default_database_url()),
            guide_path: std::env::var("GUIDE_PATH").unwrap_or_else(|_| default_guide_path()),
            guide_filename: std::env::var("GUIDE_FILENAME")
                .unwrap_or_else(|_| default_guide_filename()),
            settle_timeout_ms: std::env::var("SETTLE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_settle_timeout_ms),
            settle_poll_ms: std::env::var("SETTLE_POLL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_settle_poll_ms),
        })
    }

    pub fn reconcile(&self) -> ReconcileConfig {
        ReconcileConfig {
            settle_timeout: Duration::from_millis(self.settle_timeout_ms),
            poll_interval: Duration::from_millis(self.settle_poll_ms.max(10)),
        }
    }
}
