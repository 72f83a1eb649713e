use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    pub bot_username: String,
    pub stripe_webhook_secret: String,
    /// bcrypt hash; generate with `tollgate-panel hash-password`.
    #[serde(default)]
    pub admin_password_hash: String,
    #[serde(default = "default_admin_path")]
    pub admin_path: String,
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: i64,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
}

#[derive(Debug, Deserialize)]
struct DatabaseSection {
    #[serde(default = "default_database_url")]
    database_url: String,
}

fn default_database_url() -> String {
    "sqlite://tollgate.db".to_string()
}

fn default_listen_port() -> u16 {
    5000
}

fn default_admin_path() -> String {
    "/admin".to_string()
}

fn default_webhook_tolerance_secs() -> i64 {
    300
}

fn default_session_ttl_hours() -> i64 {
    24
}

impl PanelConfig {
    pub fn load() -> Result<Self> {
        let config_paths = ["/etc/tollgate/panel.toml", "./panel.toml"];

        let config = config_paths
            .iter()
            .find_map(|path| fs::read_to_string(path).ok().map(|c| (path, c)));

        let mut config = match config {
            Some((path, contents)) => {
                tracing::info!("Loading config from {}", path);
                toml::from_str::<Self>(&contents)
                    .with_context(|| format!("Invalid config in {}", path))?
            }
            None => {
                tracing::info!("Loading config from environment");
                Self::from_env()?
            }
        };
        config.admin_path = normalize_admin_path(&config.admin_path);
        Ok(config)
    }

    /// Only the database location, for CLI commands that never serve HTTP.
    pub fn load_database_url() -> Result<String> {
        let config_paths = ["/etc/tollgate/panel.toml", "./panel.toml"];

        for path in config_paths {
            if let Ok(contents) = fs::read_to_string(path) {
                let section: DatabaseSection = toml::from_str(&contents)
                    .with_context(|| format!("Invalid config in {}", path))?;
                return Ok(section.database_url);
            }
        }
        Ok(std::env::var("DATABASE_URL").unwrap_or_else(|_| default_database_url()))
    }

    fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").unwrap_or_else(|_| default_database_url()),
            listen_port: std::env::var("LISTEN_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(default_listen_port),
            bot_username: std::env::var("BOT_USERNAME").context("BOT_USERNAME is not set")?,
            stripe_webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET")
                .context("STRIPE_WEBHOOK_SECRET is not set")?,
            admin_password_hash: std::env::var("ADMIN_PASSWORD_HASH").unwrap_or_default(),
            admin_path: std::env::var("ADMIN_PATH").unwrap_or_else(|_| default_admin_path()),
            webhook_tolerance_secs: std::env::var("WEBHOOK_TOLERANCE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_webhook_tolerance_secs),
            session_ttl_hours: std::env::var("SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_session_ttl_hours),
        })
    }
}

/// Leading slash, no trailing slash, never the site root.
pub fn normalize_admin_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return default_admin_path();
    }
    format!("/{}", trimmed)
}
