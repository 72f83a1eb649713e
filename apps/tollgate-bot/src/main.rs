use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod bot;
mod config;
mod services;
mod state;

use crate::config::BotConfig;
use crate::services::delivery::TelegramDelivery;
use crate::services::guide_service::GuideService;
use tollgate_db::services::reconcile_service::ReconcileService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tollgate_bot=debug,tollgate_db=debug,teloxide=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tollgate Bot...");

    let config = BotConfig::load()?;
    let pool = tollgate_db::connect(&config.database_url).await?;
    tracing::info!("Database ready at {}", config.database_url);

    let bot = Bot::new(&config.bot_token);
    let delivery = Arc::new(TelegramDelivery::new(
        bot.clone(),
        config.guide_path.clone(),
        config.guide_filename.clone(),
    ));
    let guide_service = GuideService::new(ReconcileService::new(pool, config.reconcile()));

    let (tx, rx) = tokio::sync::broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(());
        }
    });

    bot::run_bot(bot, rx, guide_service, delivery).await;
    Ok(())
}
