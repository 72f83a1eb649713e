use std::sync::Arc;

use teloxide::{dptree, prelude::*, types::Update, utils::command::BotCommands};
use tracing::{error, info, warn};

use crate::services::guide_service::{GuideDelivery, GuideService};
use crate::state::AppState;

pub mod handlers;
pub mod intent;
pub mod keyboards;

pub async fn run_bot(
    bot: Bot,
    mut shutdown_signal: tokio::sync::broadcast::Receiver<()>,
    guide_service: GuideService,
    delivery: Arc<dyn GuideDelivery>,
) {
    info!("Starting bot dispatcher...");

    std::panic::set_hook(Box::new(|info| {
        error!("CRITICAL BOT PANIC: {:?}", info);
    }));

    let bot_username = match bot.get_me().await {
        Ok(me) => {
            let username = me.username.clone().unwrap_or_else(|| "unknown".into());
            info!("Bot connected as: @{}", username);
            username
        }
        Err(e) => {
            error!("CRITICAL: Bot failed to connect to Telegram: {}", e);
            return;
        }
    };

    if let Err(e) = bot.set_my_commands(intent::Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", e);
    }

    let state = AppState {
        guide_service,
        delivery,
        bot_username,
    };

    let handler = Update::filter_message().endpoint(handlers::command::message_handler);

    let mut dispatcher = Dispatcher::builder(bot, dptree::entry().branch(handler))
        .dependencies(dptree::deps![state])
        .default_handler(|upd: Arc<Update>| async move {
            info!("Unhandled update: {:?}", upd.id);
        })
        .build();

    tokio::select! {
        _ = dispatcher.dispatch() => {
            info!("Bot dispatcher exited naturally");
        }
        _ = shutdown_signal.recv() => {
            info!("Bot received shutdown signal, stopping...");
        }
    }
}
