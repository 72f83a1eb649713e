use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use teloxide::prelude::*;
use teloxide::types::InputFile;

use crate::services::guide_service::GuideDelivery;

/// Delivers the guide document over Telegram.
pub struct TelegramDelivery {
    bot: Bot,
    guide_path: PathBuf,
    guide_filename: String,
}

impl TelegramDelivery {
    pub fn new(bot: Bot, guide_path: impl Into<PathBuf>, guide_filename: String) -> Self {
        Self {
            bot,
            guide_path: guide_path.into(),
            guide_filename,
        }
    }
}

#[async_trait]
impl GuideDelivery for TelegramDelivery {
    async fn deliver_guide(&self, user_id: i64) -> Result<()> {
        let chat = ChatId(user_id);

        self.bot
            .send_message(chat, "✅ Thanks for your payment! Here is your guide:")
            .await
            .context("Failed to send thank-you message")?;

        let document = InputFile::file(&self.guide_path).file_name(self.guide_filename.clone());
        self.bot
            .send_document(chat, document)
            .await
            .with_context(|| format!("Failed to send {}", self.guide_path.display()))?;

        self.bot
            .send_message(chat, "📘 Tomorrow you will receive your first task!")
            .await
            .context("Failed to send follow-up notice")?;

        Ok(())
    }
}
