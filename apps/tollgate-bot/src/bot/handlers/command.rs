use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info};

use crate::bot::intent::{self, Command, Intent};
use crate::bot::keyboards::check_payment_keyboard;
use crate::services::guide_service::CheckOutcome;
use crate::state::AppState;

const WELCOME: &str = "Hi! 👋 I'm your personal assistant.\n\n\
                       Press the button below to check your payment and get the guide.";
const NOT_FOUND: &str = "❌ Payment not found. Try again a bit later or contact support.";
const NO_ACCOUNT: &str = "Please send /start first so I can find your payment.";
const DELIVERY_FAILED: &str = "⚠️ Your payment is confirmed, but I couldn't send the guide. \
                               Press the button to try again.";
const ALREADY_DELIVERED: &str = "✅ Your payment is already confirmed and the guide was sent above.";
const INTERNAL_ERROR: &str = "⚠️ Something went wrong on our side. Please try again in a minute.";

pub async fn message_handler(bot: Bot, msg: Message, state: AppState) -> ResponseResult<()> {
    let (Some(text), Some(from)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };
    let user_id = from.id.0 as i64;

    match intent::route(text, &state.bot_username) {
        Intent::Start { token } => {
            info!("User {} started the bot (token: {})", user_id, token.is_some());
            let full_name = from.full_name();
            if let Err(e) = state
                .guide_service
                .register_contact(user_id, Some(&full_name), from.username.as_deref(), token.as_deref())
                .await
            {
                error!("Failed to register user {}: {:?}", user_id, e);
                bot.send_message(msg.chat.id, INTERNAL_ERROR).await?;
                return Ok(());
            }
            check_payment(&bot, &msg, &state, user_id, true).await
        }
        Intent::CheckPayment => check_payment(&bot, &msg, &state, user_id, false).await,
        Intent::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .reply_markup(check_payment_keyboard())
                .await?;
            Ok(())
        }
        Intent::Unknown => {
            bot.send_message(msg.chat.id, WELCOME)
                .reply_markup(check_payment_keyboard())
                .await?;
            Ok(())
        }
    }
}

async fn check_payment(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    user_id: i64,
    first_contact: bool,
) -> ResponseResult<()> {
    let outcome = match state.guide_service.check(user_id, state.delivery.as_ref()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Payment check failed for user {}: {:?}", user_id, e);
            bot.send_message(msg.chat.id, INTERNAL_ERROR).await?;
            return Ok(());
        }
    };
    info!("Payment check for user {}: {:?}", user_id, outcome);

    let reply = match outcome {
        CheckOutcome::Delivered => return Ok(()),
        CheckOutcome::NoPayment if first_contact => WELCOME,
        CheckOutcome::NoPayment => NOT_FOUND,
        CheckOutcome::NoAccount => NO_ACCOUNT,
        CheckOutcome::DeliveryFailed => DELIVERY_FAILED,
        CheckOutcome::AlreadyDelivered => ALREADY_DELIVERED,
    };

    bot.send_message(msg.chat.id, reply)
        .reply_markup(check_payment_keyboard())
        .await?;
    Ok(())
}
