use teloxide::utils::command::BotCommands;

use crate::bot::keyboards::CHECK_PAYMENT_BUTTON;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "start the bot (payment links pass a token here)")]
    Start(String),
    #[command(description = "check your payment and get the guide")]
    Check,
    #[command(description = "show this help")]
    Help,
}

/// What an incoming message asks the bot to do.
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    Start { token: Option<String> },
    CheckPayment,
    Help,
    Unknown,
}

/// Reply-keyboard labels, matched verbatim.
const TEXT_ROUTES: &[(&str, Intent)] = &[(CHECK_PAYMENT_BUTTON, Intent::CheckPayment)];

impl From<Command> for Intent {
    fn from(command: Command) -> Self {
        match command {
            Command::Start(arg) => {
                let token = arg.trim();
                Intent::Start {
                    token: (!token.is_empty()).then(|| token.to_string()),
                }
            }
            Command::Check => Intent::CheckPayment,
            Command::Help => Intent::Help,
        }
    }
}

pub fn route(text: &str, bot_username: &str) -> Intent {
    if let Ok(command) = Command::parse(text, bot_username) {
        return command.into();
    }

    let text = text.trim();
    TEXT_ROUTES
        .iter()
        .find(|(label, _)| *label == text)
        .map(|(_, intent)| intent.clone())
        .unwrap_or(Intent::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_with_deep_link_token() {
        assert_eq!(
            route("/start cs_test_a1b2", "guide_bot"),
            Intent::Start {
                token: Some("cs_test_a1b2".to_string())
            }
        );
    }

    #[test]
    fn bare_start_has_no_token() {
        assert_eq!(route("/start", "guide_bot"), Intent::Start { token: None });
    }

    #[test]
    fn button_and_command_both_check() {
        assert_eq!(route(CHECK_PAYMENT_BUTTON, "guide_bot"), Intent::CheckPayment);
        assert_eq!(route("/check", "guide_bot"), Intent::CheckPayment);
        assert_eq!(route("/check@guide_bot", "guide_bot"), Intent::CheckPayment);
    }

    #[test]
    fn free_text_is_unknown() {
        assert_eq!(route("hello", "guide_bot"), Intent::Unknown);
        assert_eq!(route("/check@other_bot", "guide_bot"), Intent::Unknown);
    }
}
