use teloxide::types::{KeyboardButton, KeyboardMarkup};

pub const CHECK_PAYMENT_BUTTON: &str = "🔑 Check payment and get the guide";

pub fn check_payment_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(CHECK_PAYMENT_BUTTON)]]).resize_keyboard()
}
