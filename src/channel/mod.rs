//! Chat transports. Only Telegram for now.

pub mod telegram;

pub use telegram::TelegramChannel;
