//! Chat transports for the dialogue runner

pub mod telegram;

pub use telegram::TelegramBot;
