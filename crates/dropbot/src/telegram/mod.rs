//! Telegram bot integration and handlers

pub mod access;
pub mod bot;
pub mod callback;
pub mod handlers;
pub mod keyboards;
pub mod transport;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use transport::TeloxideTransport;
