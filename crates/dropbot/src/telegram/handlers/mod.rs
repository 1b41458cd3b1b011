//! Telegram bot handler tree configuration
//!
//! The dispatcher schema lives in [`schema`]; each branch delegates to a
//! plain async function taking the bot, the update and [`HandlerDeps`].

mod callbacks;
mod commands;
mod messages;
mod schema;
mod types;

pub use commands::parse_paid_duration;
pub use schema::schema;
pub use types::{ensure_user_exists, HandlerDeps, HandlerError};
