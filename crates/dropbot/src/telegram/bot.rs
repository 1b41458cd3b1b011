//! Bot initialization and the command set
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Registration of the command list shown in the Telegram UI

use reqwest::ClientBuilder;
use secrecy::{ExposeSecret, SecretString};
use teloxide::prelude::*;
use teloxide::utils::command::{BotCommands, ParseError};

use dropcore::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "start the bot")]
    Start,
    #[command(description = "show help")]
    Help,
    #[command(description = "configure upload settings")]
    Settings,
    #[command(description = "set a custom caption", parse_with = rest_of_line)]
    Caption(String),
    #[command(description = "remove the custom caption")]
    ClearCaption,
    #[command(description = "remove the custom thumbnail")]
    ClearThumbnail,
    #[command(description = "stop the active download")]
    Cancel,
    #[command(description = "check your premium subscription")]
    Upgrade,
    #[command(description = "ban a user (admins only)", parse_with = rest_of_line)]
    Ban(String),
    #[command(description = "unban a user (admins only)", parse_with = rest_of_line)]
    Unban(String),
    #[command(description = "grant paid status: <user_id> [30d|2m|1y] (admins only)", parse_with = rest_of_line)]
    AddPaid(String),
    #[command(description = "revoke paid status (admins only)", parse_with = rest_of_line)]
    RemovePaid(String),
    #[command(description = "list active paid users (admins only)")]
    PaidUsers,
}

/// Hands the whole argument string to the handler; empty when missing.
fn rest_of_line(input: String) -> Result<(String,), ParseError> {
    Ok((input.trim().to_string(),))
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to create bot (invalid URL, HTTP client setup)
pub fn create_bot(token: &SecretString) -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(token.expose_secret(), client);

    // Check if local Bot API server is configured
    let bot = if let Ok(bot_api_url) = std::env::var("BOT_API_URL") {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url = url::Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        bot.set_api_url(url)
    } else {
        bot
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI. Admin commands stay unlisted.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "start the bot"),
        BotCommand::new("help", "show help"),
        BotCommand::new("settings", "configure upload settings"),
        BotCommand::new("caption", "set a custom caption"),
        BotCommand::new("clearcaption", "remove the custom caption"),
        BotCommand::new("clearthumbnail", "remove the custom thumbnail"),
        BotCommand::new("cancel", "stop the active download"),
        BotCommand::new("upgrade", "check your premium subscription"),
    ])
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn command_list_mentions_user_commands() {
        let command_list = Command::descriptions().to_string();

        assert!(command_list.contains("Available commands:"));
        assert!(command_list.contains("/settings"));
        assert!(command_list.contains("/clearthumbnail"));
        assert!(command_list.contains("/addpaid"));
        assert!(command_list.contains("/upgrade"));
        assert!(command_list.contains("/paidusers"));
    }

    #[test]
    fn arguments_keep_their_spaces() {
        assert_eq!(
            Command::parse("/caption  via @my_channel ", "dropbot").unwrap(),
            Command::Caption("via @my_channel".to_string())
        );
        assert_eq!(
            Command::parse("/addpaid 12456767 30d", "dropbot").unwrap(),
            Command::AddPaid("12456767 30d".to_string())
        );
        assert_eq!(Command::parse("/caption", "dropbot").unwrap(), Command::Caption(String::new()));
        assert_eq!(Command::parse("/clearcaption", "dropbot").unwrap(), Command::ClearCaption);
    }
}
