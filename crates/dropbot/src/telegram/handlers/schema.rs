//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message};

use super::callbacks::handle_callback;
use super::commands::handle_command;
use super::messages::{handle_photo_message, handle_url_message};
use super::types::{HandlerDeps, HandlerError};
use crate::telegram::bot::Command;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Commands are matched first, then photos (custom thumbnails), then any
/// other text is treated as a URL submission. Button presses go to the
/// callback router.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_photos = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(photo_handler(deps_photos))
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_command(bot, msg.clone(), cmd, deps).await {
                    log::error!("Command handler failed in chat {}: {}", msg.chat.id, e);
                }
                Ok(())
            }
        },
    ))
}

fn photo_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.photo().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_photo_message(bot, msg.clone(), deps).await {
                    log::error!("Photo handler failed in chat {}: {}", msg.chat.id, e);
                }
                Ok(())
            }
        })
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some_and(|text| !text.starts_with('/')))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_url_message(bot.clone(), msg.clone(), deps).await {
                    log::error!("URL handler failed in chat {}: {}", msg.chat.id, e);
                    let _ = bot
                        .send_message(msg.chat.id, format!("❌ An error occurred: {}", e))
                        .await;
                }
                Ok(())
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move { handle_callback(bot, q, deps).await }
    })
}
