//! Slash command handlers

use chrono::{Duration, Utc};
use teloxide::prelude::*;
use teloxide::types::{Message, ParseMode};

use dropcore::core::escape_html;

use super::types::{ensure_user_exists, sender_id, sender_username, HandlerDeps, HandlerError};
use crate::telegram::access::{paid_users_text, subscription_text, BANNED};
use crate::telegram::bot::Command;
use crate::telegram::keyboards;

async fn reply(bot: &Bot, msg: &Message, text: impl Into<String>) -> Result<(), HandlerError> {
    bot.send_message(msg.chat.id, text).parse_mode(ParseMode::Html).await?;
    Ok(())
}

/// Routes a parsed command. Every reply is best effort; store failures are
/// reported to the user and logged.
pub async fn handle_command(bot: Bot, msg: Message, cmd: Command, deps: HandlerDeps) -> Result<(), HandlerError> {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };
    log::info!("Received command {:?} from user {}", cmd, user_id);
    ensure_user_exists(&deps, user_id, sender_username(&msg)).await;

    match cmd {
        Command::Start => {
            let first_name = msg.from.as_ref().map(|u| u.first_name.as_str()).unwrap_or("there");
            bot.send_message(msg.chat.id, keyboards::start_text(first_name))
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::start_keyboard())
                .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, keyboards::help_text())
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::back_keyboard())
                .await?;
        }
        Command::Settings => handle_settings_command(&bot, &msg, user_id, &deps).await?,
        Command::Caption(text) => handle_caption_command(&bot, &msg, user_id, &text, &deps).await?,
        Command::ClearCaption => match deps.store.clear_caption(user_id).await {
            Ok(()) => reply(&bot, &msg, "✅ Custom caption has been removed.").await?,
            Err(e) => {
                log::error!("Failed to clear caption for {}: {}", user_id, e);
                reply(&bot, &msg, "❌ Failed to remove caption. Please try again.").await?;
            }
        },
        Command::ClearThumbnail => match deps.store.set_thumbnail(user_id, None).await {
            Ok(()) => reply(&bot, &msg, "✅ Custom thumbnail has been removed.").await?,
            Err(e) => {
                log::error!("Failed to clear thumbnail for {}: {}", user_id, e);
                reply(&bot, &msg, "❌ Failed to remove thumbnail. Please try again.").await?;
            }
        },
        Command::Cancel => match deps.registry.cancel_for_user(user_id) {
            Some(job_id) => {
                log::info!("User {} cancelled job {} with /cancel", user_id, job_id);
                reply(&bot, &msg, "⏹️ Cancelling your download...").await?;
            }
            None => reply(&bot, &msg, "You have no active download.").await?,
        },
        Command::Upgrade => {
            let user = deps.store.get_user(user_id).await?;
            reply(&bot, &msg, subscription_text(user.as_ref(), Utc::now())).await?;
        }
        Command::Ban(_) | Command::Unban(_) | Command::AddPaid(_) | Command::RemovePaid(_) | Command::PaidUsers
            if !deps.settings.is_admin(user_id) =>
        {
            log::warn!("User {} tried an admin command", user_id);
            reply(&bot, &msg, "⛔ This command is for admins only.").await?;
        }
        Command::Ban(arg) => handle_ban_command(&bot, &msg, &arg, true, &deps).await?,
        Command::Unban(arg) => handle_ban_command(&bot, &msg, &arg, false, &deps).await?,
        Command::AddPaid(arg) => handle_addpaid_command(&bot, &msg, &arg, &deps).await?,
        Command::RemovePaid(arg) => handle_removepaid_command(&bot, &msg, &arg, &deps).await?,
        Command::PaidUsers => {
            let users = deps.store.paid_users().await?;
            reply(&bot, &msg, paid_users_text(&users, Utc::now())).await?;
        }
    }
    Ok(())
}

pub async fn handle_settings_command(
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let user = deps.store.get_user(user_id).await?;
    if user.as_ref().is_some_and(|u| u.banned) {
        return reply(bot, msg, BANNED).await;
    }
    let prefs = user.map(|u| u.preferences).unwrap_or_default();
    bot.send_message(msg.chat.id, keyboards::settings_text(&prefs))
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboards::settings_keyboard(&prefs))
        .await?;
    Ok(())
}

async fn handle_caption_command(
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    text: &str,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    if text.is_empty() {
        return reply(
            bot,
            msg,
            "Please provide a caption text.\n\nExample: <code>/caption Your custom caption here</code>",
        )
        .await;
    }
    match deps.store.set_caption(user_id, text.to_string()).await {
        Ok(()) => {
            reply(
                bot,
                msg,
                format!(
                    "✅ Custom caption has been set successfully!\n\nYour caption: {}",
                    escape_html(text)
                ),
            )
            .await
        }
        Err(e) => {
            log::error!("Failed to set caption for {}: {}", user_id, e);
            reply(bot, msg, "❌ Failed to set caption. Please try again.").await
        }
    }
}

async fn handle_ban_command(
    bot: &Bot,
    msg: &Message,
    arg: &str,
    banned: bool,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let verb = if banned { "ban" } else { "unban" };
    if arg.is_empty() {
        return reply(bot, msg, format!("Please provide a user ID to {}.", verb)).await;
    }
    let Some(target) = parse_user_id(arg) else {
        return reply(bot, msg, "Please provide a valid user ID.").await;
    };
    match deps.store.set_banned(target, banned).await {
        Ok(()) => {
            log::info!("User {} {}ned", target, verb);
            reply(bot, msg, format!("✅ User {} has been {}ned.", target, verb)).await
        }
        Err(e) => {
            log::error!("Failed to {} user {}: {}", verb, target, e);
            reply(bot, msg, format!("❌ Failed to {} user {}.", verb, target)).await
        }
    }
}

async fn handle_addpaid_command(bot: &Bot, msg: &Message, arg: &str, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let mut args = arg.split_whitespace();
    let Some(first) = args.next() else {
        return reply(
            bot,
            msg,
            "Please provide a user ID and optional duration.\nFormat: /addpaid &lt;user_id&gt; [duration]\nExample: /addpaid 12456767 30d",
        )
        .await;
    };
    let Some(target) = parse_user_id(first) else {
        return reply(bot, msg, "Please provide a valid user ID.").await;
    };
    let expiry = match args.next() {
        None => None,
        Some(spec) => match parse_paid_duration(spec) {
            Some(duration) => Some(Utc::now() + duration),
            None => {
                return reply(
                    bot,
                    msg,
                    "Invalid duration format. Please use a format like 30d (30 days), 2m (2 months) or 1y (1 year).",
                )
                .await;
            }
        },
    };

    if let Err(e) = deps.store.set_paid(target, true, expiry).await {
        log::error!("Failed to add paid user {}: {}", target, e);
        return reply(bot, msg, format!("❌ Failed to add user {} as paid user.", target)).await;
    }

    let until = expiry.map_or_else(
        || "without expiry".to_string(),
        |e| format!("until {}", e.format("%Y-%m-%d %H:%M:%S UTC")),
    );
    log::info!("User {} is now a paid user {}", target, until);
    reply(bot, msg, format!("✅ User {} has been added as a paid user {}.", target, until)).await?;

    if let Err(e) = bot
        .send_message(ChatId(target), format!("🎉 Your premium subscription is active {}.", until))
        .await
    {
        log::warn!("Failed to notify user {} about the subscription: {}", target, e);
        reply(
            bot,
            msg,
            format!("⚠️ Failed to send notification to user {}. They might have blocked the bot.", target),
        )
        .await?;
    }
    Ok(())
}

async fn handle_removepaid_command(
    bot: &Bot,
    msg: &Message,
    arg: &str,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    if arg.is_empty() {
        return reply(
            bot,
            msg,
            "Please provide a user ID to remove paid status.\nFormat: /removepaid &lt;user_id&gt;",
        )
        .await;
    }
    let Some(target) = parse_user_id(arg) else {
        return reply(bot, msg, "Please provide a valid user ID.").await;
    };
    let user = match deps.store.get_user(target).await? {
        Some(user) => user,
        None => return reply(bot, msg, format!("❌ User {} not found in database.", target)).await,
    };
    if !user.is_paid {
        return reply(bot, msg, format!("⚠️ User {} is not a paid user.", target)).await;
    }
    match deps.store.set_paid(target, false, None).await {
        Ok(()) => {
            log::info!("Paid status removed from user {}", target);
            reply(bot, msg, format!("✅ Paid status removed from user {}.", target)).await
        }
        Err(e) => {
            log::error!("Failed to remove paid status from {}: {}", target, e);
            reply(bot, msg, format!("❌ Failed to remove paid status from user {}.", target)).await
        }
    }
}

fn parse_user_id(arg: &str) -> Option<i64> {
    arg.split_whitespace().next()?.parse().ok()
}

/// `30d`, `2m` (30-day months), `1y` (365-day years); a bare number is days.
pub fn parse_paid_duration(spec: &str) -> Option<Duration> {
    let spec = spec.trim().to_ascii_lowercase();
    let (amount, unit) = match spec.char_indices().last()? {
        (i, c) if c.is_ascii_alphabetic() => (&spec[..i], c),
        _ => (spec.as_str(), 'd'),
    };
    let amount: i64 = amount.parse().ok().filter(|n| *n > 0)?;
    let days = match unit {
        'd' => amount,
        'm' => amount.checked_mul(30)?,
        'y' => amount.checked_mul(365)?,
        _ => return None,
    };
    Duration::try_days(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn paid_durations() {
        assert_eq!(parse_paid_duration("30d"), Some(Duration::days(30)));
        assert_eq!(parse_paid_duration("2M"), Some(Duration::days(60)));
        assert_eq!(parse_paid_duration("1y"), Some(Duration::days(365)));
        assert_eq!(parse_paid_duration("14"), Some(Duration::days(14)));
        for bad in ["", "d", "0d", "-3d", "3w", "1.5m", "99999999999999999y"] {
            assert_eq!(parse_paid_duration(bad), None, "{bad}");
        }
    }

    #[test]
    fn user_ids() {
        assert_eq!(parse_user_id("12456767"), Some(12456767));
        assert_eq!(parse_user_id(" 42 30d"), Some(42));
        assert_eq!(parse_user_id("@someone"), None);
    }
}
