//! Plain messages: URLs to download and photos to keep as thumbnails.

use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{Message, ParseMode};
use uuid::Uuid;

use dropcore::core::{escape_html, is_valid_url};

use super::types::{ensure_user_exists, sender_id, sender_username, HandlerDeps, HandlerError};
use crate::telegram::access::{check_access, quota_exceeded_text, usage_text, Access, BANNED};
use crate::telegram::keyboards;

const PROCESSING: &str = "🔍 Processing URL... Please wait.";

/// A text message: the submission path for URLs.
///
/// Order: ban, quota, URL shape, one-job-per-user, then the URL is recorded,
/// the quota is charged and the format list is fetched.
pub async fn handle_url_message(bot: Bot, msg: Message, deps: HandlerDeps) -> Result<(), HandlerError> {
    let (Some(user_id), Some(text)) = (sender_id(&msg), msg.text()) else {
        return Ok(());
    };
    ensure_user_exists(&deps, user_id, sender_username(&msg)).await;

    let user = deps.store.get_user(user_id).await?;
    let used_today = deps.store.daily_task_count(user_id).await?;
    let limit = deps.settings.daily_task_limit;

    let metered = match check_access(user_id, user.as_ref(), &deps.settings, used_today, Utc::now()) {
        Access::Banned => {
            bot.send_message(msg.chat.id, BANNED).await?;
            return Ok(());
        }
        Access::QuotaExceeded { limit } => {
            log::info!("User {} is over the daily limit ({})", user_id, limit);
            bot.send_message(msg.chat.id, quota_exceeded_text(limit)).await?;
            return Ok(());
        }
        Access::Allowed { metered } => metered,
    };

    let url = text.trim();
    if !is_valid_url(url) {
        bot.send_message(msg.chat.id, "❌ Invalid URL. Please send a valid YTDL-supported URL.")
            .await?;
        return Ok(());
    }

    if deps.registry.is_busy(user_id) {
        bot.send_message(
            msg.chat.id,
            "⚠️ You already have an active download. Please wait for it to complete.",
        )
        .await?;
        return Ok(());
    }

    let url_id = Uuid::new_v4().simple().to_string();
    deps.store.store_url(url_id.clone(), url.to_string(), user_id).await?;

    let usage = if metered {
        let used = deps.store.track_daily_task(user_id).await?;
        Some(usage_text(used, limit))
    } else {
        None
    };

    let processing_text = match &usage {
        Some(usage) => format!("{}\n\n{}", PROCESSING, usage),
        None => PROCESSING.to_string(),
    };
    let processing = bot.send_message(msg.chat.id, processing_text).await?;
    log::info!("User {} submitted {} as {}", user_id, url, url_id);

    match deps.pipeline.downloader().describe(url).await {
        Ok(media) => {
            bot.edit_message_text(msg.chat.id, processing.id, keyboards::formats_text(&media, usage.as_deref()))
                .parse_mode(ParseMode::Html)
                .reply_markup(keyboards::formats_keyboard(&url_id, &media))
                .await?;
        }
        Err(e) => {
            log::warn!("Could not describe {}: {}", url, e);
            bot.edit_message_text(
                msg.chat.id,
                processing.id,
                format!(
                    "❌ Failed to fetch video information. Make sure the URL is valid and supported.\n\n<i>{}</i>",
                    escape_html(e.message())
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
    }
    Ok(())
}

/// A photo: the largest size becomes the user's custom thumbnail.
pub async fn handle_photo_message(bot: Bot, msg: Message, deps: HandlerDeps) -> Result<(), HandlerError> {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };
    let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
        return Ok(());
    };
    ensure_user_exists(&deps, user_id, sender_username(&msg)).await;

    let text = match deps.store.set_thumbnail(user_id, Some(photo.file.id.0.clone())).await {
        Ok(()) => {
            log::info!("User {} saved a custom thumbnail", user_id);
            "✅ Thumbnail saved successfully!"
        }
        Err(e) => {
            log::error!("Failed to save thumbnail for {}: {}", user_id, e);
            "❌ Failed to set thumbnail. Please try again."
        }
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}
