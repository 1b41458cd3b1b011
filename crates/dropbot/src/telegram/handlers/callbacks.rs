//! Inline button handlers: format selection, cancellation, settings.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineKeyboardMarkup, MessageId, ParseMode};

use dropcore::job::{AdmissionError, Job, JobId};
use dropcore::pipeline::MessageRef;
use dropcore::storage::{JobStore, UploadMode, UserPreferences, UserToggle};

use super::types::{HandlerDeps, HandlerError};
use crate::telegram::access::BANNED;
use crate::telegram::callback::CallbackAction;
use crate::telegram::keyboards;

/// The message a button was pressed on.
#[derive(Debug, Clone, Copy)]
struct Origin {
    chat_id: ChatId,
    message_id: MessageId,
}

impl Origin {
    fn message_ref(self) -> MessageRef {
        MessageRef {
            chat_id: self.chat_id.0,
            message_id: self.message_id.0,
        }
    }
}

async fn answer(bot: &Bot, q: &CallbackQuery, text: &str) -> Result<(), HandlerError> {
    bot.answer_callback_query(q.id.clone()).text(text).await?;
    Ok(())
}

/// Replaces the text and keyboard of `origin`. Unchanged content is not an error.
async fn show(bot: &Bot, origin: Origin, text: String, markup: InlineKeyboardMarkup) -> Result<(), HandlerError> {
    let result = bot
        .edit_message_text(origin.chat_id, origin.message_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(markup)
        .await;
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.to_string().contains("message is not modified") => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub async fn handle_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> Result<(), HandlerError> {
    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        log::warn!("Unknown callback data {:?} from {}", q.data, q.from.id);
        return answer(&bot, &q, "Invalid callback data").await;
    };
    let Some(origin) = q.message.as_ref().map(|m| Origin {
        chat_id: m.chat().id,
        message_id: m.id(),
    }) else {
        return answer(&bot, &q, "This message is no longer available.").await;
    };
    let user_id = i64::try_from(q.from.id.0)?;
    log::debug!("Callback {} from user {}", action, user_id);

    let user = deps.store.get_user(user_id).await?;
    if user.as_ref().is_some_and(|u| u.banned) {
        return answer(&bot, &q, BANNED).await;
    }

    match action {
        CallbackAction::Download { url_id, format_id } => {
            start_download(&bot, &q, origin, user_id, url_id, format_id, &deps).await?
        }
        CallbackAction::Dismiss { url_id } => {
            if let Some(job_id) = deps.registry.cancel_for_url(user_id, &url_id) {
                log::info!("User {} cancelled job {} from its format list", user_id, job_id);
            }
            show(&bot, origin, "❌ Operation cancelled.".to_string(), InlineKeyboardMarkup::default()).await?;
            answer(&bot, &q, "Operation cancelled").await?;
        }
        CallbackAction::CancelJob { job_id } => {
            if deps.registry.cancel_owned(&job_id, user_id) {
                log::info!("User {} cancelled job {}", user_id, job_id);
                answer(&bot, &q, "Cancelling...").await?;
            } else {
                answer(&bot, &q, "This download is no longer active.").await?;
            }
        }
        CallbackAction::OpenSettings => {
            answer(&bot, &q, "Opening settings...").await?;
            let prefs = deps.store.user_preferences(user_id).await?;
            render_settings(&bot, origin, &prefs).await?;
        }
        CallbackAction::OpenHelp => {
            answer(&bot, &q, "Opening help...").await?;
            show(&bot, origin, keyboards::help_text().to_string(), keyboards::back_keyboard()).await?;
        }
        CallbackAction::BackToStart => {
            answer(&bot, &q, "Returning to start menu...").await?;
            show(
                &bot,
                origin,
                keyboards::start_text(&q.from.first_name),
                keyboards::start_keyboard(),
            )
            .await?;
        }
        CallbackAction::ToggleUploadMode => {
            let prefs = deps.store.user_preferences(user_id).await?;
            let next = match prefs.upload_mode {
                UploadMode::Video => UploadMode::File,
                UploadMode::File => UploadMode::Video,
            };
            deps.store.set_upload_mode(user_id, next).await?;
            answer(&bot, &q, &format!("Upload mode changed to: {}", next)).await?;
            render_settings(&bot, origin, &deps.store.user_preferences(user_id).await?).await?;
        }
        CallbackAction::Toggle(toggle) => {
            let Some(enabled) = deps.store.toggle_setting(user_id, toggle).await? else {
                return answer(&bot, &q, "User not found in database.").await;
            };
            let prefs = deps.store.user_preferences(user_id).await?;
            answer(&bot, &q, &toggle_notice(toggle, enabled, &prefs)).await?;
            render_settings(&bot, origin, &prefs).await?;
        }
        CallbackAction::CloseSettings => {
            bot.delete_message(origin.chat_id, origin.message_id).await?;
            answer(&bot, &q, "Settings closed").await?;
        }
    }
    Ok(())
}

async fn render_settings(bot: &Bot, origin: Origin, prefs: &UserPreferences) -> Result<(), HandlerError> {
    show(bot, origin, keyboards::settings_text(prefs), keyboards::settings_keyboard(prefs)).await
}

fn toggle_notice(toggle: UserToggle, enabled: bool, prefs: &UserPreferences) -> String {
    if toggle == UserToggle::Caption && enabled && prefs.caption.is_none() {
        return "Caption enabled. Use /caption to set your caption.".to_string();
    }
    let label = match toggle {
        UserToggle::Split => "Split setting",
        UserToggle::Caption => "Caption",
        UserToggle::Screenshots => "Screenshots",
        UserToggle::Sample => "Sample video",
    };
    format!("{}: {}", label, if enabled { "Enabled" } else { "Disabled" })
}

/// Admits the job, keeps a cancel button on its status message and runs the
/// pipeline in the background.
async fn start_download(
    bot: &Bot,
    q: &CallbackQuery,
    origin: Origin,
    user_id: i64,
    url_id: String,
    format_id: String,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let Some(record) = deps.store.url_record(&url_id).await? else {
        return answer(bot, q, "URL not found in database").await;
    };
    if record.user_id != user_id {
        return answer(bot, q, "This link was sent by another user.").await;
    }

    let job_id = JobId::new();
    let ticket = match deps.registry.admit(job_id.clone(), user_id, &url_id) {
        Ok(ticket) => ticket,
        Err(AdmissionError::Busy(active)) => {
            log::info!("User {} is busy with job {}", user_id, active);
            return answer(
                bot,
                q,
                "⚠️ You already have an active download. Please wait for it to complete.",
            )
            .await;
        }
    };
    answer(bot, q, "Starting download...").await?;

    let status = origin.message_ref();
    deps.transport
        .attach_keyboard(status, keyboards::cancel_job_keyboard(&job_id));

    let job = Job::new(
        job_id,
        user_id,
        origin.chat_id.0,
        url_id,
        record.url,
        format_id,
        ticket.token(),
    );
    let pipeline = Arc::clone(&deps.pipeline);
    let transport = Arc::clone(&deps.transport);
    tokio::spawn(async move {
        let report = pipeline.run(job, ticket, status).await;
        transport.release_keyboard(status).await;
        log::info!(
            "Job {} ended as {}: {} part(s), {} screenshot(s), sample sent: {}",
            report.job_id,
            report.status,
            report.parts.len(),
            report.screenshots_sent,
            report.sample_sent
        );
    });
    Ok(())
}
