//! Inline keyboards and the texts that go with them. All texts are HTML.

use indoc::formatdoc;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use dropcore::core::{escape_html, format_duration, format_size};
use dropcore::download::{FormatOption, RemoteMedia};
use dropcore::job::JobId;
use dropcore::storage::{UploadMode, UserPreferences, UserToggle};

use crate::telegram::callback::CallbackAction;

fn button(text: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.to_string())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "Enabled"
    } else {
        "Disabled"
    }
}

fn mode_label(mode: UploadMode) -> &'static str {
    match mode {
        UploadMode::Video => "Video",
        UploadMode::File => "File",
    }
}

pub fn start_text(first_name: &str) -> String {
    formatdoc! {"
        👋 Hello {}!

        I can download videos from a wide range of websites and send them back to you.

        Just send me a valid URL and I'll handle the rest!

        Use /help to see available commands.",
        escape_html(first_name)
    }
}

pub fn help_text() -> &'static str {
    indoc::indoc! {"
        <b>Available Commands:</b>

        /start - Start the bot
        /help - Show this message
        /settings - Configure bot settings
        /caption - Set custom caption (send with your caption text)
        /clearcaption - Remove custom caption
        /clearthumbnail - Remove custom thumbnail
        /cancel - Stop your active download
        /upgrade - Check your premium subscription

        Send a photo to use it as the thumbnail of your uploads.

        <b>How to use:</b>
        Simply send a valid URL, and I'll fetch the available formats for you to download."}
}

pub fn start_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button("⚙️ Settings", CallbackAction::OpenSettings),
        button("❓ Help", CallbackAction::OpenHelp),
    ]])
}

pub fn back_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button("◀️ Back", CallbackAction::BackToStart)]])
}

pub fn settings_text(prefs: &UserPreferences) -> String {
    formatdoc! {"
        <b>Bot Settings</b>

        Upload Mode: {}
        Split Files: {}
        Custom Caption: {}
        Generate Screenshots: {}
        Generate Sample Video: {}",
        mode_label(prefs.upload_mode),
        on_off(prefs.split_enabled),
        on_off(prefs.caption_enabled),
        on_off(prefs.generate_screenshots),
        on_off(prefs.generate_sample_video),
    }
}

pub fn settings_keyboard(prefs: &UserPreferences) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button(
            format!("Upload as: {}", mode_label(prefs.upload_mode)),
            CallbackAction::ToggleUploadMode,
        )],
        vec![button(
            format!("Split files: {}", on_off(prefs.split_enabled)),
            CallbackAction::Toggle(UserToggle::Split),
        )],
        vec![button(
            format!("Caption: {}", on_off(prefs.caption_enabled)),
            CallbackAction::Toggle(UserToggle::Caption),
        )],
        vec![button(
            format!("Screenshots: {}", on_off(prefs.generate_screenshots)),
            CallbackAction::Toggle(UserToggle::Screenshots),
        )],
        vec![button(
            format!("Sample Video: {}", on_off(prefs.generate_sample_video)),
            CallbackAction::Toggle(UserToggle::Sample),
        )],
        vec![
            button("◀️ Back", CallbackAction::BackToStart),
            button("Close", CallbackAction::CloseSettings),
        ],
    ])
}

/// `"1920x1080 (mp4) | 45.20 MB"`; the size part only when known.
pub fn format_label(format: &FormatOption) -> String {
    match format.filesize {
        Some(size) => format!("{} ({}) | {}", format.resolution, format.ext, format_size(size)),
        None => format!("{} ({})", format.resolution, format.ext),
    }
}

/// One button per format plus a dismiss button. Formats whose payload would
/// not fit in a button are left out.
pub fn formats_keyboard(url_id: &str, media: &RemoteMedia) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = media
        .formats
        .iter()
        .filter_map(|format| {
            let action = CallbackAction::Download {
                url_id: url_id.to_string(),
                format_id: format.format_id.clone(),
            };
            if action.fits() {
                Some(vec![button(format_label(format), action)])
            } else {
                log::debug!("format {} skipped: callback data too long", format.format_id);
                None
            }
        })
        .collect();
    rows.push(vec![button(
        "Cancel",
        CallbackAction::Dismiss {
            url_id: url_id.to_string(),
        },
    )]);
    InlineKeyboardMarkup::new(rows)
}

/// Title block shown above the format buttons. `usage` is the quota line for
/// metered users.
pub fn formats_text(media: &RemoteMedia, usage: Option<&str>) -> String {
    let mut text = format!(
        "📹 <b>{}</b>\n\n👤 <b>Uploader:</b> {}\n⏱️ <b>Duration:</b> {}\n\n",
        escape_html(&media.title),
        escape_html(media.uploader.as_deref().unwrap_or("Unknown")),
        format_duration(media.duration),
    );
    if let Some(usage) = usage {
        text.push_str(usage);
        text.push_str("\n\n");
    }
    text.push_str("Please select a format to download:");
    text
}

pub fn cancel_job_keyboard(job_id: &JobId) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button(
        "✖️ Cancel",
        CallbackAction::CancelJob { job_id: job_id.clone() },
    )]])
}
