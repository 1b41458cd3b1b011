//! Inline button payloads.
//!
//! Telegram caps callback data at 64 bytes. URL ids and job ids are 32 hex
//! characters, which leaves room for any yt-dlp format selector we list.

use std::fmt;

use dropcore::job::JobId;
use dropcore::storage::UserToggle;

/// Platform limit on `callback_data`
pub const MAX_CALLBACK_BYTES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// `dl|<url_id>|<format_id>`: start a job
    Download { url_id: String, format_id: String },
    /// `cancel|<url_id>`: dismiss a format list
    Dismiss { url_id: String },
    /// `cancel_dl|<job_id>`: stop a running job
    CancelJob { job_id: JobId },
    OpenSettings,
    OpenHelp,
    BackToStart,
    ToggleUploadMode,
    Toggle(UserToggle),
    CloseSettings,
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(rest) = data.strip_prefix("dl|") {
            let (url_id, format_id) = rest.split_once('|')?;
            if url_id.is_empty() || format_id.is_empty() {
                return None;
            }
            return Some(CallbackAction::Download {
                url_id: url_id.to_string(),
                format_id: format_id.to_string(),
            });
        }
        if let Some(url_id) = data.strip_prefix("cancel|").filter(|id| !id.is_empty()) {
            return Some(CallbackAction::Dismiss {
                url_id: url_id.to_string(),
            });
        }
        if let Some(job_id) = data.strip_prefix("cancel_dl|").filter(|id| !id.is_empty()) {
            return Some(CallbackAction::CancelJob {
                job_id: JobId::from(job_id),
            });
        }

        let action = match data {
            "settings" => CallbackAction::OpenSettings,
            "help_button" => CallbackAction::OpenHelp,
            "back_to_start" => CallbackAction::BackToStart,
            "toggle_upload_mode" => CallbackAction::ToggleUploadMode,
            "toggle_split" => CallbackAction::Toggle(UserToggle::Split),
            "toggle_caption" => CallbackAction::Toggle(UserToggle::Caption),
            "toggle_screenshots" => CallbackAction::Toggle(UserToggle::Screenshots),
            "toggle_sample_video" => CallbackAction::Toggle(UserToggle::Sample),
            "close_settings" => CallbackAction::CloseSettings,
            _ => return None,
        };
        Some(action)
    }

    /// Whether the encoded form fits in a button.
    pub fn fits(&self) -> bool {
        self.to_string().len() <= MAX_CALLBACK_BYTES
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::Download { url_id, format_id } => write!(f, "dl|{}|{}", url_id, format_id),
            CallbackAction::Dismiss { url_id } => write!(f, "cancel|{}", url_id),
            CallbackAction::CancelJob { job_id } => write!(f, "cancel_dl|{}", job_id),
            CallbackAction::OpenSettings => f.write_str("settings"),
            CallbackAction::OpenHelp => f.write_str("help_button"),
            CallbackAction::BackToStart => f.write_str("back_to_start"),
            CallbackAction::ToggleUploadMode => f.write_str("toggle_upload_mode"),
            CallbackAction::Toggle(UserToggle::Split) => f.write_str("toggle_split"),
            CallbackAction::Toggle(UserToggle::Caption) => f.write_str("toggle_caption"),
            CallbackAction::Toggle(UserToggle::Screenshots) => f.write_str("toggle_screenshots"),
            CallbackAction::Toggle(UserToggle::Sample) => f.write_str("toggle_sample_video"),
            CallbackAction::CloseSettings => f.write_str("close_settings"),
        }
    }
}
