use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::job::JobStatus;

/// How the user wants videos delivered. Stored as `video` / `file`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// Streamable video attachment when the container allows it
    #[default]
    Video,
    /// Always a generic document
    File,
}

/// Per-user delivery preferences, read once per job.
#[derive(Debug, Clone, PartialEq)]
pub struct UserPreferences {
    pub upload_mode: UploadMode,
    pub split_enabled: bool,
    pub caption: Option<String>,
    pub caption_enabled: bool,
    /// Platform file reference of the custom thumbnail
    pub thumbnail: Option<String>,
    pub generate_screenshots: bool,
    pub generate_sample_video: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            upload_mode: UploadMode::Video,
            split_enabled: true,
            caption: None,
            caption_enabled: true,
            thumbnail: None,
            generate_screenshots: true,
            generate_sample_video: true,
        }
    }
}

impl UserPreferences {
    /// The custom caption, if one is set and enabled.
    pub fn active_caption(&self) -> Option<&str> {
        if !self.caption_enabled {
            return None;
        }
        self.caption.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

/// A user row.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: i64,
    pub username: Option<String>,
    pub preferences: UserPreferences,
    pub banned: bool,
    pub is_paid: bool,
    pub subscription_start: Option<DateTime<Utc>>,
    pub paid_expiry: Option<DateTime<Utc>>,
}

impl User {
    /// Paid and not past the expiry (no expiry means open-ended).
    pub fn has_active_subscription(&self, now: DateTime<Utc>) -> bool {
        self.is_paid && self.paid_expiry.map_or(true, |expiry| expiry > now)
    }

    /// Whole days left on a subscription with an expiry.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        let expiry = self.paid_expiry.filter(|_| self.has_active_subscription(now))?;
        Some((expiry - now).num_days())
    }
}

/// A submitted URL.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlRecord {
    pub url_id: String,
    pub url: String,
    pub user_id: i64,
    pub status: JobStatus,
}

/// Boolean preferences the settings keyboard flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum UserToggle {
    Split,
    Caption,
    Screenshots,
    Sample,
}

impl UserToggle {
    pub fn column(self) -> &'static str {
        match self {
            UserToggle::Split => "split_enabled",
            UserToggle::Caption => "caption_enabled",
            UserToggle::Screenshots => "generate_screenshots",
            UserToggle::Sample => "generate_sample_video",
        }
    }
}
