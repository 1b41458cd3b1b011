use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::core::error::{AppError, AppResult};
use crate::media::extract::ThumbnailStrategy;

/// yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// ffmpeg binary path (FFMPEG_BIN, default "ffmpeg")
pub static FFMPEG_BIN: Lazy<String> = Lazy::new(|| env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()));

/// ffprobe binary path (FFPROBE_BIN, default "ffprobe")
pub static FFPROBE_BIN: Lazy<String> =
    Lazy::new(|| env::var("FFPROBE_BIN").unwrap_or_else(|_| "ffprobe".to_string()));

/// Download folder path
/// Read from DOWNLOAD_FOLDER environment variable
/// Default: ./downloads
pub static DOWNLOAD_FOLDER: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "./downloads".to_string()));

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: dropbot.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "dropbot.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: logs/dropbot.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/dropbot.log".to_string()));

/// Telegram bot token
/// Read from BOT_TOKEN, falling back to TELOXIDE_TOKEN
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_default()
});

/// Platform and account limits
pub mod limits {
    /// Largest single upload the platform accepts: 1.75 GiB, truncated to whole bytes.
    pub const MAX_FILE_SIZE: u64 = 1_879_048_192;

    /// Downloads per day for users who are neither paid nor admins
    pub const DAILY_FREE_TASKS: u32 = 20;
}

/// Upload reporting
pub mod upload {
    use super::Duration;

    /// Minimum wall-clock gap between two progress edits (in seconds)
    pub const PROGRESS_INTERVAL_SECS: u64 = 2;

    /// Cells in the text progress bar
    pub const PROGRESS_BAR_WIDTH: usize = 10;

    /// Platform limit on items per media group
    pub const MEDIA_GROUP_LIMIT: usize = 10;

    /// Caption annotation added when an upload is retried without its thumbnail
    pub const NO_THUMBNAIL_NOTE: &str = "(Uploaded without thumbnail due to error)";

    pub fn progress_interval() -> Duration {
        Duration::from_secs(PROGRESS_INTERVAL_SECS)
    }
}

/// Frame and clip extraction
pub mod extract {
    /// Thumbnail position as a fraction of the duration
    pub const THUMBNAIL_POSITION: f64 = 0.6;

    pub const SCREENSHOT_COUNT: usize = 10;

    /// Sample clip length (in seconds)
    pub const SAMPLE_DURATION_SECS: f64 = 20.0;

    /// Sample clip start as a fraction of the duration
    pub const SAMPLE_START_RATIO: f64 = 0.3;

    /// Thumbnails are scaled to fit a square of this size
    pub const THUMBNAIL_SIZE: u32 = 320;

    /// Candidate frames below this size are treated as blank
    pub const MIN_FRAME_BYTES: u64 = 1024;

    /// Candidate positions for best-frame selection
    pub const BEST_FRAME_POSITIONS: [f64; 4] = [0.10, 0.25, 0.50, 0.75];

    /// Scene change score for scene-based thumbnails
    pub const SCENE_THRESHOLD: f64 = 0.3;

    /// JPEG quality on the 0-100 scale, mapped to ffmpeg's q:v
    pub const JPEG_QUALITY: u8 = 90;
}

/// External process timeouts
pub mod process {
    use super::Duration;

    /// Single frame extraction
    pub const FFMPEG_TIMEOUT_SECS: u64 = 120;

    /// Stream-copy of a split part or sample clip, and scene scans
    pub const FFMPEG_LONG_TIMEOUT_SECS: u64 = 3600;

    pub const FFPROBE_TIMEOUT_SECS: u64 = 30;

    /// Full yt-dlp download
    pub const YTDLP_DOWNLOAD_TIMEOUT_SECS: u64 = 3 * 3600;

    /// yt-dlp metadata fetch (-J)
    pub const YTDLP_INFO_TIMEOUT_SECS: u64 = 120;

    pub fn ffmpeg_timeout() -> Duration {
        Duration::from_secs(FFMPEG_TIMEOUT_SECS)
    }

    pub fn ffmpeg_long_timeout() -> Duration {
        Duration::from_secs(FFMPEG_LONG_TIMEOUT_SECS)
    }

    pub fn ffprobe_timeout() -> Duration {
        Duration::from_secs(FFPROBE_TIMEOUT_SECS)
    }

    pub fn ytdlp_info_timeout() -> Duration {
        Duration::from_secs(YTDLP_INFO_TIMEOUT_SECS)
    }
}

/// yt-dlp invocation
pub mod download {
    /// Best video + best audio, falling back to the best single file
    pub const BEST_FORMAT: &str = "bestvideo+bestaudio/best";

    pub const RETRIES: u32 = 30;
    pub const FRAGMENT_RETRIES: u32 = 30;

    /// Container forced on merged output
    pub const MERGE_FORMAT: &str = "mp4";
}

/// Network
pub mod network {
    use super::Duration;

    /// HTTP client timeout; uploads of parts close to the size limit are slow
    pub const REQUEST_TIMEOUT_SECS: u64 = 3600;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Runtime settings assembled from defaults, an optional TOML file and
/// `DROPBOT_`-prefixed environment variables (in that order of precedence).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub download_dir: PathBuf,
    pub database_path: PathBuf,
    pub log_file: Option<PathBuf>,
    pub ytdlp_bin: String,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub max_file_size: u64,
    pub daily_task_limit: u32,
    pub admins: Vec<i64>,
    pub paid_users: Vec<i64>,
    pub thumbnail_strategy: ThumbnailStrategy,
    pub screenshot_count: usize,
    pub sample_duration_secs: f64,
    pub download_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from(DOWNLOAD_FOLDER.as_str()),
            database_path: PathBuf::from(DATABASE_PATH.as_str()),
            log_file: Some(PathBuf::from(LOG_FILE_PATH.as_str())),
            ytdlp_bin: YTDL_BIN.clone(),
            ffmpeg_bin: FFMPEG_BIN.clone(),
            ffprobe_bin: FFPROBE_BIN.clone(),
            max_file_size: limits::MAX_FILE_SIZE,
            daily_task_limit: limits::DAILY_FREE_TASKS,
            admins: Vec::new(),
            paid_users: Vec::new(),
            thumbnail_strategy: ThumbnailStrategy::default(),
            screenshot_count: extract::SCREENSHOT_COUNT,
            sample_duration_secs: extract::SAMPLE_DURATION_SECS,
            download_timeout_secs: process::YTDLP_DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Default location of the optional settings file
    pub const DEFAULT_FILE: &'static str = "dropbot.toml";

    /// Environment prefix for overrides, e.g. `DROPBOT_DAILY_TASK_LIMIT=50`
    pub const ENV_PREFIX: &'static str = "DROPBOT_";

    pub fn figment(config_file: Option<&Path>) -> Figment {
        let file = config_file.map_or_else(|| PathBuf::from(Self::DEFAULT_FILE), Path::to_path_buf);
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(Self::ENV_PREFIX))
    }

    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        Self::figment(config_file)
            .extract()
            .map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }

    /// Listed in the paid-users setting (independent of the stored subscription)
    pub fn is_listed_paid(&self, user_id: i64) -> bool {
        self.paid_users.contains(&user_id)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn max_file_size_is_one_and_three_quarter_gib() {
        assert_eq!(limits::MAX_FILE_SIZE, (1.75 * 1024f64.powi(3)) as u64);
    }

    #[test]
    #[serial]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "daily_task_limit = 5\nadmins = [42, 7]\nthumbnail_strategy = \"best_frame\"").unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.daily_task_limit, 5);
        assert_eq!(settings.admins, vec![42, 7]);
        assert_eq!(settings.thumbnail_strategy, ThumbnailStrategy::BestFrame);
        assert_eq!(settings.max_file_size, limits::MAX_FILE_SIZE);
        assert!(settings.is_admin(42));
        assert!(!settings.is_admin(1));
    }

    #[test]
    #[serial]
    fn environment_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "screenshot_count = 4").unwrap();

        env::set_var("DROPBOT_SCREENSHOT_COUNT", "6");
        let settings = Settings::load(Some(file.path()));
        env::remove_var("DROPBOT_SCREENSHOT_COUNT");

        assert_eq!(settings.unwrap().screenshot_count, 6);
    }

    #[test]
    #[serial]
    fn missing_file_falls_back_to_defaults() {
        let settings = Settings::load(Some(Path::new("/nonexistent/dropbot.toml"))).unwrap();
        assert_eq!(settings.screenshot_count, extract::SCREENSHOT_COUNT);
        assert_eq!(settings.sample_duration_secs, extract::SAMPLE_DURATION_SECS);
    }
}
