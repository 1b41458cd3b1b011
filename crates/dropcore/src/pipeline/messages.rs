//! Status texts and captions. All output is HTML; every remote or
//! user-supplied string is escaped here.

use crate::core::config;
use crate::core::utils::{escape_html, format_size, format_time, truncate_chars};
use crate::pipeline::progress::ProgressSnapshot;

/// Visible characters kept from a title in captions
const TITLE_LIMIT: usize = 256;

/// Visible characters kept from the user's caption; with the title and the
/// part lines this stays under the platform's 1024.
const CUSTOM_CAPTION_LIMIT: usize = 700;

pub const DOWNLOAD_CANCELLED: &str = "✖️ Download cancelled by user";

pub fn download_started(url: &str, format_id: &str) -> String {
    format!(
        "📥 <b>Downloading...</b>\n\n<b>URL:</b> {}\n<b>Format:</b> {}",
        escape_html(url),
        escape_html(format_id)
    )
}

pub fn download_complete(title: &str) -> String {
    format!(
        "✅ <b>Download Complete!</b>\n\n<b>Title:</b> {}\n📤 Processing upload...",
        escape_html(title)
    )
}

pub fn download_failed(error: &str) -> String {
    format!("❌ Download failed: {}", escape_html(error))
}

pub fn generic_error(message: &str) -> String {
    format!("❌ An error occurred: {}", escape_html(message))
}

pub fn cancelled_at(stage: &str) -> String {
    format!("{} (during {})", DOWNLOAD_CANCELLED, stage)
}

pub fn splitting(file_size: u64) -> String {
    format!(
        "📦 <b>Splitting file...</b>\n\nFile size: {} exceeds the upload limit.\nSplitting into smaller parts.",
        format_size(file_size)
    )
}

pub fn preparing_thumbnail() -> &'static str {
    "📤 <b>Preparing Upload...</b>\n\nDownloading custom thumbnail..."
}

pub fn starting_upload(file_name: &str, index: usize, count: usize, size: u64) -> String {
    format!(
        "📤 <b>Starting Upload...</b>\n\nFile: {}\nPart: {}/{}\nSize: {}",
        escape_html(file_name),
        index,
        count,
        format_size(size)
    )
}

pub fn upload_progress(file_name: &str, snapshot: &ProgressSnapshot) -> String {
    format!(
        "📤 <b>Uploading...</b>\n\n<b>File:</b> {}\n<b>Progress:</b> {:.1}%\n{}\n<b>Speed:</b> {}/s\n<b>Uploaded:</b> {} / {}\n<b>ETA:</b> {}",
        escape_html(file_name),
        snapshot.percentage(),
        snapshot.bar(config::upload::PROGRESS_BAR_WIDTH),
        format_size(snapshot.speed() as u64),
        format_size(snapshot.sent),
        format_size(snapshot.total),
        format_time(snapshot.eta())
    )
}

pub fn part_upload_failed(index: usize, error: &str) -> String {
    format!("❌ Error uploading part {}: {}", index, escape_html(error))
}

pub fn generating_screenshots() -> &'static str {
    "🖼️ <b>Generating screenshots...</b>"
}

pub fn generating_sample() -> &'static str {
    "🎬 <b>Generating sample video...</b>"
}

/// Final summary after a job finished.
pub fn completed(title: &str, format_id: &str, total_size: u64, duration: f64, parts: usize) -> String {
    let duration = if duration > 0.0 {
        format_time(duration)
    } else {
        "Unknown".to_string()
    };
    format!(
        "✅ <b>Download and upload completed!</b>\n\n<b>Title:</b> {}\n<b>Format:</b> {}\n<b>Total Size:</b> {}\n<b>Duration:</b> {}\n<b>Parts:</b> {}",
        escape_html(title),
        escape_html(format_id),
        format_size(total_size),
        duration,
        parts
    )
}

/// `<b>title</b>` plus the user's caption, both cut before escaping so the
/// markup always survives.
pub fn base_caption(title: &str, custom: Option<&str>) -> String {
    let mut caption = format!("<b>{}</b>", escape_html(&truncate_chars(title, TITLE_LIMIT)));
    if let Some(custom) = custom {
        caption.push_str("\n\n");
        caption.push_str(&escape_html(&truncate_chars(custom, CUSTOM_CAPTION_LIMIT)));
    }
    caption
}

/// Caption of part `index` (1-based) of `count`. A single part keeps the base caption.
pub fn part_caption(base: &str, index: usize, count: usize, duration: Option<f64>, size: u64) -> String {
    if count <= 1 {
        return base.to_string();
    }
    let duration = duration
        .filter(|d| *d > 0.0)
        .map_or_else(|| "Unknown".to_string(), format_time);
    format!(
        "{}\n\nPart {}/{}\nDuration: {}\nSize: {}",
        base,
        index,
        count,
        duration,
        format_size(size)
    )
}

pub fn screenshot_caption(index: usize) -> String {
    format!("Screenshot {}", index)
}

pub fn sample_caption(title: &str) -> String {
    format!("📽️ <b>Sample video of:</b> {}", escape_html(title))
}

/// Appends the no-thumbnail note used on the retry upload.
pub fn without_thumbnail_note(caption: &str) -> String {
    format!("{}\n\n{}", caption, config::upload::NO_THUMBNAIL_NOTE)
}
