//! Text and path helpers shared by the pipeline and the bot.

use std::path::{Path, PathBuf};

use lazy_regex::regex_is_match;

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Human readable size: bytes below 1 KiB, otherwise two decimals.
///
/// ```
/// use dropcore::core::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    let size = bytes as f64;
    if size < KIB {
        format!("{} B", bytes)
    } else if size < MIB {
        format!("{:.2} KB", size / KIB)
    } else if size < GIB {
        format!("{:.2} MB", size / MIB)
    } else {
        format!("{:.2} GB", size / GIB)
    }
}

/// `HH:MM:SS` when there are hours, otherwise `MM:SS`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "00:00".to_string();
    }
    let total = seconds as u64;
    let (hours, rest) = (total / 3600, total % 3600);
    let (minutes, secs) = (rest / 60, rest % 60);
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// `1h 2m 3s` / `2m 3s`, or `Unknown` when there is no duration.
pub fn format_duration(seconds: Option<f64>) -> String {
    let seconds = match seconds {
        Some(s) if s.is_finite() && s >= 1.0 => s as u64,
        _ => return "Unknown".to_string(),
    };
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else {
        format!("{}m {}s", minutes, secs)
    }
}

/// Escapes text for messages sent with HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Cuts `text` to at most `max_chars` characters, marking the cut with `…`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Accepts http(s) URLs with a host, the same shape yt-dlp is handed.
pub fn is_valid_url(text: &str) -> bool {
    let text = text.trim();
    if !regex_is_match!(r"^https?://(?:[-\w.]|%[\da-fA-F]{2})+", text) {
        return false;
    }
    url::Url::parse(text)
        .map(|url| url.host_str().is_some_and(|host| !host.is_empty()))
        .unwrap_or(false)
}

/// Sibling of `path` named `<stem><suffix>.<ext>`; `ext` defaults to the source extension.
pub fn sibling_path(path: &Path, suffix: &str, ext: Option<&str>) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = ext
        .map(str::to_string)
        .or_else(|| path.extension().map(|e| e.to_string_lossy().into_owned()));
    let name = match ext {
        Some(ext) if !ext.is_empty() => format!("{}{}.{}", stem, suffix, ext),
        _ => format!("{}{}", stem, suffix),
    };
    path.with_file_name(name)
}

/// Removes `path`. A file that is already gone is not an error; the result
/// says whether anything was deleted. Errors name the path.
pub async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match fs_err::tokio::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Lowercased extension of `path`, if any.
pub fn extension_lower(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(1_879_048_192), "1.75 GB");
    }

    #[test]
    fn times() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(f64::NAN), "00:00");
        assert_eq!(format_time(59.9), "00:59");
        assert_eq!(format_time(61.0), "01:01");
        assert_eq!(format_time(3600.0), "01:00:00");
        assert_eq!(format_time(5025.0), "01:23:45");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(None), "Unknown");
        assert_eq!(format_duration(Some(0.0)), "Unknown");
        assert_eq!(format_duration(Some(125.0)), "2m 5s");
        assert_eq!(format_duration(Some(3725.4)), "1h 2m 5s");
    }

    #[test]
    fn html_escaping() {
        assert_eq!(escape_html("<b>Tom & \"Jerry\"</b>"), "&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn truncation() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn url_validation() {
        assert!(is_valid_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_valid_url("  http://example.com/video.mp4 "));
        assert!(!is_valid_url("ftp://example.com/file"));
        assert!(!is_valid_url("not a url"));
        assert!(!is_valid_url("https://"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn sibling_paths() {
        let src = Path::new("/tmp/dl/abc.mkv");
        assert_eq!(sibling_path(src, "_part2", None), PathBuf::from("/tmp/dl/abc_part2.mkv"));
        assert_eq!(sibling_path(src, "_thumb", Some("jpg")), PathBuf::from("/tmp/dl/abc_thumb.jpg"));
        assert_eq!(sibling_path(Path::new("noext"), "_part1", None), PathBuf::from("noext_part1"));
        assert_eq!(extension_lower(Path::new("a/B.MP4")).as_deref(), Some("mp4"));
    }

    #[tokio::test]
    async fn removal_tolerates_missing_files_and_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("abc_part1.mp4");
        std::fs::write(&file, b"x").unwrap();

        assert!(remove_if_exists(&file).await.unwrap());
        assert!(!file.exists());
        assert!(!remove_if_exists(&file).await.unwrap());

        // a directory is not a file: the error must say which path failed
        let err = remove_if_exists(dir.path()).await.unwrap_err();
        assert_ne!(err.kind(), std::io::ErrorKind::NotFound);
        assert!(err.to_string().contains(&dir.path().display().to_string()), "{err}");
    }
}
