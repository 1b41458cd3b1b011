//! Upload byte counting and the numbers shown in progress messages.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};

/// Tracks the number of bytes sent during an upload operation.
///
/// Cloned into the transport (which feeds it) and the progress ticker
/// (which reads it).
#[derive(Clone, Debug, Default)]
pub struct UploadProgress {
    bytes_sent: Arc<AtomicU64>,
}

impl UploadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bytes(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }
}

/// An `AsyncRead` wrapper that reports every read to an [`UploadProgress`].
pub struct ProgressReader<R> {
    inner: R,
    progress: UploadProgress,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, progress: UploadProgress) -> Self {
        Self { inner, progress }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let after = buf.filled().len();
            if after > before {
                self.progress.add_bytes(after - before);
            }
        }
        poll
    }
}

/// Upload state at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub sent: u64,
    pub total: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn new(sent: u64, total: u64, elapsed: Duration) -> Self {
        Self {
            sent: sent.min(total),
            total,
            elapsed,
        }
    }

    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.sent as f64 / self.total as f64 * 100.0
    }

    /// Average speed since the start, bytes per second.
    pub fn speed(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.sent as f64 / secs
        } else {
            0.0
        }
    }

    /// Remaining seconds at the average speed; zero while the speed is unknown.
    pub fn eta(&self) -> f64 {
        let speed = self.speed();
        if speed > 0.0 {
            self.total.saturating_sub(self.sent) as f64 / speed
        } else {
            0.0
        }
    }

    /// `width` cells of `█` (done) and `░` (remaining).
    pub fn bar(&self, width: usize) -> String {
        let filled = if self.total == 0 {
            0
        } else {
            ((width as u128 * self.sent as u128) / self.total as u128) as usize
        };
        let filled = filled.min(width);
        format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn speed_and_eta_use_the_average() {
        let snap = ProgressSnapshot::new(50, 200, Duration::from_secs(10));
        assert_eq!(snap.percentage(), 25.0);
        assert_eq!(snap.speed(), 5.0);
        assert_eq!(snap.eta(), 30.0);
        assert_eq!(snap.bar(10), "██░░░░░░░░");
    }

    #[test]
    fn degenerate_inputs() {
        let empty = ProgressSnapshot::new(0, 0, Duration::ZERO);
        assert_eq!(empty.percentage(), 0.0);
        assert_eq!(empty.eta(), 0.0);
        assert_eq!(empty.bar(4), "░░░░");

        // overshoot is clamped to the total
        let done = ProgressSnapshot::new(300, 200, Duration::from_secs(1));
        assert_eq!(done.bar(4), "████");
        assert_eq!(done.eta(), 0.0);
    }

    #[tokio::test]
    async fn reader_counts_bytes() {
        let progress = UploadProgress::new();
        let mut reader = ProgressReader::new(&b"hello world"[..], progress.clone());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(progress.bytes_sent(), 11);
    }
}
