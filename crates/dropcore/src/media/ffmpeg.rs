use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::core::process::{run_checked, ProcessError};

/// Runs one ffmpeg invocation. The output file is always the last argument.
#[async_trait]
pub trait FfmpegRunner: Send + Sync {
    async fn run(&self, args: &[String], timeout: Duration) -> Result<(), ProcessError>;
}

#[derive(Debug, Clone)]
pub struct SystemFfmpeg {
    bin: String,
}

impl SystemFfmpeg {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl FfmpegRunner for SystemFfmpeg {
    async fn run(&self, args: &[String], timeout: Duration) -> Result<(), ProcessError> {
        log::debug!("ffmpeg {}", args.join(" "));
        let mut cmd = Command::new(&self.bin);
        cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error"])
            .args(args)
            .stdin(Stdio::null());
        run_checked(&mut cmd, timeout).await.map(|_| ())
    }
}
