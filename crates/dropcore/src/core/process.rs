//! Process execution utilities with timeout support
//!
//! Helpers for running external processes (ffmpeg, ffprobe) with timeouts so
//! a hung tool cannot stall a job. yt-dlp runs on the blocking pool instead,
//! see [`wait_with_output_timeout`].

use std::io::Read;
use std::process::{Child, Output};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::Command;

/// Characters of stderr kept in error messages
const STDERR_TAIL_CHARS: usize = 600;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

fn program_name(cmd: &Command) -> String {
    cmd.as_std().get_program().to_string_lossy().into_owned()
}

/// Keeps the last `max_chars` characters of `text`, trimmed.
pub fn tail(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - max_chars).collect()
}

/// Run an async Command with a timeout.
///
/// The child is killed if the timeout elapses. Returns the process Output
/// regardless of exit status.
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, ProcessError> {
    let program = program_name(cmd);
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(ProcessError::Spawn { program, source }),
        Err(_) => Err(ProcessError::Timeout {
            program,
            secs: timeout.as_secs(),
        }),
    }
}

/// Like [`run_with_timeout`], but a non-zero exit becomes [`ProcessError::Failed`].
pub async fn run_checked(cmd: &mut Command, timeout: Duration) -> Result<Output, ProcessError> {
    let program = program_name(cmd);
    let output = run_with_timeout(cmd, timeout).await?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(ProcessError::Failed {
            program,
            status: output.status.to_string(),
            stderr: tail(&String::from_utf8_lossy(&output.stderr), STDERR_TAIL_CHARS),
        })
    }
}

/// Waits for a blocking child process, killing it once `timeout` elapses.
///
/// Meant to run on the blocking pool: it polls `try_wait` and sleeps between
/// polls. stdout/stderr must be piped by the caller; they are drained on
/// reader threads so a chatty child cannot fill the pipe and stall.
pub fn wait_with_output_timeout(mut child: Child, program: &str, timeout: Duration) -> Result<Output, ProcessError> {
    let deadline = Instant::now() + timeout;
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let spawn_error = |source| ProcessError::Spawn {
        program: program.to_string(),
        source,
    };

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                log::error!("{} timed out after {}s, killing", program, timeout.as_secs());
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::Timeout {
                    program: program.to_string(),
                    secs: timeout.as_secs(),
                });
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(250)),
            Err(source) => return Err(spawn_error(source)),
        }
    };

    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
