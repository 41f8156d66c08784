//! External process execution with bounded output capture and a hard timeout
//!
//! yt-dlp and ffmpeg can both write a lot of progress output and can both hang on a
//! stalled network. Every external tool call goes through [`run_bounded`], which keeps
//! only the tail of each output stream, kills the child on timeout, and never leaves a
//! process running once the caller stops waiting for it.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

const READ_CHUNK: usize = 8 * 1024;

/// Captured result of a finished process
#[derive(Debug)]
pub struct ProcessOutput {
    /// Exit status
    pub status: ExitStatus,
    /// Tail of stdout, at most the configured limit
    pub stdout: Vec<u8>,
    /// Tail of stderr, at most the configured limit
    pub stderr: Vec<u8>,
    /// Whether stdout was longer than the limit
    pub stdout_truncated: bool,
    /// Whether stderr was longer than the limit
    pub stderr_truncated: bool,
}

impl ProcessOutput {
    /// Whether the process exited successfully
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Human-readable failure text: stderr, else stdout, else the exit status
    pub fn diagnostic(&self) -> String {
        let stderr = String::from_utf8_lossy(&self.stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = String::from_utf8_lossy(&self.stdout);
        let stdout = stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("process exited with {}", self.status)
    }
}

/// Why a process could not be run to completion
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The process could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that was launched
        program: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The process did not exit within the timeout and was killed
    #[error("{program} timed out after {}s", .timeout.as_secs())]
    TimedOut {
        /// Program that was launched
        program: String,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// Reading output or waiting for exit failed
    #[error("I/O error while running {program}: {source}")]
    Io {
        /// Program that was launched
        program: String,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Run `cmd` to completion, keeping at most `max_output` trailing bytes of each stream
///
/// Stdin is closed. The child is killed if `timeout` elapses or if the returned future
/// is dropped.
pub async fn run_bounded(
    mut cmd: Command,
    max_output: usize,
    timeout: Duration,
) -> Result<ProcessOutput, ProcessError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(%program, args = ?cmd.as_std().get_args().collect::<Vec<_>>(), "spawning process");

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let run = async {
        let (out, err, status) = tokio::join!(
            read_tail(stdout, max_output),
            read_tail(stderr, max_output),
            child.wait()
        );
        Ok::<_, std::io::Error>((out?, err?, status?))
    };

    let outcome = tokio::time::timeout(timeout, run).await;

    match outcome {
        Ok(Ok(((stdout, stdout_truncated), (stderr, stderr_truncated), status))) => {
            Ok(ProcessOutput {
                status,
                stdout,
                stderr,
                stdout_truncated,
                stderr_truncated,
            })
        }
        Ok(Err(source)) => Err(ProcessError::Io { program, source }),
        Err(_) => {
            if let Err(e) = child.kill().await {
                tracing::warn!(%program, error = %e, "failed to kill timed-out process");
            }
            Err(ProcessError::TimedOut { program, timeout })
        }
    }
}

/// Drain `reader` to EOF, returning its last `limit` bytes and whether anything was dropped
async fn read_tail<R>(reader: Option<R>, limit: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok((Vec::new(), false));
    };

    let mut kept = Vec::new();
    let mut truncated = false;
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        kept.extend_from_slice(&chunk[..n]);
        // amortize: only compact once the buffer is well past the limit
        if kept.len() > limit.saturating_mul(2).max(READ_CHUNK) {
            let excess = kept.len() - limit;
            kept.drain(..excess);
            truncated = true;
        }
    }

    if kept.len() > limit {
        let excess = kept.len() - limit;
        kept.drain(..excess);
        truncated = true;
    }

    Ok((kept, truncated))
}
