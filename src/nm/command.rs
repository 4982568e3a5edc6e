//! External command execution
//!
//! Runs a program to completion while capturing its output. Either stream
//! can additionally be forwarded to our own stdout/stderr as it is produced,
//! so `nmcli` progress and password-agent messages stay visible to the user.

use std::io;
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {}: {}", exit_label(*code), stderr.trim())]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Which output streams to forward live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub stream_stdout: bool,
    pub stream_stderr: bool,
}

impl RunOptions {
    /// Capture only
    pub fn captured() -> Self {
        Self::default()
    }

    /// Capture and forward both streams
    pub fn streamed() -> Self {
        Self {
            stream_stdout: true,
            stream_stderr: true,
        }
    }
}

/// How the process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitInfo,
}

impl CommandOutput {
    /// Turn a non-zero exit into [`RunError::Failed`]
    pub fn into_result(self, program: &str) -> Result<Self, RunError> {
        if self.status.success() {
            Ok(self)
        } else {
            Err(RunError::Failed {
                program: program.to_string(),
                code: self.status.code,
                stderr: self.stderr,
            })
        }
    }
}

/// Executes external commands
///
/// A non-zero exit is not an error at this level; it is reported through
/// [`CommandOutput::status`] and the caller decides what it means.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        options: RunOptions,
    ) -> Result<CommandOutput, RunError>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        options: RunOptions,
    ) -> Result<CommandOutput, RunError> {
        debug!("Running {} {:?}", program, args);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let io_error = |source: io::Error| RunError::Io {
            program: program.to_string(),
            source,
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io_error(io::Error::other("stdout not piped")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io_error(io::Error::other("stderr not piped")))?;

        let (status, out, err) = tokio::join!(
            child.wait(),
            tee(stdout, options.stream_stdout.then(tokio::io::stdout)),
            tee(stderr, options.stream_stderr.then(tokio::io::stderr)),
        );

        let status = ExitInfo::from(status.map_err(io_error)?);
        let out = out.map_err(io_error)?;
        let err = err.map_err(io_error)?;

        debug!("{} finished with {:?}", program, status.code);

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&out).into_owned(),
            stderr: String::from_utf8_lossy(&err).into_owned(),
            status,
        })
    }
}

/// Drain `reader` into a buffer, copying each chunk to `sink` as it arrives
///
/// A failing sink (e.g. our stdout was closed) stops forwarding but capture
/// continues, so the child never blocks on a full pipe.
pub async fn tee<R, W>(mut reader: R, mut sink: Option<W>) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut captured = Vec::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        captured.extend_from_slice(&buf[..n]);

        if let Some(out) = sink.as_mut() {
            let forwarded = async {
                out.write_all(&buf[..n]).await?;
                out.flush().await
            };
            if let Err(e) = forwarded.await {
                debug!("Stopped forwarding output: {}", e);
                sink = None;
            }
        }
    }

    Ok(captured)
}
