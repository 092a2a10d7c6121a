//! External tool command builder and runner.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Builder for an external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    /// Create a new command for `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add a path argument.
    pub fn path_arg(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_string_lossy().to_string();
        self.arg(path)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn build_args(&self) -> &[String] {
        &self.args
    }
}

/// Runner for external tools with a wall-clock bound.
#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    timeout: Option<Duration>,
}

impl ToolRunner {
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// Set timeout. The child is killed when it elapses.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run a command to completion.
    ///
    /// Returns `Ok` only for a zero exit status; a non-zero status becomes
    /// [`MediaError::ToolFailed`] carrying the captured stderr.
    pub async fn run(&self, cmd: &ToolCommand) -> MediaResult<()> {
        which::which(cmd.program()).map_err(|_| MediaError::ToolNotFound(cmd.program().to_string()))?;

        debug!("Running {} {}", cmd.program(), cmd.build_args().join(" "));

        let child = Command::new(cmd.program())
            .args(cmd.build_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    // Dropping the wait future drops the child, which kills it.
                    warn!("{} timed out after {:?}, killing process", cmd.program(), timeout);
                    return Err(MediaError::Timeout(timeout));
                }
            },
            None => child.wait_with_output().await?,
        };

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(MediaError::tool_failed(
                cmd.program(),
                output.status.code(),
                (!stderr.is_empty()).then_some(stderr),
            ))
        }
    }
}

/// Check if a tool is available.
pub fn check_tool(program: &str) -> MediaResult<std::path::PathBuf> {
    which::which(program).map_err(|_| MediaError::ToolNotFound(program.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = ToolCommand::new("guetzli")
            .args(["--quality", "90"])
            .path_arg("/tmp/in.jpg")
            .path_arg("/tmp/out.jpg");

        assert_eq!(cmd.program(), "guetzli");
        assert_eq!(
            cmd.build_args(),
            &["--quality", "90", "/tmp/in.jpg", "/tmp/out.jpg"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_success() {
        let cmd = ToolCommand::new("sh").args(["-c", "exit 0"]);
        ToolRunner::new().run(&cmd).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_nonzero_exit_captures_stderr() {
        let cmd = ToolCommand::new("sh").args(["-c", "echo boom >&2; exit 3"]);
        let err = ToolRunner::new().run(&cmd).await.unwrap_err();

        match err {
            MediaError::ToolFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr.as_deref(), Some("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_timeout() {
        let cmd = ToolCommand::new("sh").args(["-c", "sleep 5"]);
        let err = ToolRunner::new()
            .with_timeout(Duration::from_millis(100))
            .run(&cmd)
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Timeout(d) if d == Duration::from_millis(100)));
        assert_eq!(err.to_string(), "Operation timed out after 100ms");
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let cmd = ToolCommand::new("definitely-not-a-real-binary-xyz");
        let err = ToolRunner::new().run(&cmd).await.unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound(_)));
    }
}
