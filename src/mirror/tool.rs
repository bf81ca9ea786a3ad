//! Invocation of the external merge tool.
//!
//! The tool is a repository-specific script called as
//! `<tool> <upstream-number> <upstream-title>` from the repository checkout.
//! It applies the upstream change and pushes it to the mirror branch; this
//! crate only inspects its output and exit status.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::types::PrNumber;

/// Output of a successful tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Standard output followed by standard error.
    pub output: String,
}

/// Errors from running the merge tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool ran and exited unsuccessfully.
    #[error("merge tool exited with {}", describe_exit(*exit_code))]
    Failed {
        output: String,
        /// `None` when the process was terminated by a signal.
        exit_code: Option<i32>,
    },

    /// The tool exceeded its time limit and was killed.
    #[error("merge tool timed out after {after:?}")]
    TimedOut { after: Duration },

    /// The tool could not be started.
    #[error("failed to start merge tool: {0}")]
    Spawn(#[source] io::Error),
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "a signal".to_string(),
    }
}

/// Runs the merge tool for one upstream pull request.
pub trait MirrorTool: Send + Sync {
    fn run(
        &self,
        pr: PrNumber,
        title: &str,
    ) -> impl Future<Output = Result<ToolOutput, ToolError>> + Send;
}

/// A [`MirrorTool`] backed by an executable on disk.
#[derive(Debug, Clone)]
pub struct ScriptTool {
    path: PathBuf,
    workdir: PathBuf,
    timeout: Duration,
}

impl ScriptTool {
    /// `path` is the executable; it runs with `workdir` as its current
    /// directory and is killed once `timeout` elapses.
    pub fn new(path: impl Into<PathBuf>, workdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        ScriptTool {
            path: path.into(),
            workdir: workdir.into(),
            timeout,
        }
    }
}

impl MirrorTool for ScriptTool {
    async fn run(&self, pr: PrNumber, title: &str) -> Result<ToolOutput, ToolError> {
        let mut cmd = Command::new(&self.path);
        cmd.arg(pr.0.to_string())
            .arg(title)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(pr = %pr, tool = %self.path.display(), "Running merge tool");

        // Dropping the output future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(ToolError::Spawn)?,
            Err(_) => {
                return Err(ToolError::TimedOut {
                    after: self.timeout,
                });
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(ToolOutput { output: combined })
        } else {
            Err(ToolError::Failed {
                output: combined,
                exit_code: output.status.code(),
            })
        }
    }
}

/// Path of the per-PR tool log: `<log_dir>/upstream-merge-<N>.log`.
pub fn log_artifact_path(log_dir: &Path, pr: PrNumber) -> PathBuf {
    log_dir.join(format!("upstream-merge-{}.log", pr.0))
}

/// Appends tool output to the PR's log file, creating it if needed.
pub async fn append_log_artifact(log_dir: &Path, pr: PrNumber, output: &str) -> io::Result<PathBuf> {
    tokio::fs::create_dir_all(log_dir).await?;
    let path = log_artifact_path(log_dir, pr);

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await?;
    file.write_all(output.as_bytes()).await?;
    file.flush().await?;

    Ok(path)
}
