//! Process configuration, read from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `GITHUB_TOKEN` | required |
//! | `PR_MIRROR_UPSTREAM` (`owner/repo`) | required |
//! | `PR_MIRROR_DOWNSTREAM` (`owner/repo`) | required |
//! | `PR_MIRROR_REPO_PATH` | required |
//! | `PR_MIRROR_TOOL_PATH` | required; relative to the repo path unless absolute |
//! | `PR_MIRROR_WEBHOOK_SECRET` | required when the webhook is enabled |
//! | `PR_MIRROR_WEBHOOK_PORT` | `8080` |
//! | `PR_MIRROR_TARGET_BRANCH` | `master` |
//! | `PR_MIRROR_STATE_DIR` | `.` |
//! | `PR_MIRROR_LOG_DIR` | `./logs` |
//! | `PR_MIRROR_TOOL_TIMEOUT_SECS` | `1800` |
//! | `PR_MIRROR_POLL_INTERVAL_SECS` | `60` |
//! | `PR_MIRROR_ENABLE_POLLER` | `true` |
//! | `PR_MIRROR_ENABLE_WEBHOOK` | `true` |
//! | `PR_MIRROR_RETRY_FAILED_EVENTS` | `false` |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::poller::{DEFAULT_POLL_INTERVAL_SECS, PollConfig, SeenPolicy};
use crate::types::RepoId;

const DEFAULT_WEBHOOK_PORT: u16 = 8080;
const DEFAULT_TARGET_BRANCH: &str = "master";
const DEFAULT_STATE_DIR: &str = ".";
const DEFAULT_LOG_DIR: &str = "./logs";
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30 * 60;

/// Errors from reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the process needs to start.
#[derive(Clone)]
pub struct MirrorConfig {
    pub github_token: String,
    pub upstream: RepoId,
    pub downstream: RepoId,
    /// The shared checkout the merge tool works in.
    pub repo_path: PathBuf,
    /// The merge tool executable, already resolved against `repo_path`.
    pub tool_path: PathBuf,
    pub tool_timeout: Duration,
    pub target_branch: String,
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
    pub enable_poller: bool,
    pub enable_webhook: bool,
    pub webhook_port: u16,
    /// Present whenever `enable_webhook` is set.
    pub webhook_secret: Option<String>,
    pub poll: PollConfig,
}

impl fmt::Debug for MirrorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorConfig")
            .field("github_token", &"<redacted>")
            .field("upstream", &self.upstream)
            .field("downstream", &self.downstream)
            .field("repo_path", &self.repo_path)
            .field("tool_path", &self.tool_path)
            .field("tool_timeout", &self.tool_timeout)
            .field("target_branch", &self.target_branch)
            .field("state_dir", &self.state_dir)
            .field("log_dir", &self.log_dir)
            .field("enable_poller", &self.enable_poller)
            .field("enable_webhook", &self.enable_webhook)
            .field("webhook_port", &self.webhook_port)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .field("poll", &self.poll)
            .finish()
    }
}

impl MirrorConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads configuration through `lookup`, which returns a variable's value
    /// if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };

        let github_token = vars.required("GITHUB_TOKEN")?;
        let upstream: RepoId = vars.parsed_required("PR_MIRROR_UPSTREAM")?;
        let downstream: RepoId = vars.parsed_required("PR_MIRROR_DOWNSTREAM")?;
        let repo_path = PathBuf::from(vars.required("PR_MIRROR_REPO_PATH")?);
        let tool_path = repo_path.join(vars.required("PR_MIRROR_TOOL_PATH")?);

        let tool_timeout = Duration::from_secs(
            vars.parsed_or("PR_MIRROR_TOOL_TIMEOUT_SECS", DEFAULT_TOOL_TIMEOUT_SECS)?,
        );
        let poll_interval =
            vars.parsed_or("PR_MIRROR_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_interval == 0 {
            return Err(ConfigError::Invalid {
                var: "PR_MIRROR_POLL_INTERVAL_SECS",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let enable_poller = vars.flag_or("PR_MIRROR_ENABLE_POLLER", true)?;
        let enable_webhook = vars.flag_or("PR_MIRROR_ENABLE_WEBHOOK", true)?;
        let webhook_secret = vars.optional("PR_MIRROR_WEBHOOK_SECRET");
        if enable_webhook && webhook_secret.is_none() {
            return Err(ConfigError::Missing("PR_MIRROR_WEBHOOK_SECRET"));
        }

        let seen_policy = if vars.flag_or("PR_MIRROR_RETRY_FAILED_EVENTS", false)? {
            SeenPolicy::RetryFailures
        } else {
            SeenPolicy::MarkAlways
        };

        Ok(MirrorConfig {
            github_token,
            upstream,
            downstream,
            repo_path,
            tool_path,
            tool_timeout,
            target_branch: vars
                .optional("PR_MIRROR_TARGET_BRANCH")
                .unwrap_or_else(|| DEFAULT_TARGET_BRANCH.to_string()),
            state_dir: PathBuf::from(
                vars.optional("PR_MIRROR_STATE_DIR")
                    .unwrap_or_else(|| DEFAULT_STATE_DIR.to_string()),
            ),
            log_dir: PathBuf::from(
                vars.optional("PR_MIRROR_LOG_DIR")
                    .unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()),
            ),
            enable_poller,
            enable_webhook,
            webhook_port: vars.parsed_or("PR_MIRROR_WEBHOOK_PORT", DEFAULT_WEBHOOK_PORT)?,
            webhook_secret,
            poll: PollConfig {
                default_interval: Duration::from_secs(poll_interval),
                seen_policy,
            },
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    /// Set and non-empty.
    fn optional(&self, var: &'static str) -> Option<String> {
        (self.lookup)(var).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        self.optional(var).ok_or(ConfigError::Missing(var))
    }

    fn parse<T>(var: &'static str, value: String) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        })
    }

    fn parsed_required<T>(&self, var: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        Self::parse(var, self.required(var)?)
    }

    fn parsed_or<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(var) {
            Some(value) => Self::parse(var, value),
            None => Ok(default),
        }
    }

    fn flag_or(&self, var: &'static str, default: bool) -> Result<bool, ConfigError> {
        let Some(value) = self.optional(var) else {
            return Ok(default);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                var,
                value,
                reason: "expected true or false".to_string(),
            }),
        }
    }
}
