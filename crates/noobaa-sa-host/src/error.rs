use std::io;
use std::path::PathBuf;
use std::time::Duration;

use rpm_core::ArtifactError;
use thiserror::Error;

use crate::exec::CommandOutput;

pub type Result<T> = std::result::Result<T, DeployError>;

/// Every variant terminates the run; nothing is retried or rolled back.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("failed to install {target}: {stderr}")]
    Installation { target: String, stderr: String },

    #[error("failed to set permissions {mode} on {}: {stderr}", path.display())]
    PermissionChange {
        path: PathBuf,
        mode: String,
        stderr: String,
    },

    #[error("service `{0}` is not running")]
    ServiceNotRunning(String),

    #[error("storage status check failed with exit code {0}")]
    StorageStatusCheckFailed(i32),

    #[error("aggregate node status check failed with exit code {0}")]
    AggregateNodeStatusCheckFailed(i32),

    #[error("`{command}` exited with code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {}", humantime::format_duration(*timeout))]
    CommandTimeout {
        command: String,
        timeout: Duration,
        /// Whatever the command wrote before it was killed.
        output: CommandOutput,
    },

    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{target} not ready after {attempts} attempts")]
    NotReady { target: String, attempts: u32 },

    #[error("failed to render template {}: {reason}", path.display())]
    Template { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeployError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
