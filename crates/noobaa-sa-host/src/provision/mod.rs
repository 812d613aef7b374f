//! Ordered provisioning plans and the sequencer that executes them.
//!
//! A plan is a flat list of named steps built from the context alone, so it
//! can be printed with `--explain` or checked in tests without touching the
//! host. Steps run strictly in order; the first failure ends the run and
//! nothing already done is rolled back.

use std::fmt;
use std::path::PathBuf;

use crate::context::{ProvisioningContext, Variant};
use crate::error::DeployError;
use crate::readiness::Readiness;

mod db;
mod nsfs;
mod sequencer;

pub use sequencer::Sequencer;

/// An npm lifecycle script and the arguments passed after its name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Script {
    pub name: String,
    pub args: Vec<String>,
}

impl Script {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "npm run {}", self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// The two verification gates at the end of the DB pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthCheck {
    StorageStatus,
    AggregateNodeStatus,
}

impl HealthCheck {
    pub fn script(self) -> Script {
        match self {
            Self::StorageStatus => Script::with_args("api", ["--", "node", "sync_monitor_to_store"]),
            Self::AggregateNodeStatus => {
                Script::with_args("api", ["--", "node", "aggregate_nodes", "{}"])
            }
        }
    }

    pub fn failure(self, exit_code: i32) -> DeployError {
        match self {
            Self::StorageStatus => DeployError::StorageStatusCheckFailed(exit_code),
            Self::AggregateNodeStatus => DeployError::AggregateNodeStatusCheckFailed(exit_code),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Resolve, download and install the noobaa-core RPM.
    InstallMainPackage,
    /// `yum install -y` of package names, local paths or URLs.
    InstallPackages(Vec<String>),
    /// `dnf module enable -y <module>`.
    EnableModule(String),
    Chmod { path: PathBuf, mode: String },
    /// Local, idempotent directory creation.
    CreateDir(PathBuf),
    /// `mkdir -p` on the host, for directories that need elevated rights.
    MakeDir(PathBuf),
    Symlink { target: PathBuf, link: PathBuf },
    /// Waited script, fatal on non-zero exit.
    RunScript(Script),
    /// Detached script.
    SpawnScript(Script),
    WriteEnvFile { template: PathBuf, dest: PathBuf },
    CopyFile { source: PathBuf, dest: PathBuf },
    StartService(String),
    VerifyService(String),
    HealthCheck(HealthCheck),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstallMainPackage => f.write_str("resolve, download and install noobaa-core"),
            Self::InstallPackages(packages) => write!(f, "yum install -y {}", packages.join(" ")),
            Self::EnableModule(module) => write!(f, "dnf module enable -y {module}"),
            Self::Chmod { path, mode } => write!(f, "chmod {mode} {}", path.display()),
            Self::CreateDir(path) => write!(f, "create directory {}", path.display()),
            Self::MakeDir(path) => write!(f, "mkdir -p {}", path.display()),
            Self::Symlink { target, link } => {
                write!(f, "ln -sf {} {}", target.display(), link.display())
            }
            Self::RunScript(script) => write!(f, "{script}"),
            Self::SpawnScript(script) => write!(f, "{script} (detached)"),
            Self::WriteEnvFile { template, dest } => {
                write!(f, "render {} to {}", template.display(), dest.display())
            }
            Self::CopyFile { source, dest } => {
                write!(f, "cp {} {}", source.display(), dest.display())
            }
            Self::StartService(name) => write!(f, "systemctl start {name}"),
            Self::VerifyService(name) => write!(f, "systemctl is-active {name}"),
            Self::HealthCheck(check) => write!(f, "{} (health check)", check.script()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    pub action: Action,
    /// Wait applied after the action succeeds.
    pub settle: Option<Readiness>,
}

impl Step {
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            action,
            settle: None,
        }
    }

    pub fn settle(mut self, readiness: Readiness) -> Self {
        self.settle = Some(readiness);
        self
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.action)?;
        if let Some(settle) = &self.settle {
            write!(f, " then {settle}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Plan {
    pub variant: Variant,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn for_context(ctx: &ProvisioningContext) -> Self {
        let steps = match ctx.variant {
            Variant::Db => db::steps(ctx),
            Variant::Nsfs => nsfs::steps(ctx),
        };
        Self {
            variant: ctx.variant,
            steps,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} deployment, {} steps", self.variant, self.steps.len())?;
        for (idx, step) in self.steps.iter().enumerate() {
            writeln!(f, "{:>3}. {step}", idx + 1)?;
        }
        Ok(())
    }
}
