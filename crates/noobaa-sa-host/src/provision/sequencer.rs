use std::fs::{self, DirBuilder};
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

use rpm_core::{ArtifactSource, RpmResolver};
use tracing::{error, info};

use super::{Action, HealthCheck, Plan, Script, Step};
use crate::context::ProvisioningContext;
use crate::error::{DeployError, Result};
use crate::exec::{CommandOutput, CommandRunner, HostCommand};
use crate::templating::render_template_file;

const ENV_FILE_MODE: &str = "666";

/// Executes a [`Plan`] step by step against a command runner.
pub struct Sequencer<'a> {
    ctx: &'a ProvisioningContext,
    runner: &'a dyn CommandRunner,
    source: &'a dyn ArtifactSource,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        ctx: &'a ProvisioningContext,
        runner: &'a dyn CommandRunner,
        source: &'a dyn ArtifactSource,
    ) -> Self {
        Self {
            ctx,
            runner,
            source,
        }
    }

    pub fn run(&self, plan: &Plan) -> Result<()> {
        let total = plan.steps.len();
        info!(variant = %plan.variant, steps = total, "starting deployment");
        for (idx, step) in plan.steps.iter().enumerate() {
            let position = idx + 1;
            info!(step = position, total, name = %step.name, "running step");
            if let Err(err) = self.run_step(step) {
                error!(step = position, name = %step.name, error = %err, "step failed");
                return Err(err);
            }
        }
        info!(variant = %plan.variant, "deployment finished");
        Ok(())
    }

    fn run_step(&self, step: &Step) -> Result<()> {
        self.execute(&step.action)?;
        if let Some(settle) = &step.settle {
            info!(name = %step.name, wait = %settle, "waiting for readiness");
            settle.wait()?;
        }
        Ok(())
    }

    fn execute(&self, action: &Action) -> Result<()> {
        match action {
            Action::InstallMainPackage => self.install_main_package(),
            Action::InstallPackages(packages) => self.install(packages),
            Action::EnableModule(module) => {
                let command = self
                    .host("dnf")
                    .args(["module", "enable", "-y", module.as_str()]);
                self.checked(&command).map(drop)
            }
            Action::Chmod { path, mode } => self.chmod(path, mode),
            Action::CreateDir(path) => create_dir(path),
            Action::MakeDir(path) => {
                let command = self.host("mkdir").arg("-p").arg(path.display().to_string());
                self.checked(&command).map(drop)
            }
            Action::Symlink { target, link } => {
                let command = self.host("ln").args([
                    "-sf".to_string(),
                    target.display().to_string(),
                    link.display().to_string(),
                ]);
                self.checked(&command).map(drop)
            }
            Action::RunScript(script) => self.checked(&self.npm(script)).map(drop),
            Action::SpawnScript(script) => self.runner.spawn(&self.npm(script)),
            Action::WriteEnvFile { template, dest } => self.write_env_file(template, dest),
            Action::CopyFile { source, dest } => {
                let command = self.host("cp").args([
                    source.display().to_string(),
                    dest.display().to_string(),
                ]);
                self.checked(&command).map(drop)
            }
            Action::StartService(name) => {
                let command = self.host("systemctl").args(["start", name.as_str()]);
                self.checked(&command).map(drop)
            }
            Action::VerifyService(name) => self.verify_service(name),
            Action::HealthCheck(check) => self.health_check(*check),
        }
    }

    fn install_main_package(&self) -> Result<()> {
        let resolved = RpmResolver::new(&self.ctx.rpm, self.source).resolve()?;
        let path = self.source.download(
            &resolved.url,
            self.ctx.rpm.credentials_for(resolved.channel),
            &self.ctx.run.download_dir,
        )?;
        info!(url = %resolved.url, path = %path.display(), "downloaded RPM");
        self.install(&[path.display().to_string()])
    }

    fn install(&self, packages: &[String]) -> Result<()> {
        let command = self.host("yum").args(["install", "-y"]).args(packages.iter().cloned());
        let output = self.runner.run(&command)?;
        if !output.success() {
            return Err(DeployError::Installation {
                target: packages.join(" "),
                stderr: output.stderr,
            });
        }
        Ok(())
    }

    fn chmod(&self, path: &Path, mode: &str) -> Result<()> {
        let command = self.host("chmod").args([mode.to_string(), path.display().to_string()]);
        let output = self.runner.run(&command)?;
        if !output.success() {
            return Err(DeployError::PermissionChange {
                path: path.to_path_buf(),
                mode: mode.to_string(),
                stderr: output.stderr,
            });
        }
        Ok(())
    }

    /// Create the file with elevated rights, open it up, then write it as the
    /// current user.
    fn write_env_file(&self, template: &Path, dest: &Path) -> Result<()> {
        let rendered = render_template_file(template, &self.ctx.template_values)?;
        self.checked(&self.host("touch").arg(dest.display().to_string()))?;
        self.chmod(dest, ENV_FILE_MODE)?;
        fs::write(dest, rendered).map_err(|err| DeployError::io(dest, err))?;
        info!(path = %dest.display(), "env file written");
        Ok(())
    }

    fn verify_service(&self, name: &str) -> Result<()> {
        let command = self.host("systemctl").args(["is-active", name]);
        let output = self.runner.run(&command)?;
        if output.success() && output.stdout.trim() == "active" {
            info!(service = name, "service is running");
            Ok(())
        } else {
            Err(DeployError::ServiceNotRunning(name.to_string()))
        }
    }

    fn health_check(&self, check: HealthCheck) -> Result<()> {
        let output = self.runner.run(&self.npm(&check.script()))?;
        if !output.success() {
            return Err(check.failure(output.exit_code));
        }
        info!(check = ?check, "health check passed");
        Ok(())
    }

    fn host(&self, program: &str) -> HostCommand {
        HostCommand::new(program)
            .sudo(self.ctx.run.use_sudo)
            .timeout(self.ctx.run.command_timeout)
    }

    fn npm(&self, script: &Script) -> HostCommand {
        HostCommand::new("npm")
            .args(["run", script.name.as_str()])
            .args(script.args.iter().cloned())
            .current_dir(self.ctx.package_dir())
            .timeout(self.ctx.run.command_timeout)
    }

    fn checked(&self, command: &HostCommand) -> Result<CommandOutput> {
        let output = self.runner.run(command)?;
        if output.success() {
            Ok(output)
        } else {
            Err(DeployError::CommandFailed {
                command: command.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            })
        }
    }
}

fn create_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        info!(path = %path.display(), "directory already exists");
        return Ok(());
    }
    DirBuilder::new()
        .recursive(true)
        .mode(0o777)
        .create(path)
        .map_err(|err| DeployError::io(path, err))?;
    info!(path = %path.display(), "directory created");
    Ok(())
}
