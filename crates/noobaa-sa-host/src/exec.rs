use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{DeployError, Result};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long to keep draining pipes after the child is gone. A detached
/// grandchild can hold them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// A command to run on the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    sudo: bool,
    timeout: Duration,
}

impl HostCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            sudo: false,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn uses_sudo(&self) -> bool {
        self.sudo
    }

    pub fn time_limit(&self) -> Duration {
        self.timeout
    }

    fn to_command(&self) -> Command {
        let mut command = if self.sudo {
            let mut command = Command::new("sudo");
            command.arg(&self.program);
            command
        } else {
            Command::new(&self.program)
        };
        command.args(&self.args);
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        command
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sudo {
            f.write_str("sudo ")?;
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Capability to execute host commands.
pub trait CommandRunner {
    /// Run to completion and capture output. A non-zero exit code is not an
    /// error at this level; callers decide what it means.
    fn run(&self, command: &HostCommand) -> Result<CommandOutput>;

    /// Launch without waiting. Only failing to start is an error.
    fn spawn(&self, command: &HostCommand) -> Result<()>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &HostCommand) -> Result<CommandOutput> {
        info!(command = %command, "executing command");
        let mut child = command
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DeployError::Spawn {
                command: command.to_string(),
                source,
            })?;
        let stdout = child.stdout.take().map(PipeReader::start);
        let stderr = child.stderr.take().map(PipeReader::start);

        let deadline = Instant::now() + command.time_limit();
        let status = loop {
            let polled = child.try_wait().map_err(|source| DeployError::Spawn {
                command: command.to_string(),
                source,
            })?;
            match polled {
                Some(status) => break Some(status),
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        let output = CommandOutput {
            exit_code: status.and_then(|status| status.code()).unwrap_or(-1),
            stdout: PipeReader::finish(stdout),
            stderr: PipeReader::finish(stderr),
        };
        log_output(&output);
        match status {
            Some(_) => Ok(output),
            None => {
                warn!(command = %command, "command timed out and was killed");
                Err(DeployError::CommandTimeout {
                    command: command.to_string(),
                    timeout: command.time_limit(),
                    output,
                })
            }
        }
    }

    fn spawn(&self, command: &HostCommand) -> Result<()> {
        info!(command = %command, "launching background command");
        let child = command
            .to_command()
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| DeployError::Spawn {
                command: command.to_string(),
                source,
            })?;
        info!(pid = child.id(), "background command started");
        Ok(())
    }
}

/// Drains a child pipe on its own thread into a buffer that stays readable
/// even if the thread never finishes.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl PipeReader {
    fn start<R: Read + Send + 'static>(mut pipe: R) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let handle = thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink.lock().extend_from_slice(&chunk[..n]),
                }
            }
        });
        Self { buf, handle }
    }

    fn finish(reader: Option<Self>) -> String {
        let Some(reader) = reader else {
            return String::new();
        };
        let deadline = Instant::now() + DRAIN_GRACE;
        while !reader.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL);
        }
        if reader.handle.is_finished() {
            let _ = reader.handle.join();
        }
        String::from_utf8_lossy(&reader.buf.lock()).into_owned()
    }
}

/// Log captured output the same way for every command so failures can be
/// diagnosed from the run log alone.
pub fn log_output(output: &CommandOutput) {
    if output.stdout.trim().is_empty() {
        info!("command stdout is empty");
    } else {
        info!(stdout = %output.stdout.trim_end(), "command stdout");
    }
    if output.stderr.trim().is_empty() {
        info!("command stderr is empty");
    } else {
        info!(stderr = %output.stderr.trim_end(), "command stderr");
    }
    info!(exit_code = output.exit_code, "command return code");
}
