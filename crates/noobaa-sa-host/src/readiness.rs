use std::fmt;
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use humantime::format_duration;
use tracing::{debug, info};

use crate::error::{DeployError, Result};

const MIN_CONNECT_TIMEOUT: Duration = Duration::from_millis(100);

/// How the sequencer waits for an asynchronously started process.
///
/// `FixedDelay` does not observe the process at all; it only gives it time.
/// It is the default so runs stay comparable with the historical harness.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readiness {
    FixedDelay(Duration),
    Tcp {
        target: String,
        addr: SocketAddr,
        attempts: u32,
        interval: Duration,
    },
}

impl Readiness {
    pub fn wait(&self) -> Result<()> {
        match self {
            Self::FixedDelay(delay) => {
                if !delay.is_zero() {
                    debug!(delay = %format_duration(*delay), "sleeping after service start");
                    thread::sleep(*delay);
                }
                Ok(())
            }
            Self::Tcp {
                target,
                addr,
                attempts,
                interval,
            } => {
                let attempts = (*attempts).max(1);
                let connect_timeout = (*interval).max(MIN_CONNECT_TIMEOUT);
                for attempt in 1..=attempts {
                    match TcpStream::connect_timeout(addr, connect_timeout) {
                        Ok(_) => {
                            info!(%target, %addr, attempt, "service is accepting connections");
                            return Ok(());
                        }
                        Err(err) => {
                            debug!(%target, %addr, attempt, error = %err, "service not ready yet");
                            if attempt < attempts {
                                thread::sleep(*interval);
                            }
                        }
                    }
                }
                Err(DeployError::NotReady {
                    target: format!("{target} ({addr})"),
                    attempts,
                })
            }
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedDelay(delay) => write!(f, "wait {}", format_duration(*delay)),
            Self::Tcp {
                addr,
                attempts,
                interval,
                ..
            } => write!(
                f,
                "poll tcp {addr} ({attempts} x {})",
                format_duration(*interval)
            ),
        }
    }
}
