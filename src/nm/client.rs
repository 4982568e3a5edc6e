//! nmcli invocations for a single connection profile

use super::command::{CommandRunner, RunError, RunOptions};
use super::state::{ConnectionState, parse_state};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Default NetworkManager CLI binary
pub const NMCLI: &str = "nmcli";

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to bring up {name}: {source}")]
    Up {
        name: String,
        #[source]
        source: RunError,
    },
    #[error("Failed to bring down {name}: {source}")]
    Down {
        name: String,
        #[source]
        source: RunError,
    },
    #[error("Interrupted while bringing up {name}")]
    Interrupted { name: String },
    #[error("Failed to handle passwd-file: {0}")]
    SecretFile(#[from] io::Error),
}

/// Thin wrapper over `nmcli` parameterized by the command runner
pub struct NetworkManager<R> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> NetworkManager<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            program: NMCLI.to_string(),
        }
    }

    /// Use a different binary, e.g. one that does not exist
    #[cfg(test)]
    pub(crate) fn with_program(runner: R, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    #[cfg(test)]
    pub(crate) fn runner(&self) -> &R {
        &self.runner
    }

    /// Current activation state of `name`
    ///
    /// Never fails: if `nmcli` cannot be run, exits non-zero, or reports
    /// anything but `activated`, the profile is considered inactive.
    pub async fn state(&self, name: &str) -> ConnectionState {
        let args = ["-f", "GENERAL.STATE", "connection", "show", name];
        match self
            .runner
            .run(&self.program, &args, RunOptions::captured())
            .await
        {
            Ok(output) => {
                if !output.status.success() {
                    debug!(
                        "State query for {} exited with {:?}: {}",
                        name,
                        output.status.code,
                        output.stderr.trim()
                    );
                }
                let state = parse_state(&output.stdout);
                debug!("Connection {} is {}", name, state);
                state
            }
            Err(e) => {
                debug!("State query for {} failed, assuming inactive: {}", name, e);
                ConnectionState::Inactive
            }
        }
    }

    pub async fn is_active(&self, name: &str) -> bool {
        self.state(name).await.is_active()
    }

    /// `nmcli connection up id <name> passwd-file <path>`, output streamed
    pub async fn up(&self, name: &str, passwd_file: &Path) -> Result<(), ConnectionError> {
        let passwd_file = passwd_file.to_string_lossy();
        let args = ["connection", "up", "id", name, "passwd-file", &*passwd_file];

        info!("Bringing up {}", name);
        self.runner
            .run(&self.program, &args, RunOptions::streamed())
            .await
            .and_then(|output| output.into_result(&self.program))
            .map_err(|source| ConnectionError::Up {
                name: name.to_string(),
                source,
            })?;
        Ok(())
    }

    /// `nmcli connection down id <name>`, output streamed
    pub async fn down(&self, name: &str) -> Result<(), ConnectionError> {
        let args = ["connection", "down", "id", name];

        info!("Bringing down {}", name);
        self.runner
            .run(&self.program, &args, RunOptions::streamed())
            .await
            .and_then(|output| output.into_result(&self.program))
            .map_err(|source| ConnectionError::Down {
                name: name.to_string(),
                source,
            })?;
        Ok(())
    }
}
