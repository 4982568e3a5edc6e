//! Connection state machine
//!
//! Every operation starts by asking NetworkManager for the current state;
//! nothing is cached between calls.
//!
//! ```text
//!            establish (password + TOTP via passwd-file)
//! Inactive ----------------------------------------------> Active
//!          <----------------------------------------------
//!            interrupt
//! ```
//!
//! `toggle` always takes the transition out of the probed state. `connect`
//! and `disconnect` only take their own transition and warn otherwise.

use crate::config::{Config, ConfigError, LoadMode};
use crate::nm::{
    CommandRunner, ConnectionError, ConnectionState, NetworkManager, SecretFile,
};
use crate::prompt::Prompter;
use crate::totp::{self, CredentialError};
use std::future::Future;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ToggleError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

/// What an operation ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Connected,
    Disconnected,
    /// `connect` found the profile already up and did nothing
    AlreadyActive,
    /// `disconnect` found the profile already down and did nothing
    AlreadyInactive,
}

/// Top-level operations reachable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Toggle,
    Connect,
    Disconnect,
    Status,
}

impl Action {
    /// How the configuration is loaded for this action
    ///
    /// Only `Toggle` provisions a missing config interactively; the other
    /// actions fail instead of prompting.
    pub fn load_mode(self, prompter: &dyn Prompter) -> LoadMode<'_> {
        match self {
            Action::Toggle => LoadMode::Provision(prompter),
            Action::Connect | Action::Disconnect | Action::Status => LoadMode::Strict,
        }
    }
}

/// Resolves once the user presses Ctrl-C
///
/// If the handler cannot be installed this never resolves.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        debug!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

pub struct Controller<R> {
    nm: NetworkManager<R>,
    config: Config,
    secret_dir: Option<PathBuf>,
}

impl<R: CommandRunner> Controller<R> {
    pub fn new(nm: NetworkManager<R>, config: Config) -> Self {
        Self {
            nm,
            config,
            secret_dir: None,
        }
    }

    /// Place passwd-files in `dir` instead of the system temp directory
    #[cfg(test)]
    pub(crate) fn with_secret_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.secret_dir = Some(dir.into());
        self
    }

    #[cfg(test)]
    pub(crate) fn network_manager(&self) -> &NetworkManager<R> {
        &self.nm
    }

    fn name(&self) -> &str {
        &self.config.connection_name
    }

    pub async fn status(&self) -> ConnectionState {
        self.nm.state(self.name()).await
    }

    /// Flip the connection: down if active, up otherwise
    pub async fn toggle(&self) -> Result<Outcome, ToggleError> {
        match self.status().await {
            ConnectionState::Active => self.interrupt().await,
            ConnectionState::Inactive => self.establish().await,
        }
    }

    /// Bring the connection up unless it already is
    pub async fn connect(&self) -> Result<Outcome, ToggleError> {
        match self.status().await {
            ConnectionState::Active => {
                warn!("{} is already connected", self.name());
                Ok(Outcome::AlreadyActive)
            }
            ConnectionState::Inactive => self.establish().await,
        }
    }

    /// Bring the connection down unless it already is
    pub async fn disconnect(&self) -> Result<Outcome, ToggleError> {
        match self.status().await {
            ConnectionState::Active => self.interrupt().await,
            ConnectionState::Inactive => {
                warn!("{} is not connected", self.name());
                Ok(Outcome::AlreadyInactive)
            }
        }
    }

    /// Inactive -> Active
    async fn establish(&self) -> Result<Outcome, ToggleError> {
        self.establish_until(ctrl_c()).await
    }

    /// Bring the connection up unless `interrupted` resolves first
    ///
    /// The passwd-file is removed after `nmcli` returns, fails or is
    /// abandoned on interruption. Should anything unwind in between, dropping
    /// the guard removes it.
    async fn establish_until(
        &self,
        interrupted: impl Future<Output = ()>,
    ) -> Result<Outcome, ToggleError> {
        info!("Connecting {}...", self.name());

        let password = totp::combine(
            &self.config.secret_base32,
            &self.config.password_static_part,
        )?;

        let secret = match &self.secret_dir {
            Some(dir) => SecretFile::create_in(dir, &password),
            None => SecretFile::create(&password),
        }
        .map_err(ConnectionError::SecretFile)?;
        drop(password);
        debug!("Wrote passwd-file {}", secret.path().display());

        let result = tokio::select! {
            result = self.nm.up(self.name(), secret.path()) => result,
            _ = interrupted => {
                warn!("Interrupted while bringing up {}", self.name());
                Err(ConnectionError::Interrupted {
                    name: self.name().to_string(),
                })
            }
        };

        let cleanup = secret.remove();
        if let Err(e) = &cleanup {
            warn!("Failed to remove passwd-file: {}", e);
        }

        result?;
        cleanup.map_err(ConnectionError::SecretFile)?;

        info!("{} connected", self.name());
        Ok(Outcome::Connected)
    }

    /// Active -> Inactive
    async fn interrupt(&self) -> Result<Outcome, ToggleError> {
        info!("Disconnecting {}...", self.name());
        self.nm.down(self.name()).await?;
        info!("{} disconnected", self.name());
        Ok(Outcome::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigStore;
    use crate::nm::testing::MockRunner;
    use crate::prompt::tests::ScriptedPrompter;
    use tempfile::TempDir;

    fn config() -> Config {
        Config::new("work-vpn", "JBSWY3DPEHPK3PXP", "hunter")
    }

    fn controller(runner: MockRunner, dir: &TempDir) -> Controller<MockRunner> {
        Controller::new(NetworkManager::new(runner), config()).with_secret_dir(dir.path())
    }

    fn runner(c: &Controller<MockRunner>) -> &MockRunner {
        c.network_manager().runner()
    }

    #[tokio::test]
    async fn test_toggle_inactive_brings_up() {
        let dir = TempDir::new().unwrap();
        let c = controller(MockRunner::inactive(), &dir);

        assert_eq!(c.toggle().await.unwrap(), Outcome::Connected);

        assert_eq!(runner(&c).count("show"), 1);
        assert_eq!(runner(&c).count("up"), 1);
        assert_eq!(runner(&c).count("down"), 0);
    }

    #[tokio::test]
    async fn test_toggle_active_brings_down() {
        let dir = TempDir::new().unwrap();
        let c = controller(MockRunner::active(), &dir);

        assert_eq!(c.toggle().await.unwrap(), Outcome::Disconnected);

        assert_eq!(runner(&c).count("up"), 0);
        assert_eq!(runner(&c).count("down"), 1);
        assert!(runner(&c).secret_seen().is_none());
    }

    #[tokio::test]
    async fn test_state_checked_before_action() {
        let dir = TempDir::new().unwrap();
        let c = controller(MockRunner::active(), &dir);
        c.toggle().await.unwrap();

        let calls = runner(&c).calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].iter().any(|a| a == "show"));
        assert!(calls[1].iter().any(|a| a == "down"));
    }

    #[tokio::test]
    async fn test_establish_passes_password_file_and_removes_it() {
        let dir = TempDir::new().unwrap();
        let c = controller(MockRunner::inactive(), &dir);

        c.connect().await.unwrap();

        let seen = runner(&c).secret_seen().expect("up should receive a passwd-file");
        let contents = seen.contents.expect("passwd-file should exist during up");
        let code = contents
            .strip_prefix("vpn.secrets.password:hunter")
            .expect("passwd-file should hold the static part");
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|ch| ch.is_ascii_digit()));

        assert!(seen.path.starts_with(dir.path()));
        assert!(!seen.path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_establish_failure_still_removes_file() {
        let dir = TempDir::new().unwrap();
        let c = controller(MockRunner::inactive().with_up_code(4), &dir);

        let result = c.toggle().await;

        assert!(matches!(
            result,
            Err(ToggleError::Connection(ConnectionError::Up { .. }))
        ));
        let seen = runner(&c).secret_seen().expect("up should have been attempted");
        assert!(seen.contents.is_some());
        assert!(!seen.path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_interrupted_establish_removes_file() {
        let dir = TempDir::new().unwrap();
        let c = controller(MockRunner::inactive().with_up_hanging(), &dir);
        let (interrupt, interrupted) = tokio::sync::oneshot::channel::<()>();

        let establish = c.establish_until(async {
            let _ = interrupted.await;
        });
        let trigger = async {
            // let nmcli up start and see its passwd-file first
            while c.network_manager().runner().secret_seen().is_none() {
                tokio::task::yield_now().await;
            }
            interrupt.send(()).unwrap();
        };
        let (result, ()) = tokio::join!(establish, trigger);

        assert!(matches!(
            result,
            Err(ToggleError::Connection(ConnectionError::Interrupted { .. }))
        ));
        let seen = runner(&c).secret_seen().unwrap();
        assert!(seen.contents.is_some());
        assert!(!seen.path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_only_toggle_provisions_config() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join(".nvpnrc"));
        let prompter = ScriptedPrompter::new(&["work-vpn", "JBSWY3DPEHPK3PXP", "hunter"]);

        for action in [Action::Connect, Action::Disconnect, Action::Status] {
            assert!(matches!(action.load_mode(&prompter), LoadMode::Strict));
            assert!(matches!(
                store.load(action.load_mode(&prompter)),
                Err(ConfigError::Missing(_))
            ));
        }
        assert_eq!(prompter.asked(), 0);
        assert!(!store.exists());

        let loaded = store.load(Action::Toggle.load_mode(&prompter)).unwrap();
        assert_eq!(loaded, config());
        assert_eq!(prompter.asked(), 3);
        assert!(store.exists());
    }

    #[tokio::test]
    async fn test_invalid_secret_aborts_before_nmcli_up() {
        let dir = TempDir::new().unwrap();
        let config = Config::new("work-vpn", "not base32!", "hunter");
        let c = Controller::new(NetworkManager::new(MockRunner::inactive()), config)
            .with_secret_dir(dir.path());

        let result = c.connect().await;

        assert!(matches!(result, Err(ToggleError::Credential(_))));
        assert_eq!(runner(&c).count("up"), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_connect_when_active_is_noop() {
        let dir = TempDir::new().unwrap();
        let c = controller(MockRunner::active(), &dir);

        assert_eq!(c.connect().await.unwrap(), Outcome::AlreadyActive);

        assert_eq!(runner(&c).count("up"), 0);
        assert_eq!(runner(&c).count("down"), 0);
    }

    #[tokio::test]
    async fn test_disconnect_when_inactive_is_noop() {
        let dir = TempDir::new().unwrap();
        let c = controller(MockRunner::inactive(), &dir);

        assert_eq!(c.disconnect().await.unwrap(), Outcome::AlreadyInactive);

        assert_eq!(runner(&c).count("up"), 0);
        assert_eq!(runner(&c).count("down"), 0);
    }

    #[tokio::test]
    async fn test_disconnect_when_active() {
        let dir = TempDir::new().unwrap();
        let c = controller(MockRunner::active(), &dir);

        assert_eq!(c.disconnect().await.unwrap(), Outcome::Disconnected);
        assert_eq!(runner(&c).count("down"), 1);
    }

    #[tokio::test]
    async fn test_disconnect_failure() {
        let dir = TempDir::new().unwrap();
        let c = controller(MockRunner::active().with_down_code(10), &dir);

        let result = c.disconnect().await;

        assert!(matches!(
            result,
            Err(ToggleError::Connection(ConnectionError::Down { .. }))
        ));
    }

    #[tokio::test]
    async fn test_unexpected_state_treated_as_inactive() {
        let dir = TempDir::new().unwrap();
        let runner_output = "GENERAL.STATE:                          activating\n";
        let c = controller(MockRunner::new(runner_output), &dir);

        assert_eq!(c.status().await, ConnectionState::Inactive);
        assert_eq!(c.toggle().await.unwrap(), Outcome::Connected);
    }
}
