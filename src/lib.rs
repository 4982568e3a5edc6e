//! nvpn - toggle a NetworkManager VPN profile with a static password plus TOTP
//!
//! Looks up the activation state of a named NetworkManager connection and
//! flips it. Bringing the connection up authenticates with a password built
//! from a static fragment and a fresh time-based one-time code, handed to
//! `nmcli` through a short-lived passwd-file.
//!
//! # Architecture
//!
//! - `config`: Per-user configuration file handling (JSON)
//! - `prompt`: Interactive collection of the configuration fields
//! - `totp`: Ephemeral credential generation (RFC 6238)
//! - `nm`: nmcli integration (process runner, state parsing, secret file)
//! - `toggle`: Connection state machine (toggle, connect, disconnect)
//!
//! # Usage
//!
//! ```bash
//! nvpn init      # store connection name, secret and static password
//! nvpn           # toggle the connection
//! nvpn connect   # bring it up, warn if already active
//! ```

pub mod config;
pub mod nm;
pub mod prompt;
pub mod toggle;
pub mod totp;

pub use config::{Config, ConfigStore, LoadMode};
pub use nm::{ConnectionState, NetworkManager, SystemRunner};
pub use toggle::{Action, Controller, Outcome, ToggleError};
