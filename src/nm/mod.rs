//! NetworkManager integration module
//!
//! Everything that talks to `nmcli` lives here. The connection profile
//! itself (VPN type, gateway, certificates) is configured in NetworkManager;
//! we only query its state and bring it up or down.
//!
//! # Commands
//!
//! | Action | Invocation |
//! |--------|------------|
//! | Query | `nmcli -f GENERAL.STATE connection show <name>` |
//! | Activate | `nmcli connection up id <name> passwd-file <path>` |
//! | Deactivate | `nmcli connection down id <name>` |
//!
//! The password never appears on the command line, where any local user
//! could read it from the process table. It is written to a passwd-file
//! (see [`secret`]) that exists only while `nmcli connection up` runs.

pub mod client;
pub mod command;
pub mod secret;
pub mod state;

pub use client::{ConnectionError, NetworkManager};
pub use command::{CommandOutput, CommandRunner, ExitInfo, RunError, RunOptions, SystemRunner};
pub use secret::SecretFile;
pub use state::{ConnectionState, parse_state};
