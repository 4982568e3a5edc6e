//! Connection state parsing

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Matches the terse `nmcli -f GENERAL.STATE` line of an active profile
static ACTIVATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*GENERAL\.STATE:[ \t]+activated[ \t]*$").expect("static regex is valid")
});

/// Activation state of a connection profile as reported by NetworkManager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Active,
    Inactive,
}

impl ConnectionState {
    pub fn is_active(self) -> bool {
        self == ConnectionState::Active
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Active => write!(f, "active"),
            ConnectionState::Inactive => write!(f, "inactive"),
        }
    }
}

/// Interpret `nmcli -f GENERAL.STATE connection show <name>` output
///
/// Only an exact `activated` value counts. Intermediate states
/// (`activating`, `deactivating`), unknown profiles and error text are all
/// inactive.
pub fn parse_state(output: &str) -> ConnectionState {
    if ACTIVATED.is_match(output) {
        ConnectionState::Active
    } else {
        ConnectionState::Inactive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activated() {
        assert_eq!(
            parse_state("GENERAL.STATE:                          activated\n"),
            ConnectionState::Active
        );
        assert_eq!(parse_state("GENERAL.STATE: activated"), ConnectionState::Active);
        assert_eq!(
            parse_state("  GENERAL.STATE:\tactivated  \n"),
            ConnectionState::Active
        );
    }

    #[test]
    fn test_activated_among_other_lines() {
        let output = "GENERAL.NAME:  work-vpn\nGENERAL.STATE:  activated\n";
        assert_eq!(parse_state(output), ConnectionState::Active);
    }

    #[test]
    fn test_other_states_inactive() {
        for output in [
            "",
            "GENERAL.STATE:                          deactivated\n",
            "GENERAL.STATE:                          activating\n",
            "GENERAL.STATE:                          deactivating\n",
            "GENERAL.STATE:                          Activated\n",
            "general.state:                          activated\n",
            "GENERAL.STATE:activated\n",
            "GENERAL.STATE:  activated (externally)\n",
            "Error: work-vpn - no such connection profile.\n",
            "VPN.STATE: activated\n",
            "GENERAL.STATE:\nactivated\n",
            "GENERAL.STATE: \n  activated\n",
        ] {
            assert_eq!(
                parse_state(output),
                ConnectionState::Inactive,
                "expected inactive for {:?}",
                output
            );
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Active.to_string(), "active");
        assert_eq!(ConnectionState::Inactive.to_string(), "inactive");
        assert!(ConnectionState::Active.is_active());
        assert!(!ConnectionState::Inactive.is_active());
    }
}
