//! Short-lived passwd-file for `nmcli connection up`
//!
//! `nmcli` reads VPN secrets from a file of `setting.property:value` lines.
//! [`SecretFile`] owns such a file for the duration of one activation: it is
//! created with a unique name and mode 0600, and removed either explicitly
//! through [`SecretFile::remove`] or, on any other path, when dropped.

use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Property name of the VPN password in NetworkManager's secret store
pub const PASSWORD_PROPERTY: &str = "vpn.secrets.password";

const FILE_PREFIX: &str = "nvpn";

/// Render the passwd-file body for a password
pub fn passwd_line(password: &str) -> String {
    format!("{}:{}", PASSWORD_PROPERTY, password)
}

pub struct SecretFile {
    file: NamedTempFile,
}

impl SecretFile {
    /// Create a passwd-file in the system temp directory
    pub fn create(password: &str) -> io::Result<Self> {
        Self::create_in(&std::env::temp_dir(), password)
    }

    pub fn create_in(dir: &Path, password: &str) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(FILE_PREFIX)
            .tempfile_in(dir)?;
        file.write_all(passwd_line(password).as_bytes())?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the file now, reporting failures
    ///
    /// A file that is already gone counts as removed.
    pub fn remove(self) -> io::Result<()> {
        match self.file.close() {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
