//! Server credentials
//!
//! Credentials are kept per action, so backing up one server and restoring
//! into another needs no re-entry:
//! - **File**: TOML file with one table per action, owner-only permissions
//! - **Keychain**: OS-level secure storage - requires `keychain` feature
//! - **Memory**: In-memory only for testing

mod file;
#[cfg(feature = "keychain")]
mod keychain;
mod memory;

pub use file::FileStore;
#[cfg(feature = "keychain")]
pub use keychain::KeychainStore;
pub use memory::MemoryStore;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Section holding the credentials of the server being backed up
pub const BACKUP_SECTION: &str = "Zabbix_Backup";

/// Section holding the credentials of the server being restored into
pub const RESTORE_SECTION: &str = "Zabbix_Restore";

/// Endpoint and login for one server
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub url: String,
    pub login: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        url: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            login: login.into(),
            password: password.into(),
        }
    }

    /// Reject entries that cannot be used to log in
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credential`] naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("url", &self.url), ("login", &self.login)] {
            if value.trim().is_empty() {
                return Err(Error::Credential(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("login", &self.login)
            .field("password", &"***")
            .finish()
    }
}

/// Trait for credential storage backends
pub trait CredentialStore {
    /// Load the credentials saved under `section`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or its content is invalid.
    fn load(&self, section: &str) -> Result<Option<Credentials>>;

    /// Save credentials under `section`, replacing what was there
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to store the entry.
    fn store(&self, section: &str, credentials: &Credentials) -> Result<()>;

    /// Forget the credentials under `section`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to remove the entry.
    fn remove(&self, section: &str) -> Result<()>;

    /// Backend name for logging/debugging
    fn backend_name(&self) -> &'static str;
}
