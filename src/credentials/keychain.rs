//! OS Keychain backend using keyring crate

use super::{CredentialStore, Credentials};
use crate::error::{Error, Result};
use keyring::Entry;
use log::{debug, warn};

/// OS keychain storage, one entry per section
///
/// The entry secret is the JSON form of [`Credentials`].
pub struct KeychainStore {
    service_name: String,
}

impl KeychainStore {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, section: &str) -> Result<Entry> {
        Entry::new(&self.service_name, section).map_err(|e| {
            Error::Credential(format!("{section}: Failed to create keychain entry: {e}"))
        })
    }
}

impl CredentialStore for KeychainStore {
    fn load(&self, section: &str) -> Result<Option<Credentials>> {
        match self.entry(section)?.get_password() {
            Ok(secret) => {
                debug!("Credentials retrieved from keychain: {section}");
                serde_json::from_str(&secret)
                    .map(Some)
                    .map_err(|e| Error::Credential(format!("{section}: Invalid keychain entry: {e}")))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => {
                warn!("Failed to retrieve credentials from keychain: {e}");
                Err(Error::Credential(format!(
                    "{section}: Failed to retrieve credentials: {e}"
                )))
            }
        }
    }

    fn store(&self, section: &str, credentials: &Credentials) -> Result<()> {
        let secret = serde_json::to_string(credentials)?;
        self.entry(section)?.set_password(&secret).map_err(|e| {
            Error::Credential(format!(
                "{section}: Failed to store credentials in keychain: {e}"
            ))
        })?;

        debug!("Credentials stored in keychain: {section}");
        Ok(())
    }

    fn remove(&self, section: &str) -> Result<()> {
        match self.entry(section)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Credential(format!(
                "{section}: Failed to remove credentials: {e}"
            ))),
        }
    }

    fn backend_name(&self) -> &'static str {
        "keychain"
    }
}
