//! TOML credentials file

use super::{CredentialStore, Credentials};
use crate::error::{self, Error, Result};
use crate::security::{ensure_secure_dir, set_secure_file_permissions};
use log::debug;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Credentials file with one table per section
///
/// ```toml
/// [Zabbix_Backup]
/// url = "http://old.example.com/zabbix"
/// login = "Admin"
/// password = "zabbix"
/// ```
///
/// Passwords are stored in clear text; the file is written with owner-only
/// permissions.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, Credentials>> {
        if !self.path.is_file() {
            return Ok(BTreeMap::new());
        }
        let content = error::read_file(&self.path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Credential(format!("{}: {e}", self.path.display())))
    }

    fn write_all(&self, sections: &BTreeMap<String, Credentials>) -> Result<()> {
        let content = toml::to_string(sections)
            .map_err(|e| Error::Credential(format!("Failed to serialize credentials: {e}")))?;

        // A directory created for the credentials file is owner-only too
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty() && !p.exists()) {
            ensure_secure_dir(parent)?;
        }

        // Secure the temp file before it gets its final name
        let mut temp_name = self.path.as_os_str().to_os_string();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        error::write_file(&temp_path, content)?;
        set_secure_file_permissions(&temp_path)?;
        std::fs::rename(&temp_path, &self.path).map_err(|e| Error::FileWrite {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl CredentialStore for FileStore {
    fn load(&self, section: &str) -> Result<Option<Credentials>> {
        Ok(self.read_all()?.remove(section))
    }

    fn store(&self, section: &str, credentials: &Credentials) -> Result<()> {
        let mut sections = self.read_all()?;
        sections.insert(section.to_string(), credentials.clone());
        self.write_all(&sections)?;
        debug!("Saved [{section}] to {}", self.path.display());
        Ok(())
    }

    fn remove(&self, section: &str) -> Result<()> {
        let mut sections = self.read_all()?;
        if sections.remove(section).is_some() {
            self.write_all(&sections)?;
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
