//! In-memory credential store for testing

use super::{CredentialStore, Credentials};
use crate::error::Result;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory credential storage (not persisted)
pub struct MemoryStore {
    sections: RwLock<HashMap<String, Credentials>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self, section: &str) -> Result<Option<Credentials>> {
        Ok(self
            .sections
            .read()
            .ok()
            .and_then(|s| s.get(section).cloned()))
    }

    fn store(&self, section: &str, credentials: &Credentials) -> Result<()> {
        if let Ok(mut sections) = self.sections.write() {
            sections.insert(section.to_string(), credentials.clone());
        }
        Ok(())
    }

    fn remove(&self, section: &str) -> Result<()> {
        if let Ok(mut sections) = self.sections.write() {
            sections.remove(section);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
