//! Backup/restore types

use crate::api::ApiClient;
use crate::config::MigrationConfig;
use crate::error::Error;
use crate::kinds::EntityKind;
use crate::storage::ArtifactStore;
use std::path::PathBuf;

/// Everything an exporter needs, passed explicitly
pub struct ExportContext<'a> {
    pub client: &'a dyn ApiClient,
    pub store: &'a ArtifactStore,
    pub config: &'a MigrationConfig,
}

/// Everything an importer needs, passed explicitly
pub struct ImportContext<'a> {
    pub client: &'a dyn ApiClient,
    pub store: &'a ArtifactStore,
    pub config: &'a MigrationConfig,
    pub options: &'a RestoreOptions,
}

/// Operator choices that only apply to restores
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Host groups to restore hosts from; empty means every exported group
    pub host_groups: Vec<String>,
}

impl RestoreOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the hosts restore to these groups
    ///
    /// # Example
    /// ```rust
    /// use zbx_migrate::RestoreOptions;
    ///
    /// let options = RestoreOptions::new().host_groups(&["Linux servers", "Network"]);
    /// assert_eq!(options.host_groups.len(), 2);
    /// ```
    #[must_use]
    pub fn host_groups(mut self, groups: &[impl AsRef<str>]) -> Self {
        self.host_groups = groups.iter().map(|g| g.as_ref().to_string()).collect();
        self
    }
}

/// A record or file that could not be processed
#[derive(Debug)]
pub struct RecordFailure {
    /// Record name, or artifact file name
    pub label: String,
    pub error: Error,
}

/// What happened to the image files of one export
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImageCounts {
    /// New image names
    pub added: usize,
    /// Images whose content changed; their old files were replaced
    pub updated: usize,
    /// Images whose file already matched
    pub unchanged: usize,
    /// Image files present after the export
    pub total_files: usize,
}

/// Result of exporting one kind
#[derive(Debug)]
pub struct ExportSummary {
    pub kind: EntityKind,

    /// Records (or document objects) persisted
    pub exported: usize,

    /// Files written
    pub files: Vec<PathBuf>,

    /// Hosts exported per host group
    pub groups: Vec<(String, usize)>,

    /// Set for the content-addressed image export
    pub images: Option<ImageCounts>,

    /// Records left out of the artifact
    pub failures: Vec<RecordFailure>,
}

impl ExportSummary {
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            exported: 0,
            files: Vec::new(),
            groups: Vec::new(),
            images: None,
            failures: Vec::new(),
        }
    }
}

/// A user created during restore, with the password it was given
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedPassword {
    pub login: String,
    pub password: String,
}

impl std::fmt::Debug for GeneratedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedPassword")
            .field("login", &self.login)
            .field("password", &"***")
            .finish()
    }
}

/// A configuration document accepted by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedDocument {
    /// Artifact file name
    pub label: String,
    /// Objects in the document's main section
    pub objects: usize,
}

/// Result of restoring one kind
#[derive(Debug)]
pub struct ImportSummary {
    pub kind: EntityKind,

    /// Records that were created
    pub created: Vec<String>,

    /// Records that were skipped (already exist)
    pub skipped: Vec<String>,

    /// Records that failed, with the reason
    pub failures: Vec<RecordFailure>,

    /// Documents applied through `configuration.import`
    pub applied: Vec<AppliedDocument>,

    /// Passwords of created users; shown to the operator once
    pub passwords: Vec<GeneratedPassword>,

    /// No artifact was found for this kind
    pub missing_artifact: bool,

    /// Operator-facing remarks (requested groups not found, ...)
    pub notes: Vec<String>,

    /// Transport failure that stopped the remaining records
    pub aborted: Option<String>,
}

impl ImportSummary {
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            created: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
            applied: Vec::new(),
            passwords: Vec::new(),
            missing_artifact: false,
            notes: Vec::new(),
            aborted: None,
        }
    }

    pub(crate) fn missing(kind: EntityKind, path: &std::path::Path) -> Self {
        let mut summary = Self::new(kind);
        summary.missing_artifact = true;
        summary
            .notes
            .push(format!("Nothing to restore: {} not found", path.display()));
        summary
    }

    /// Check if anything was created or applied
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.created.is_empty() || !self.applied.is_empty()
    }

    /// Get total record count
    #[must_use]
    pub fn total(&self) -> usize {
        self.created.len() + self.skipped.len() + self.failures.len()
    }
}
