//! Core configuration types

use super::duplicates::{DuplicatePolicy, DEFAULT_DUPLICATE_CODE, DEFAULT_DUPLICATE_PATTERN};
use crate::error::{self, Error, Result};
use crate::kinds::EntityKind;
use crate::rules::ImportRules;
use crate::storage::ArtifactStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "zbx-migrate";

/// Default location of the optional configuration file
#[must_use]
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.toml")
}

/// Configuration passed explicitly into every backup and restore operation
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Root of the artifact tree
    pub backup_dir: PathBuf,

    /// Pretty print JSON artifacts
    pub pretty_json: bool,

    /// HTTP timeout for API calls
    pub timeout: Duration,

    /// Which server errors mean "already exists"
    pub duplicate_policy: DuplicatePolicy,

    /// Separator placed between groups of generated user passwords
    pub password_separator: String,

    /// Per-kind overrides merged over the default import rules
    pub rule_overrides: HashMap<EntityKind, ImportRules>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from("backup"),
            pretty_json: false,
            timeout: Duration::from_secs(30),
            duplicate_policy: DuplicatePolicy::default(),
            password_separator: "-".into(),
            rule_overrides: HashMap::new(),
        }
    }
}

impl MigrationConfig {
    /// Create a new builder for MigrationConfig
    ///
    /// # Example
    /// ```rust
    /// use zbx_migrate::MigrationConfig;
    ///
    /// let config = MigrationConfig::builder()
    ///     .backup_dir("/var/backups/zabbix")
    ///     .pretty_json(true)
    ///     .build();
    /// ```
    pub fn builder() -> MigrationConfigBuilder {
        MigrationConfigBuilder::new()
    }

    /// Load a configuration file
    ///
    /// Relative `backup_dir` values are taken relative to the current
    /// directory, not the file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = error::read_file(path)?;
        let file: ConfigFile = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        file.into_builder()?.build_checked()
    }

    /// Artifact store rooted at `backup_dir`
    #[must_use]
    pub fn store(&self) -> ArtifactStore {
        ArtifactStore::new(&self.backup_dir).pretty(self.pretty_json)
    }

    /// Rule overrides configured for a kind, if any
    pub fn rules_for(&self, kind: EntityKind) -> Option<&ImportRules> {
        self.rule_overrides.get(&kind)
    }
}

/// On-disk form of [`MigrationConfig`]
///
/// ```toml
/// backup_dir = "/var/backups/zabbix"
/// timeout_secs = 60
///
/// [duplicates]
/// codes = [-32602]
/// patterns = ["already exists"]
///
/// [rules.hosts]
/// hosts = { createMissing = true, updateExisting = true }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub backup_dir: Option<PathBuf>,
    pub pretty_json: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub password_separator: Option<String>,
    pub duplicates: Option<DuplicatesSection>,
    pub rules: HashMap<EntityKind, ImportRules>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DuplicatesSection {
    #[serde(default = "default_codes")]
    pub codes: Vec<i64>,
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
}

fn default_codes() -> Vec<i64> {
    vec![DEFAULT_DUPLICATE_CODE]
}

fn default_patterns() -> Vec<String> {
    vec![DEFAULT_DUPLICATE_PATTERN.to_string()]
}

impl ConfigFile {
    fn into_builder(self) -> Result<MigrationConfigBuilder> {
        let mut builder = MigrationConfigBuilder::new();
        if let Some(dir) = self.backup_dir {
            builder = builder.backup_dir(dir);
        }
        if let Some(pretty) = self.pretty_json {
            builder = builder.pretty_json(pretty);
        }
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(separator) = self.password_separator {
            builder = builder.password_separator(separator);
        }
        if let Some(duplicates) = self.duplicates {
            builder = builder.duplicate_policy(DuplicatePolicy::new(
                duplicates.codes,
                &duplicates.patterns,
            )?);
        }
        for (kind, rules) in self.rules {
            builder = builder.rules(kind, rules);
        }
        Ok(builder)
    }
}

/// Builder for creating MigrationConfig with a fluent API
#[derive(Debug, Clone, Default)]
pub struct MigrationConfigBuilder {
    config: MigrationConfig,
}

impl MigrationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the artifact root
    ///
    /// Supports `~` expansion for home directory.
    #[must_use]
    pub fn backup_dir(mut self, path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        let expanded = match (path.strip_prefix("~"), dirs::home_dir()) {
            (Ok(rest), Some(home)) => home.join(rest),
            _ => path,
        };
        self.config.backup_dir = expanded;
        self
    }

    #[must_use]
    pub fn pretty_json(mut self, pretty: bool) -> Self {
        self.config.pretty_json = pretty;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    #[must_use]
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.config.duplicate_policy = policy;
        self
    }

    #[must_use]
    pub fn password_separator(mut self, separator: impl Into<String>) -> Self {
        self.config.password_separator = separator.into();
        self
    }

    /// Override import rules for one bulk kind
    #[must_use]
    pub fn rules(mut self, kind: EntityKind, rules: ImportRules) -> Self {
        self.config.rule_overrides.insert(kind, rules);
        self
    }

    /// Build the MigrationConfig
    pub fn build(self) -> MigrationConfig {
        self.config
    }

    /// Build, rejecting settings that cannot work
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero timeout or rule overrides on a
    /// kind that is not restored through `configuration.import`.
    pub fn build_checked(self) -> Result<MigrationConfig> {
        if self.config.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }
        for kind in self.config.rule_overrides.keys() {
            if !matches!(kind, EntityKind::Templates | EntityKind::Hosts | EntityKind::Maps) {
                return Err(Error::Config(format!(
                    "import rules only apply to templates, hosts and maps, not {kind}"
                )));
            }
        }
        Ok(self.config)
    }
}
