//! # zbx-migrate
//!
//! Back up the configuration of a Zabbix server to plain JSON files and
//! restore it into the same or another server through the JSON-RPC API.
//!
//! ## Features
//!
//! - **Ten kinds**: images, global macros, host groups, templates, hosts,
//!   maps, user groups, global scripts, media types and users
//! - **Portable artifacts**: server-assigned ids are stripped and every
//!   cross-reference is stored by name, so a backup can be restored into a
//!   server that numbers things differently
//! - **Idempotent restore**: objects that already exist are skipped, so a
//!   restore can be re-run after a partial failure
//! - **Content-addressed images**: unchanged images are not rewritten
//! - **Version aware**: login fields, user rights and import rules follow the
//!   API version of the connected server
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zbx_migrate::{Action, JsonRpcClient, MigrationConfig, Runner, Selection};
//!
//! # fn example() -> zbx_migrate::Result<()> {
//! let config = MigrationConfig::builder()
//!     .backup_dir("~/zabbix-backup")
//!     .build();
//!
//! let mut client = JsonRpcClient::connect("http://zabbix.example.com", config.timeout)?;
//! client.login("Admin", "zabbix")?;
//!
//! let report = Runner::new(&client, &config).run(Action::Backup, &Selection::all());
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing without a server
//!
//! [`MemoryServer`] implements [`ApiClient`] in memory:
//!
//! ```rust
//! use zbx_migrate::{Action, ApiClient, EntityKind, MemoryServer, MigrationConfig, Runner, Selection};
//! use serde_json::json;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = MigrationConfig::builder().backup_dir(dir.path()).build();
//!
//! let source = MemoryServer::new();
//! source.insert("hostgroup", json!({"name": "Linux servers"}));
//! let selection = Selection::of(&[EntityKind::HostGroups]);
//! Runner::new(&source, &config).run(Action::Backup, &selection);
//!
//! let target = MemoryServer::new();
//! Runner::new(&target, &config).run(Action::Restore, &selection);
//! assert!(target.find("hostgroup", "Linux servers").is_some());
//! ```

pub mod api;
pub mod backup;
pub mod config;
pub mod credentials;
mod error;
pub mod kinds;
pub mod reference;
pub mod rules;
mod runner;
pub mod security;
pub mod storage;

pub use api::{ApiClient, InjectedFailure, JsonRpcClient, MemoryServer, ServerVersion};
pub use backup::{
    export_kind, restore_kind, ExportContext, ExportSummary, GeneratedPassword, ImportContext,
    ImportSummary, RecordFailure, RestoreOptions,
};
pub use config::{default_config_path, DuplicatePolicy, MigrationConfig, MigrationConfigBuilder};
pub use credentials::{CredentialStore, Credentials, FileStore, MemoryStore};
#[cfg(feature = "keychain")]
pub use credentials::KeychainStore;
pub use error::{Error, Result};
pub use kinds::{EntityKind, Selection};
pub use rules::{ImportRules, RuleFlags};
pub use runner::{Action, KindOutcome, KindReport, RunReport, Runner};
pub use storage::ArtifactStore;
