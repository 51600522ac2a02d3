//! Run configuration
//!
//! This module contains the explicit configuration passed into every
//! operation:
//! - `MigrationConfig` - backup root, timeouts, rule overrides, formatting
//! - `DuplicatePolicy` - which server errors mean "already exists"

mod duplicates;
mod types;

pub use duplicates::DuplicatePolicy;
pub use types::{default_config_path, ConfigFile, MigrationConfig, MigrationConfigBuilder};
