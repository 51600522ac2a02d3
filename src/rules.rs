//! Rule sets for `configuration.import`
//!
//! The server decides per object class what to do with an imported document
//! (create what is missing, update what exists, delete what is gone). The
//! rules are data: each bulk kind gets defaults that depend on the target
//! server version, and the configuration file can override any class.

use crate::api::ServerVersion;
use crate::error::{Error, Result};
use crate::kinds::EntityKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Flags for one object class in an import rule set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFlags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_missing: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_existing: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_missing: Option<bool>,
}

impl RuleFlags {
    /// Create missing objects only
    pub const fn create() -> Self {
        Self {
            create_missing: Some(true),
            update_existing: None,
            delete_missing: None,
        }
    }

    /// Create missing objects, leave existing ones alone
    pub const fn create_keep() -> Self {
        Self {
            create_missing: Some(true),
            update_existing: Some(false),
            delete_missing: None,
        }
    }

    /// Create missing objects and update existing ones
    pub const fn create_update() -> Self {
        Self {
            create_missing: Some(true),
            update_existing: Some(true),
            delete_missing: None,
        }
    }

    /// Create, update and delete objects no longer in the document
    pub const fn sync() -> Self {
        Self {
            create_missing: Some(true),
            update_existing: Some(true),
            delete_missing: Some(true),
        }
    }
}

/// A complete rule set keyed by object class (`templates`, `items`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportRules(BTreeMap<String, RuleFlags>);

impl ImportRules {
    /// Empty rule set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flags for one object class
    #[must_use]
    pub fn rule(mut self, class: impl Into<String>, flags: RuleFlags) -> Self {
        self.0.insert(class.into(), flags);
        self
    }

    /// Flags for one object class
    pub fn get(&self, class: &str) -> Option<&RuleFlags> {
        self.0.get(class)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Default rules for a bulk kind on a given target version
    ///
    /// Returns `None` for kinds that are not restored through
    /// `configuration.import`.
    #[must_use]
    pub fn defaults(kind: EntityKind, version: ServerVersion) -> Option<Self> {
        let rules = match kind {
            EntityKind::Templates => {
                Self::object_rules(version).rule("templates", RuleFlags::create_keep())
            }
            EntityKind::Hosts => Self::object_rules(version).rule("hosts", RuleFlags::create_keep()),
            EntityKind::Maps => Self::new()
                .rule("images", RuleFlags::create_update())
                .rule("maps", RuleFlags::create_update()),
            _ => return None,
        };
        Some(rules)
    }

    /// Rules shared by template and host documents
    ///
    /// Group classes are created on demand so a document never references a
    /// group the target lacks. 6.2 split them into host and template groups.
    fn object_rules(version: ServerVersion) -> Self {
        let mut rules = if version.at_least(6, 2) {
            Self::new()
                .rule("host_groups", RuleFlags::create())
                .rule("template_groups", RuleFlags::create())
        } else {
            Self::new().rule("groups", RuleFlags::create())
        };
        rules = rules
            .rule("valueMaps", RuleFlags::create_keep())
            .rule("httptests", RuleFlags::create_update())
            .rule("graphs", RuleFlags::create_update())
            .rule("triggers", RuleFlags::create_update())
            .rule("discoveryRules", RuleFlags::create_update())
            .rule("items", RuleFlags::sync())
            .rule("templateLinkage", RuleFlags::create());

        // 5.4 dropped applications and replaced template screens with dashboards
        if version.at_least(5, 4) {
            rules = rules.rule("templateDashboards", RuleFlags::create_update());
        } else {
            rules = rules
                .rule("applications", RuleFlags::create())
                .rule("templateScreens", RuleFlags::create_update());
        }
        rules
    }

    /// Overlay `overrides` on top of these rules, class by class
    #[must_use]
    pub fn merged(mut self, overrides: &ImportRules) -> Self {
        for (class, flags) in &overrides.0 {
            self.0.insert(class.clone(), *flags);
        }
        self
    }

    /// Parse a rule set from JSON such as `{"maps": {"createMissing": true}}`
    ///
    /// # Errors
    ///
    /// Fails if the value is not an object of rule flags.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::Config(format!("Invalid import rules: {e}")))
    }

    /// JSON form sent to the server
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
