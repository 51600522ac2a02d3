//! Running a selection of kinds for one action

use crate::api::ApiClient;
use crate::backup::{
    export_kind, restore_kind, ExportContext, ExportSummary, GeneratedPassword, ImportContext,
    ImportSummary, RestoreOptions,
};
use crate::config::MigrationConfig;
use crate::credentials::{BACKUP_SECTION, RESTORE_SECTION};
use crate::error::Error;
use crate::kinds::{EntityKind, Selection};
use log::{error, info, warn};
use std::fmt;

/// Direction of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Backup,
    Restore,
}

impl Action {
    /// Credentials section used for this action
    #[must_use]
    pub fn section(self) -> &'static str {
        match self {
            Action::Backup => BACKUP_SECTION,
            Action::Restore => RESTORE_SECTION,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Backup => "backup",
            Action::Restore => "restore",
        })
    }
}

/// What happened to one kind
#[derive(Debug)]
pub enum KindOutcome {
    Exported(ExportSummary),
    Imported(ImportSummary),
    /// The kind stopped as a whole; later kinds still ran
    Failed(Error),
}

/// Outcome of one kind in a run
#[derive(Debug)]
pub struct KindReport {
    pub kind: EntityKind,
    pub outcome: KindOutcome,
}

impl KindReport {
    /// Check if the kind finished without any failure
    #[must_use]
    pub fn is_clean(&self) -> bool {
        match &self.outcome {
            KindOutcome::Exported(s) => s.failures.is_empty(),
            KindOutcome::Imported(s) => s.failures.is_empty() && s.aborted.is_none(),
            KindOutcome::Failed(_) => false,
        }
    }
}

/// Results of a whole run, in the order the kinds ran
#[derive(Debug, Default)]
pub struct RunReport {
    pub kinds: Vec<KindReport>,
}

impl RunReport {
    /// Passwords generated for users created during this run
    pub fn passwords(&self) -> impl Iterator<Item = &GeneratedPassword> {
        self.kinds.iter().flat_map(|report| match &report.outcome {
            KindOutcome::Imported(summary) => summary.passwords.as_slice(),
            _ => &[],
        })
    }

    /// Check if every kind finished without any failure
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.kinds.iter().all(KindReport::is_clean)
    }
}

type KindCallback<'a> = Box<dyn FnMut(&KindReport) + 'a>;

/// Runs kinds one at a time in menu order
///
/// A failure in one kind never stops the next one.
pub struct Runner<'a> {
    client: &'a dyn ApiClient,
    config: &'a MigrationConfig,
    options: RestoreOptions,
    on_kind: Option<KindCallback<'a>>,
}

impl<'a> Runner<'a> {
    pub fn new(client: &'a dyn ApiClient, config: &'a MigrationConfig) -> Self {
        Self {
            client,
            config,
            options: RestoreOptions::default(),
            on_kind: None,
        }
    }

    /// Set restore options (host group subset)
    #[must_use]
    pub fn options(mut self, options: RestoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Call `callback` as soon as each kind is done
    #[must_use]
    pub fn on_kind(mut self, callback: impl FnMut(&KindReport) + 'a) -> Self {
        self.on_kind = Some(Box::new(callback));
        self
    }

    /// Run `action` for every kind in `selection`
    pub fn run(&mut self, action: Action, selection: &Selection) -> RunReport {
        info!(
            "Starting {action} of {} kind(s) against {} API {}",
            selection.kinds().len(),
            self.client.backend_name(),
            self.client.api_version()
        );

        if action == Action::Restore {
            for (kind, dep) in selection.unmet_dependencies() {
                warn!("{kind} refers to {dep}, which is not selected; it must already exist on the target");
            }
        }

        let store = self.config.store();
        let mut report = RunReport::default();

        for &kind in selection.kinds() {
            let outcome = match action {
                Action::Backup => {
                    let ctx = ExportContext {
                        client: self.client,
                        store: &store,
                        config: self.config,
                    };
                    export_kind(&ctx, kind).map(KindOutcome::Exported)
                }
                Action::Restore => {
                    let ctx = ImportContext {
                        client: self.client,
                        store: &store,
                        config: self.config,
                        options: &self.options,
                    };
                    restore_kind(&ctx, kind).map(KindOutcome::Imported)
                }
            }
            .unwrap_or_else(|e| {
                error!("{kind} {action} failed: {e}");
                KindOutcome::Failed(e)
            });

            let kind_report = KindReport { kind, outcome };
            if let Some(callback) = self.on_kind.as_mut() {
                callback(&kind_report);
            }
            report.kinds.push(kind_report);
        }

        report
    }
}
