//! Export and restore of configuration kinds
//!
//! Every kind is exported by one [`ExportFn`] and restored by one
//! [`ImportFn`], bound to it through [`EntityKind`]. Exporters strip
//! server-assigned ids and turn cross-references into names; importers turn
//! the names back into the target server's ids and create what is missing.

pub(crate) mod documents;
pub(crate) mod images;
pub(crate) mod operations;
pub(crate) mod restore;
mod types;

pub use types::{
    AppliedDocument, ExportContext, ExportSummary, GeneratedPassword, ImageCounts, ImportContext,
    ImportSummary, RecordFailure, RestoreOptions,
};

use crate::error::Result;
use crate::kinds::{EntityDescriptor, EntityKind};
use log::info;

/// Export operation for one kind
pub type ExportFn = fn(&ExportContext<'_>, &'static EntityDescriptor) -> Result<ExportSummary>;

/// Restore operation for one kind
pub type ImportFn = fn(&ImportContext<'_>, &'static EntityDescriptor) -> Result<ImportSummary>;

/// Export one kind into the artifact tree
///
/// # Errors
///
/// Returns the error that stopped the kind as a whole (transport failure,
/// unwritable artifact). Per-record problems are in the summary.
pub fn export_kind(ctx: &ExportContext<'_>, kind: EntityKind) -> Result<ExportSummary> {
    info!("📦 Exporting {kind}");
    (kind.exporter())(ctx, kind.descriptor())
}

/// Restore one kind from the artifact tree
///
/// # Errors
///
/// Returns the error that stopped the kind before any record was submitted.
/// Per-record problems and mid-kind transport failures are in the summary.
pub fn restore_kind(ctx: &ImportContext<'_>, kind: EntityKind) -> Result<ImportSummary> {
    info!("📥 Restoring {kind}");
    (kind.importer())(ctx, kind.descriptor())
}
