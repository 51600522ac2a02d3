//! Restore of record-list kinds

use super::operations::{label_of, login_field, login_of, strip_server_fields};
use super::types::{GeneratedPassword, ImportContext, ImportSummary, RecordFailure};
use crate::api::ServerVersion;
use crate::error::{Error, Result};
use crate::kinds::{EntityDescriptor, EntityKind};
use crate::reference::{resolve_to_ids, Resolver};
use crate::security::generate_password;
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::ops::ControlFlow;

/// Outcome of submitting one record
pub(crate) enum Submitted {
    Created,
    Skipped,
}

/// Book one record's outcome into the summary
///
/// Duplicates count as skips, per-record errors are reported, and a
/// transport failure breaks off the rest of the kind.
pub(crate) fn record_outcome(
    ctx: &ImportContext<'_>,
    summary: &mut ImportSummary,
    label: String,
    result: Result<()>,
) -> ControlFlow<(), Submitted> {
    match result.map_err(|e| ctx.config.duplicate_policy.classify(e)) {
        Ok(()) => {
            debug!("Created {label}");
            summary.created.push(label);
            ControlFlow::Continue(Submitted::Created)
        }
        Err(e) if e.is_duplicate() => {
            debug!("Skipping {label} (exists)");
            summary.skipped.push(label);
            ControlFlow::Continue(Submitted::Skipped)
        }
        Err(e) if e.is_transport() => {
            warn!("Aborting {} at {label}: {e}", summary.kind);
            summary.aborted = Some(e.to_string());
            summary.failures.push(RecordFailure { label, error: e });
            ControlFlow::Break(())
        }
        Err(e) => {
            warn!("Failed to restore {label}: {e}");
            summary.failures.push(RecordFailure { label, error: e });
            ControlFlow::Continue(Submitted::Skipped)
        }
    }
}

/// Read a record-list artifact
///
/// `Ok(Err(summary))` carries the summary to return when there is nothing
/// to replay (missing or malformed file).
fn read_records<T: serde::de::DeserializeOwned>(
    ctx: &ImportContext<'_>,
    descriptor: &EntityDescriptor,
) -> Result<std::result::Result<Vec<T>, ImportSummary>> {
    let relative = descriptor.layout.path();
    match ctx.store.read_json::<Vec<T>>(relative) {
        Ok(Some(records)) => Ok(Ok(records)),
        Ok(None) => {
            info!("No {} artifact, nothing to restore", descriptor.kind);
            Ok(Err(ImportSummary::missing(descriptor.kind, &ctx.store.path(relative))))
        }
        Err(e @ Error::MalformedArtifact { .. }) => {
            warn!("{e}");
            let mut summary = ImportSummary::new(descriptor.kind);
            summary.failures.push(RecordFailure {
                label: relative.to_string(),
                error: e,
            });
            Ok(Err(summary))
        }
        Err(e) => Err(e),
    }
}

/// Replay a record list through the kind's create method
pub(crate) fn restore_records(
    ctx: &ImportContext<'_>,
    descriptor: &'static EntityDescriptor,
) -> Result<ImportSummary> {
    let records = match read_records::<Value>(ctx, descriptor)? {
        Ok(records) => records,
        Err(summary) => return Ok(summary),
    };

    let mut summary = ImportSummary::new(descriptor.kind);
    let mut resolver = Resolver::new(ctx.client);

    for mut record in records {
        let label = label_of(&record, descriptor);
        // Older artifacts may still carry the source id
        strip_server_fields(&mut record, descriptor);
        if descriptor.kind == EntityKind::UserGroups {
            adapt_user_group(&mut record, ctx.client.api_version());
        }

        let result = resolve_to_ids(&mut record, descriptor.references, &mut resolver)
            .and_then(|()| ctx.client.create(descriptor.create_method, record).map(drop));
        if record_outcome(ctx, &mut summary, label, result).is_break() {
            break;
        }
    }

    info!(
        "✅ {}: {} created, {} skipped, {} failed",
        descriptor.kind,
        summary.created.len(),
        summary.skipped.len(),
        summary.failures.len()
    );
    Ok(summary)
}

/// Reshape exported group permissions for the target server version
///
/// 6.2 split `rights` into `hostgroup_rights` and `templategroup_rights`.
/// Older servers keep template groups among the host groups, so both lists
/// fold back into `rights` there.
fn adapt_user_group(record: &mut Value, version: ServerVersion) {
    let Some(obj) = record.as_object_mut() else {
        return;
    };

    if version.at_least(6, 2) {
        if let Some(rights) = obj.remove("rights") {
            obj.entry("hostgroup_rights").or_insert(rights);
        }
        return;
    }

    let mut rights: Vec<Value> = Vec::new();
    for key in ["rights", "hostgroup_rights", "templategroup_rights"] {
        if let Some(Value::Array(list)) = obj.remove(key) {
            rights.extend(list);
        }
    }
    if !rights.is_empty() {
        obj.insert("rights".into(), Value::Array(rights));
    }
}

/// Create host groups from a list of names
pub(crate) fn restore_host_groups(
    ctx: &ImportContext<'_>,
    descriptor: &'static EntityDescriptor,
) -> Result<ImportSummary> {
    let names = match read_records::<String>(ctx, descriptor)? {
        Ok(names) => names,
        Err(summary) => return Ok(summary),
    };

    let mut summary = ImportSummary::new(descriptor.kind);
    for name in names {
        let result = ctx
            .client
            .create(descriptor.create_method, json!({ descriptor.name_field: name }))
            .map(drop);
        if record_outcome(ctx, &mut summary, name, result).is_break() {
            break;
        }
    }

    info!(
        "✅ Host groups: {} created, {} skipped",
        summary.created.len(),
        summary.skipped.len()
    );
    Ok(summary)
}

/// Reshape an exported user for the target server version
fn adapt_user(record: &mut Value, ctx: &ImportContext<'_>) {
    let version = ctx.client.api_version();
    let Some(obj) = record.as_object_mut() else {
        return;
    };

    let target = login_field(version);
    let other = if target == "username" { "alias" } else { "username" };
    if let Some(login) = obj.remove(other) {
        obj.entry(target).or_insert(login);
    }

    // Roles appeared in 5.2
    if !version.at_least(5, 2) {
        obj.remove("roleid");
    }
}

/// Create users with fresh passwords
///
/// Users are processed in login order. Each created user gets a random
/// password, returned once in the summary and never logged.
pub(crate) fn restore_users(
    ctx: &ImportContext<'_>,
    descriptor: &'static EntityDescriptor,
) -> Result<ImportSummary> {
    let mut records = match read_records::<Value>(ctx, descriptor)? {
        Ok(records) => records,
        Err(summary) => return Ok(summary),
    };
    records.sort_by_key(login_of);

    let version = ctx.client.api_version();
    let mut summary = ImportSummary::new(descriptor.kind);
    let mut resolver = Resolver::new(ctx.client);
    let mut rng = rand::rng();

    for mut record in records {
        let login = login_of(&record);
        strip_server_fields(&mut record, descriptor);
        adapt_user(&mut record, ctx);

        let password = generate_password(&mut rng, &ctx.config.password_separator);
        let result = resolve_to_ids(&mut record, descriptor.references, &mut resolver).and_then(|()| {
            if let Some(obj) = record.as_object_mut() {
                // 5.2 renamed the create parameter
                if version.at_least(5, 2) {
                    if let Some(medias) = obj.remove("user_medias") {
                        obj.insert("medias".into(), medias);
                    }
                }
                obj.insert("passwd".into(), Value::String(password.clone()));
            }
            ctx.client.create(descriptor.create_method, record).map(drop)
        });

        match record_outcome(ctx, &mut summary, login.clone(), result) {
            ControlFlow::Continue(Submitted::Created) => {
                summary.passwords.push(GeneratedPassword { login, password });
            }
            ControlFlow::Continue(Submitted::Skipped) => {}
            ControlFlow::Break(()) => break,
        }
    }

    info!(
        "✅ Users: {} created, {} skipped, {} failed",
        summary.created.len(),
        summary.skipped.len(),
        summary.failures.len()
    );
    Ok(summary)
}
