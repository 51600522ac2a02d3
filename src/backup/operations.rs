//! Export of record-list kinds

use super::types::{ExportContext, ExportSummary, RecordFailure};
use crate::api::ServerVersion;
use crate::error::Result;
use crate::kinds::{EntityDescriptor, EntityKind};
use crate::reference::{rebind_to_names, Resolver};
use log::{debug, info, warn};
use serde_json::{json, Value};

/// Field holding a user's login on a given server version
pub(crate) fn login_field(version: ServerVersion) -> &'static str {
    if version.at_least(5, 4) {
        "username"
    } else {
        "alias"
    }
}

/// A user's login, whichever field it is stored in
pub(crate) fn login_of(user: &Value) -> String {
    ["username", "alias"]
        .iter()
        .find_map(|field| user.get(*field).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

/// Name a record by its descriptor's name field
pub(crate) fn label_of(record: &Value, descriptor: &EntityDescriptor) -> String {
    match descriptor.kind {
        EntityKind::Users => login_of(record),
        _ => record
            .get(descriptor.name_field)
            .and_then(Value::as_str)
            .unwrap_or("<unnamed>")
            .to_string(),
    }
}

/// `get` parameters for a kind on a given server version
fn fetch_params(kind: EntityKind, version: ServerVersion) -> Value {
    match kind {
        EntityKind::Images => json!({ "output": "extend", "select_image": true }),
        EntityKind::GlobalMacros => json!({ "output": "extend", "globalmacro": true }),
        // Rights were split by group type in 6.2
        EntityKind::UserGroups if version.at_least(6, 2) => json!({
            "output": "extend",
            "selectHostGroupRights": "extend",
            "selectTemplateGroupRights": "extend",
        }),
        EntityKind::UserGroups => json!({ "output": "extend", "selectRights": "extend" }),
        EntityKind::MediaTypes => json!({ "output": "extend", "selectMessageTemplates": "extend" }),
        EntityKind::Users => json!({
            "output": "extend",
            "selectMedias": "extend",
            "selectUsrgrps": ["usrgrpid", "name"],
        }),
        _ => json!({ "output": "extend" }),
    }
}

/// Fetch every record of a kind
pub(crate) fn fetch_records(
    ctx: &ExportContext<'_>,
    descriptor: &EntityDescriptor,
) -> Result<Vec<Value>> {
    let params = fetch_params(descriptor.kind, ctx.client.api_version());
    let records = ctx.client.fetch(descriptor.collection, params)?;
    debug!("Fetched {} {} record(s)", records.len(), descriptor.collection);
    Ok(records)
}

/// Remove server-local fields and apply renames, in place
pub(crate) fn strip_server_fields(record: &mut Value, descriptor: &EntityDescriptor) {
    let Some(obj) = record.as_object_mut() else {
        return;
    };

    obj.remove(descriptor.id_field);
    for field in descriptor.strip {
        obj.remove(*field);
    }
    for (from, to) in descriptor.renames {
        if let Some(value) = obj.remove(*from) {
            obj.insert((*to).to_string(), value);
        }
    }
    for (list, fields) in descriptor.nested_strip {
        let Some(items) = obj.get_mut(*list).and_then(Value::as_array_mut) else {
            continue;
        };
        for item in items.iter_mut().filter_map(Value::as_object_mut) {
            for field in *fields {
                item.remove(*field);
            }
        }
    }
}

/// Export a kind stored as one JSON list of records
///
/// Records whose references point at something the server no longer has are
/// reported and left out; the rest of the kind is still written.
pub(crate) fn export_records(
    ctx: &ExportContext<'_>,
    descriptor: &'static EntityDescriptor,
) -> Result<ExportSummary> {
    let mut summary = ExportSummary::new(descriptor.kind);
    let mut resolver = Resolver::new(ctx.client);
    let mut records = Vec::new();

    for mut record in fetch_records(ctx, descriptor)? {
        let label = label_of(&record, descriptor);
        strip_server_fields(&mut record, descriptor);

        match rebind_to_names(&mut record, descriptor.references, &mut resolver) {
            Ok(()) => records.push(record),
            Err(e) if e.is_per_record() => {
                warn!("Leaving {label} out of {}: {e}", descriptor.kind);
                summary.failures.push(RecordFailure { label, error: e });
            }
            Err(e) => return Err(e),
        }
    }

    if descriptor.kind == EntityKind::Users {
        records.sort_by_key(login_of);
    }

    let path = ctx.store.write_json(descriptor.layout.path(), &records)?;
    info!("✅ Exported {} {} to {}", records.len(), descriptor.kind, path.display());

    summary.exported = records.len();
    summary.files.push(path);
    Ok(summary)
}

/// Export host groups as a list of names
pub(crate) fn export_host_groups(
    ctx: &ExportContext<'_>,
    descriptor: &'static EntityDescriptor,
) -> Result<ExportSummary> {
    let records = ctx.client.fetch(
        descriptor.collection,
        json!({ "output": [descriptor.id_field, descriptor.name_field] }),
    )?;
    let names: Vec<&str> = records
        .iter()
        .filter_map(|r| r.get(descriptor.name_field).and_then(Value::as_str))
        .collect();

    let path = ctx.store.write_json(descriptor.layout.path(), &names)?;
    info!("✅ Exported {} host group(s) to {}", names.len(), path.display());

    let mut summary = ExportSummary::new(descriptor.kind);
    summary.exported = names.len();
    summary.files.push(path);
    Ok(summary)
}
