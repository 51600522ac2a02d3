//! Kinds exchanged as configuration documents (templates, hosts, maps)

use super::types::{
    AppliedDocument, ExportContext, ExportSummary, ImportContext, ImportSummary, RecordFailure,
};
use crate::api::scalar_to_string;
use crate::error::{self, Result};
use crate::kinds::{EntityDescriptor, EntityKind};
use crate::rules::ImportRules;
use crate::storage::parse_artifact;
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Section of `zabbix_export` holding a kind's objects
fn section_of(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Templates => "templates",
        EntityKind::Hosts => "hosts",
        _ => "maps",
    }
}

/// Ids of the records a `get` returns
fn ids_of(records: &[Value], id_field: &str) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.get(id_field).and_then(scalar_to_string))
        .collect()
}

/// Parse an exported document and drop what changes on every export
///
/// The export timestamp is removed; keys come out sorted when the document is
/// written back, so an unchanged server yields an identical file.
fn normalize(raw: &str, kind: EntityKind) -> Result<Value> {
    let mut document: Value = serde_json::from_str(raw)?;

    if let Some(export) = document.get_mut("zabbix_export").and_then(Value::as_object_mut) {
        export.remove("date");
    }

    // Trigger ids on map links are local to the source server
    if kind == EntityKind::Maps {
        let maps = document
            .pointer_mut("/zabbix_export/maps")
            .and_then(Value::as_array_mut);
        for map in maps.into_iter().flatten() {
            let links = map.get_mut("links").and_then(Value::as_array_mut);
            for link in links.into_iter().flatten().filter_map(Value::as_object_mut) {
                link.insert("linktriggers".into(), json!([]));
            }
        }
    }

    Ok(document)
}

/// Objects in a document's main section
fn object_count(document: &Value, kind: EntityKind) -> usize {
    document["zabbix_export"][section_of(kind)]
        .as_array()
        .map_or(0, Vec::len)
}

/// Export every object of a kind into one document
fn export_document(
    ctx: &ExportContext<'_>,
    descriptor: &EntityDescriptor,
    ids: Vec<String>,
    relative: &Path,
) -> Result<(PathBuf, usize)> {
    let kind = descriptor.kind;
    let raw = ctx
        .client
        .export_configuration(json!({ section_of(kind): ids }))?;
    let document = normalize(&raw, kind)?;
    let count = object_count(&document, kind);
    let path = ctx.store.write_json(relative, &document)?;
    Ok((path, count))
}

/// Export all templates into `templates.json`
pub(crate) fn export_templates(
    ctx: &ExportContext<'_>,
    descriptor: &'static EntityDescriptor,
) -> Result<ExportSummary> {
    export_whole_kind(ctx, descriptor)
}

/// Export all maps into `maps.json`, link triggers cleared
pub(crate) fn export_maps(
    ctx: &ExportContext<'_>,
    descriptor: &'static EntityDescriptor,
) -> Result<ExportSummary> {
    export_whole_kind(ctx, descriptor)
}

fn export_whole_kind(
    ctx: &ExportContext<'_>,
    descriptor: &'static EntityDescriptor,
) -> Result<ExportSummary> {
    let mut summary = ExportSummary::new(descriptor.kind);
    let records = ctx
        .client
        .fetch(descriptor.collection, json!({ "output": [descriptor.id_field] }))?;
    let ids = ids_of(&records, descriptor.id_field);

    if ids.is_empty() {
        info!("No {} on the server, nothing exported", descriptor.kind);
        return Ok(summary);
    }

    let (path, count) = export_document(ctx, descriptor, ids, Path::new(descriptor.layout.path()))?;
    info!("✅ Exported {count} {} to {}", descriptor.kind, path.display());

    summary.exported = count;
    summary.files.push(path);
    Ok(summary)
}

/// Export hosts into one document per host group
///
/// Groups without hosts are skipped. A host in several groups appears in
/// each of their documents.
pub(crate) fn export_hosts(
    ctx: &ExportContext<'_>,
    descriptor: &'static EntityDescriptor,
) -> Result<ExportSummary> {
    let mut summary = ExportSummary::new(descriptor.kind);
    let groups = ctx
        .client
        .fetch("hostgroup", json!({ "output": ["groupid", "name"] }))?;

    for group in &groups {
        let (Some(group_id), Some(name)) = (
            group.get("groupid").and_then(scalar_to_string),
            group.get("name").and_then(Value::as_str),
        ) else {
            continue;
        };

        let hosts = ctx.client.fetch(
            descriptor.collection,
            json!({ "output": [descriptor.id_field], "groupids": [group_id] }),
        )?;
        let ids = ids_of(&hosts, descriptor.id_field);
        if ids.is_empty() {
            debug!("Host group {name} has no hosts, skipping");
            continue;
        }

        let relative = Path::new(descriptor.layout.path()).join(format!("{}.json", slug::slugify(name)));
        let (path, count) = export_document(ctx, descriptor, ids, &relative)?;
        debug!("Exported {count} host(s) of {name}");

        summary.exported += count;
        summary.groups.push((name.to_string(), count));
        summary.files.push(path);
    }

    info!(
        "✅ Exported {} host(s) from {} group(s)",
        summary.exported,
        summary.groups.len()
    );
    Ok(summary)
}

/// Import rules for a kind on the connected server, overrides applied
fn rules_for(ctx: &ImportContext<'_>, kind: EntityKind) -> ImportRules {
    let defaults = ImportRules::defaults(kind, ctx.client.api_version()).unwrap_or_default();
    match ctx.config.rules_for(kind) {
        Some(overrides) => defaults.merged(overrides),
        None => defaults,
    }
}

/// Apply one document file, booking the outcome
///
/// Returns `false` if the kind must stop.
fn apply_file(
    ctx: &ImportContext<'_>,
    summary: &mut ImportSummary,
    rules: &ImportRules,
    path: &Path,
) -> bool {
    let label = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let parsed = error::read_file(path).and_then(|raw| {
        let document: Value = parse_artifact(path, &raw)?;
        Ok((raw, document))
    });
    let (raw, document) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("{e}");
            summary.failures.push(RecordFailure { label, error: e });
            return true;
        }
    };

    let objects = object_count(&document, summary.kind);
    match ctx.client.apply_configuration(rules, &raw) {
        Ok(()) => {
            debug!("Applied {label} ({objects} object(s))");
            summary.applied.push(AppliedDocument { label, objects });
            true
        }
        Err(e) if e.is_transport() => {
            warn!("Aborting {} at {label}: {e}", summary.kind);
            summary.aborted = Some(e.to_string());
            summary.failures.push(RecordFailure { label, error: e });
            false
        }
        Err(e) => {
            warn!("Failed to apply {label}: {e}");
            summary.failures.push(RecordFailure { label, error: e });
            true
        }
    }
}

/// Apply a single-document kind (templates, maps)
pub(crate) fn restore_document(
    ctx: &ImportContext<'_>,
    descriptor: &'static EntityDescriptor,
) -> Result<ImportSummary> {
    let path = ctx.store.path(descriptor.layout.path());
    if !path.is_file() {
        info!("No {} artifact, nothing to restore", descriptor.kind);
        return Ok(ImportSummary::missing(descriptor.kind, &path));
    }

    let mut summary = ImportSummary::new(descriptor.kind);
    let rules = rules_for(ctx, descriptor.kind);
    apply_file(ctx, &mut summary, &rules, &path);

    if let Some(doc) = summary.applied.first() {
        info!("✅ Applied {} {}", doc.objects, descriptor.kind);
    }
    Ok(summary)
}

/// Apply the per-group host documents, optionally only some groups
///
/// Requested group names are matched by slug, so `"Linux servers"` selects
/// `hosts/linux-servers.json`.
pub(crate) fn restore_hosts(
    ctx: &ImportContext<'_>,
    descriptor: &'static EntityDescriptor,
) -> Result<ImportSummary> {
    let dir = descriptor.layout.path();
    let files = ctx.store.list_json(dir)?;
    if files.is_empty() {
        info!("No host artifacts, nothing to restore");
        return Ok(ImportSummary::missing(descriptor.kind, &ctx.store.path(dir)));
    }

    let wanted: HashSet<String> = ctx
        .options
        .host_groups
        .iter()
        .map(slug::slugify)
        .collect();

    let mut summary = ImportSummary::new(descriptor.kind);
    let mut found = HashSet::new();
    let rules = rules_for(ctx, descriptor.kind);

    for path in files {
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            continue;
        };
        if !wanted.is_empty() && !wanted.contains(&stem) {
            continue;
        }
        found.insert(stem);

        if !apply_file(ctx, &mut summary, &rules, &path) {
            break;
        }
    }

    for group in &ctx.options.host_groups {
        if !found.contains(&slug::slugify(group)) {
            warn!("No exported hosts for group {group}");
            summary.notes.push(format!("No exported hosts for group '{group}'"));
        }
    }

    let objects: usize = summary.applied.iter().map(|d| d.objects).sum();
    info!("✅ Applied {objects} host(s) from {} file(s)", summary.applied.len());
    Ok(summary)
}
