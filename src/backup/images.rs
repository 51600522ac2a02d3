//! Content-addressed image artifacts
//!
//! Every image is stored as `images/<slug>_md5<hash>.json`, where the hash is
//! taken over the exact file content. Re-exporting an unchanged image finds
//! its file already in place and writes nothing.

use super::operations::{fetch_records, strip_server_fields};
use super::restore::record_outcome;
use super::types::{ExportContext, ExportSummary, ImageCounts, ImportContext, ImportSummary, RecordFailure};
use crate::error::{self, Error, Result};
use crate::kinds::EntityDescriptor;
use crate::storage::parse_artifact;
use log::{debug, info, warn};
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

const FILE_PATTERN: &str = r"^(.+)_md5([0-9a-f]{32})\.json$";

/// An image file name split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImageFileName {
    pub slug: String,
    pub hash: String,
}

impl ImageFileName {
    /// Name for an image with the given name and serialized content
    pub fn for_content(name: &str, content: &str) -> Self {
        Self {
            slug: slug::slugify(name),
            hash: format!("{:x}", md5::compute(content.as_bytes())),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}_md5{}.json", self.slug, self.hash)
    }
}

fn file_pattern() -> Result<Regex> {
    Regex::new(FILE_PATTERN).map_err(|e| Error::Config(format!("Invalid image file pattern: {e}")))
}

fn parse_file_name(pattern: &Regex, path: &Path) -> Option<ImageFileName> {
    let name = path.file_name()?.to_str()?;
    let captures = pattern.captures(name)?;
    Some(ImageFileName {
        slug: captures[1].to_string(),
        hash: captures[2].to_string(),
    })
}

/// Export images, replacing files whose content changed
///
/// Every target file name is known before anything is deleted, so images
/// that share a slug never remove each other's current file. Each changed
/// image takes over one stale file of its slug.
pub(crate) fn export_images(
    ctx: &ExportContext<'_>,
    descriptor: &'static EntityDescriptor,
) -> Result<ExportSummary> {
    let pattern = file_pattern()?;
    let dir = descriptor.layout.path();
    let mut counts = ImageCounts::default();
    let mut files = Vec::new();

    let mut prepared = Vec::new();
    for mut record in fetch_records(ctx, descriptor)? {
        strip_server_fields(&mut record, descriptor);
        let name = record
            .get(descriptor.name_field)
            .and_then(Value::as_str)
            .unwrap_or("image")
            .to_string();

        // Compact and key-sorted, so the hash only changes with the data
        let content = serde_json::to_string(&record)?;
        let target = ImageFileName::for_content(&name, &content);
        prepared.push((name, content, target));
    }
    let current: HashSet<String> = prepared.iter().map(|(_, _, t)| t.file_name()).collect();

    let mut present = HashSet::new();
    let mut stale: HashMap<String, Vec<PathBuf>> = HashMap::new();
    for path in ctx.store.list_json(dir)? {
        let Some(parsed) = parse_file_name(&pattern, &path) else {
            continue;
        };
        let file_name = parsed.file_name();
        if current.contains(&file_name) {
            present.insert(file_name);
        } else {
            stale.entry(parsed.slug).or_default().push(path);
        }
    }

    let mut touched = HashSet::new();
    for (name, content, target) in prepared {
        let file_name = target.file_name();
        if present.contains(&file_name) {
            debug!("Image {name} unchanged");
            counts.unchanged += 1;
            continue;
        }

        let old = stale.get_mut(&target.slug).and_then(Vec::pop);
        if let Some(old) = &old {
            error::remove_file(old)?;
        }
        touched.insert(target.slug.clone());

        let path = ctx.store.write_raw(Path::new(dir).join(&file_name), &content)?;
        present.insert(file_name);
        if old.is_some() {
            debug!("Image {name} updated");
            counts.updated += 1;
        } else {
            debug!("Image {name} added");
            counts.added += 1;
        }
        files.push(path);
    }

    // Remaining old versions of rewritten slugs
    for slug in &touched {
        for path in stale.remove(slug).unwrap_or_default() {
            error::remove_file(&path)?;
        }
    }

    counts.total_files = ctx
        .store
        .list_json(dir)?
        .iter()
        .filter(|path| parse_file_name(&pattern, path).is_some())
        .count();

    info!(
        "✅ Images: {} added, {} updated, {} files in total",
        counts.added, counts.updated, counts.total_files
    );

    let mut summary = ExportSummary::new(descriptor.kind);
    summary.exported = counts.added + counts.updated + counts.unchanged;
    summary.files = files;
    summary.images = Some(counts);
    Ok(summary)
}

/// Create every image found under `images/`
pub(crate) fn restore_images(
    ctx: &ImportContext<'_>,
    descriptor: &'static EntityDescriptor,
) -> Result<ImportSummary> {
    let dir = descriptor.layout.path();
    let files = ctx.store.list_json(dir)?;
    if files.is_empty() {
        info!("No image artifacts, nothing to restore");
        return Ok(ImportSummary::missing(descriptor.kind, &ctx.store.path(dir)));
    }

    let mut summary = ImportSummary::new(descriptor.kind);
    for path in files {
        let file_label = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut record: Value = match error::read_file(&path).and_then(|c| parse_artifact(&path, &c)) {
            Ok(record) => record,
            Err(e) => {
                warn!("{e}");
                summary.failures.push(RecordFailure {
                    label: file_label,
                    error: e,
                });
                continue;
            }
        };

        let label = record
            .get(descriptor.name_field)
            .and_then(Value::as_str)
            .map_or(file_label, str::to_string);
        strip_server_fields(&mut record, descriptor);

        let result = ctx.client.create(descriptor.create_method, record).map(drop);
        if record_outcome(ctx, &mut summary, label, result).is_break() {
            break;
        }
    }

    info!(
        "✅ Images: {} created, {} skipped, {} failed",
        summary.created.len(),
        summary.skipped.len(),
        summary.failures.len()
    );
    Ok(summary)
}
