//! Console output

use colored::Colorize;
use zbx_migrate::{ExportSummary, ImportSummary, KindOutcome, KindReport, RunReport};

pub fn kind_report(report: &KindReport) {
    println!("\n{} {}", "--->".blue(), report.kind.label().bold());
    match &report.outcome {
        KindOutcome::Exported(summary) => exported(summary),
        KindOutcome::Imported(summary) => imported(summary),
        KindOutcome::Failed(e) => println!("    {} {e}", "FAILED".red().bold()),
    }
}

fn exported(summary: &ExportSummary) {
    if let Some(images) = summary.images {
        println!(
            "    Added: {}  Updated: {}  Unchanged: {}  Files: {}",
            images.added.to_string().green(),
            images.updated.to_string().yellow(),
            images.unchanged,
            images.total_files
        );
    } else {
        println!("    Exported: {}", summary.exported.to_string().green());
    }
    for (group, count) in &summary.groups {
        println!("      {group}: {count}");
    }
    for failure in &summary.failures {
        println!("    {} {}: {}", "left out".red(), failure.label, failure.error);
    }
    for file in &summary.files {
        log::debug!("wrote {}", file.display());
    }
}

fn imported(summary: &ImportSummary) {
    for note in &summary.notes {
        println!("    {}", note.dimmed());
    }
    if summary.missing_artifact {
        return;
    }

    if summary.applied.is_empty() {
        println!(
            "    Created: {}  Skipped: {}  Failed: {}",
            summary.created.len().to_string().green(),
            summary.skipped.len().to_string().yellow(),
            summary.failures.len().to_string().red()
        );
    }
    for doc in &summary.applied {
        println!("    {} {} ({} objects)", "applied".green(), doc.label, doc.objects);
    }
    for failure in &summary.failures {
        println!("    {} {}: {}", "failed".red(), failure.label, failure.error);
    }
    if let Some(reason) = &summary.aborted {
        println!("    {} {reason}", "ABORTED".red().bold());
    }
}

/// Print generated passwords; this is the only place they are shown
pub fn passwords(report: &RunReport) {
    let passwords: Vec<_> = report.passwords().collect();
    if passwords.is_empty() {
        return;
    }

    println!("\n{}", "Passwords of created users (shown once):".yellow().bold());
    for entry in passwords {
        println!("    {:<24} {}", entry.login, entry.password);
    }
}

pub fn totals(report: &RunReport) {
    let failed = report.kinds.iter().filter(|k| !k.is_clean()).count();
    if failed == 0 {
        println!("\n{}", "Done".green().bold());
    } else {
        println!("\n{} ({failed} kind(s) with problems)", "Done".yellow().bold());
    }
}
