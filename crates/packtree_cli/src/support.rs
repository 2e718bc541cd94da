use packtree_core::{open_db, IssueKind, ReconciliationReport};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

pub const ISSUE_SAMPLE_LIMIT: usize = 25;

pub fn open_catalog(path: &Path) -> Result<Connection, String> {
    open_db(path).map_err(|err| format!("failed to open catalog {}: {err}", path.display()))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    serde_json::from_str(&text).map_err(|err| format!("invalid JSON in {}: {err}", path.display()))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| format!("failed to render JSON output: {err}"))?;
    println!("{text}");
    Ok(())
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn issue_kind_label(kind: IssueKind) -> &'static str {
    match kind {
        IssueKind::InvariantViolation => "invariant",
        IssueKind::RelocationFailure => "relocation",
        IssueKind::RolledBack => "rolled-back",
    }
}

/// Prints a reconciliation report as indented text.
pub fn print_reconcile_report(title: &str, report: &ReconciliationReport) {
    println!("{title}");
    println!("  Duplicate sets: {}", report.duplicate_sets_found);
    println!("  Exception sets: {}", report.exception_sets_found);
    println!("  Packs deleted: {}", report.packs_deleted);
    println!("  Packs reparented: {}", report.packs_reparented);
    println!("  Courses reparented: {}", report.courses_reparented);
    println!("  Courses merged: {}", report.courses_merged);
    println!("  Statements relocated: {}", report.statements_relocated);
    println!("  Packs collapsed: {}", report.packs_collapsed);

    match &report.verification {
        Some(verification) => {
            println!(
                "  Statements: {} -> {} (conserved: {})",
                verification.totals_before.statements,
                verification.totals_after.statements,
                yes_no(verification.statements_conserved)
            );
            println!(
                "  Remaining duplicate sets: {}",
                verification.remaining_duplicate_sets
            );
        }
        None => println!("  Verification: unavailable"),
    }

    println!("  Issues: {}", report.issues.len());
    for issue in report.issues.iter().take(ISSUE_SAMPLE_LIMIT) {
        println!(
            "    - [{}] {:?}: {}",
            issue_kind_label(issue.kind),
            issue.entity,
            issue.message
        );
    }
    if report.issues.len() > ISSUE_SAMPLE_LIMIT {
        println!(
            "    ... {} more",
            report.issues.len() - ISSUE_SAMPLE_LIMIT
        );
    }
    println!("  Result: {}", if report.is_clean() { "clean" } else { "needs attention" });
}

/// Prints `report` as JSON or text depending on `json`.
pub fn emit_reconcile_report(
    title: &str,
    report: &ReconciliationReport,
    json: bool,
) -> Result<(), String> {
    if json {
        print_json(report)
    } else {
        print_reconcile_report(title, report);
        Ok(())
    }
}
