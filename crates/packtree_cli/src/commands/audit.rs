use crate::config::Settings;
use crate::support::{open_catalog, print_json, ISSUE_SAMPLE_LIMIT};
use packtree_core::{audit_catalog, AuditFinding, SqliteCatalogRepository};

fn describe(finding: &AuditFinding) -> String {
    match finding {
        AuditFinding::OrphanedPack { pack_id, parent_id } => {
            format!("orphaned pack {pack_id}: parent {parent_id} is missing")
        }
        AuditFinding::MissingParent { pack_id, level } => {
            format!("level-{level} pack {pack_id} has no parent")
        }
        AuditFinding::RootWithParent { pack_id, parent_id } => {
            format!("level-1 pack {pack_id} points at parent {parent_id}")
        }
        AuditFinding::LevelMismatch {
            pack_id,
            level,
            parent_id,
            parent_level,
        } => format!(
            "level-{level} pack {pack_id} sits under level-{parent_level} pack {parent_id}"
        ),
        AuditFinding::DuplicateSiblings { key, pack_ids } => format!(
            "{} level-{} packs titled `{}` share one parent",
            pack_ids.len(),
            key.level,
            key.title
        ),
        AuditFinding::DuplicateCourses {
            pack_id,
            title,
            course_ids,
        } => format!(
            "{} courses titled `{title}` in pack {pack_id}",
            course_ids.len()
        ),
    }
}

pub fn run(settings: &Settings) -> Result<(), String> {
    let conn = open_catalog(&settings.db)?;
    let repo = SqliteCatalogRepository::try_new(&conn)
        .map_err(|err| format!("catalog not ready: {err}"))?;
    let report = audit_catalog(&repo).map_err(|err| format!("audit failed: {err}"))?;

    if settings.json {
        return print_json(&report);
    }

    println!("packtree audit {}", settings.db.display());
    println!(
        "  Totals: {} packs, {} courses, {} statements",
        report.totals.packs, report.totals.courses, report.totals.statements
    );
    for level in &report.levels {
        println!("  Level {}: {} packs", level.level, level.packs);
    }
    println!("  Findings: {}", report.findings.len());
    for finding in report.findings.iter().take(ISSUE_SAMPLE_LIMIT) {
        println!("    - {}", describe(finding));
    }
    if report.findings.len() > ISSUE_SAMPLE_LIMIT {
        println!(
            "    ... {} more",
            report.findings.len() - ISSUE_SAMPLE_LIMIT
        );
    }
    Ok(())
}
