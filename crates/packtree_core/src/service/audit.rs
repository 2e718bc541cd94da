//! Read-only catalog health audit.
//!
//! # Responsibility
//! - Scan every level and report structural problems without touching data.
//!
//! # Invariants
//! - Audit never writes.
//! - Findings are ordered by level, then by pack discovery order.

use crate::model::course::CourseId;
use crate::model::pack::{Pack, PackId, PackKey, PackLevel};
use crate::repo::catalog_repo::{CatalogRepoResult, CatalogRepository, CatalogTotals};
use crate::service::detector::{group_duplicate_courses, group_duplicates};
use serde::Serialize;
use std::collections::HashMap;

/// One structural problem found by the audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditFinding {
    /// Parent reference points at a missing pack.
    OrphanedPack { pack_id: PackId, parent_id: PackId },
    /// Level-2/3 pack without parent.
    MissingParent { pack_id: PackId, level: PackLevel },
    /// Level-1 pack carrying a parent reference.
    RootWithParent { pack_id: PackId, parent_id: PackId },
    /// Parent exists but is not exactly one level above.
    LevelMismatch {
        pack_id: PackId,
        level: PackLevel,
        parent_id: PackId,
        parent_level: PackLevel,
    },
    /// Siblings sharing one identity key.
    DuplicateSiblings { key: PackKey, pack_ids: Vec<PackId> },
    /// Courses of one pack sharing a title.
    DuplicateCourses {
        pack_id: PackId,
        title: String,
        course_ids: Vec<CourseId>,
    },
}

/// Pack count of one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelTotal {
    pub level: PackLevel,
    pub packs: u64,
}

/// Outcome of [`audit_catalog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub totals: CatalogTotals,
    pub levels: Vec<LevelTotal>,
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Checks the parent link of `pack`.
///
/// `parent_level` is the level of the pack `pack.parent_id` points at, or
/// `None` when that pack does not exist.
pub(crate) fn parent_link_finding(
    pack: &Pack,
    parent_level: Option<PackLevel>,
) -> Option<AuditFinding> {
    match (pack.level.parent(), pack.parent_id) {
        (None, Some(parent_id)) => Some(AuditFinding::RootWithParent {
            pack_id: pack.id,
            parent_id,
        }),
        (Some(_), None) => Some(AuditFinding::MissingParent {
            pack_id: pack.id,
            level: pack.level,
        }),
        (Some(expected), Some(parent_id)) => match parent_level {
            None => Some(AuditFinding::OrphanedPack {
                pack_id: pack.id,
                parent_id,
            }),
            Some(parent_level) if parent_level != expected => Some(AuditFinding::LevelMismatch {
                pack_id: pack.id,
                level: pack.level,
                parent_id,
                parent_level,
            }),
            Some(_) => None,
        },
        (None, None) => None,
    }
}

/// Scans the whole catalog for structural problems.
pub fn audit_catalog<R: CatalogRepository>(repo: &R) -> CatalogRepoResult<AuditReport> {
    let mut levels = Vec::with_capacity(PackLevel::ALL.len());
    let mut findings = Vec::new();
    let mut all_packs = HashMap::new();
    let mut packs_by_level = Vec::with_capacity(PackLevel::ALL.len());

    for level in PackLevel::ALL {
        let packs = repo.list_packs_at_level(level)?;
        levels.push(LevelTotal {
            level,
            packs: packs.len() as u64,
        });
        for pack in &packs {
            all_packs.insert(pack.id, pack.level);
        }
        packs_by_level.push(packs);
    }

    for packs in &packs_by_level {
        for pack in packs {
            let parent_level = pack
                .parent_id
                .and_then(|parent_id| all_packs.get(&parent_id).copied());
            if let Some(finding) = parent_link_finding(pack, parent_level) {
                findings.push(finding);
            }
        }

        for set in group_duplicates(packs.clone()) {
            let pack_ids = set.member_ids();
            findings.push(AuditFinding::DuplicateSiblings {
                key: set.key,
                pack_ids,
            });
        }

        for pack in packs.iter().filter(|pack| pack.level != PackLevel::Catalog) {
            for group in group_duplicate_courses(repo.list_courses(pack.id)?) {
                findings.push(AuditFinding::DuplicateCourses {
                    pack_id: pack.id,
                    title: group[0].title.clone(),
                    course_ids: group.iter().map(|course| course.id).collect(),
                });
            }
        }
    }

    Ok(AuditReport {
        totals: repo.catalog_totals()?,
        levels,
        findings,
    })
}
