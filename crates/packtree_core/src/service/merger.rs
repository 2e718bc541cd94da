//! Subtree merge primitives.
//!
//! # Responsibility
//! - Fold one duplicate pack into its canonical survivor, bottom-up.
//! - Merge same-titled courses by relocating statements into the kept course.
//!
//! # Invariants
//! - Statements only move; none is created or deleted here.
//! - Moved statements keep their relative order and land after the kept
//!   course's highest `order`.
//! - A pack or course is deleted only once it is empty.
//! - A victim with a broken parent link or children at the wrong level is
//!   skipped and reported as an invariant violation.
//! - A failed write is recorded and the merge continues with the next entity.

use crate::logging::sanitize_message;
use crate::model::course::Course;
use crate::model::pack::{Pack, PackId, PackLevel};
use crate::repo::catalog_repo::{CatalogRepoError, CatalogRepository};
use crate::service::audit::parent_link_finding;
use crate::service::detector::group_duplicate_courses;
use crate::service::report::{EntityRef, IssueKind, ReconciliationReport};
use crate::service::selector::rank_canonical_course;
use log::{debug, warn};
use std::collections::HashMap;

const MAX_LOGGED_TITLE_CHARS: usize = 80;

/// Folds `victim` and its whole subtree into `survivor`.
///
/// Child packs whose title already exists under the survivor are merged
/// recursively; all others are reparented. Courses follow the same rule with
/// [`merge_course_pair`]. The emptied victim is deleted.
pub fn merge_pack_into<R: CatalogRepository>(
    repo: &R,
    survivor: &Pack,
    victim: &Pack,
    report: &mut ReconciliationReport,
) {
    if survivor.id == victim.id {
        return;
    }
    if survivor.level != victim.level {
        warn!(
            "event=merge_pack module=merger status=skip reason=invariant_violation survivor={} victim={}",
            survivor.id, victim.id
        );
        report.record(
            IssueKind::InvariantViolation,
            EntityRef::Pack(victim.id),
            format!(
                "pack {} (level {}) cannot fold into {} (level {})",
                victim.id, victim.level, survivor.id, survivor.level
            ),
        );
        return;
    }

    match victim_shape_violation(repo, victim) {
        Ok(None) => {}
        Ok(Some(message)) => {
            warn!(
                "event=merge_pack module=merger status=skip reason=invariant_violation survivor={} victim={}",
                survivor.id, victim.id
            );
            report.record(IssueKind::InvariantViolation, EntityRef::Pack(victim.id), message);
            return;
        }
        Err(err) => {
            record_failure(report, EntityRef::Pack(victim.id), "check pack links", &err);
            return;
        }
    }

    debug!(
        "event=merge_pack module=merger status=start survivor={} victim={} title={}",
        survivor.id,
        victim.id,
        sanitize_message(&victim.title, MAX_LOGGED_TITLE_CHARS)
    );

    merge_child_packs(repo, survivor, victim, report);
    relocate_courses(repo, survivor.id, victim.id, report);
    delete_emptied_pack(repo, victim, report);
}

/// Describes why `victim` cannot be folded safely, if it cannot.
///
/// The victim's parent link must be consistent and every child must sit
/// exactly one level below it.
fn victim_shape_violation<R: CatalogRepository>(
    repo: &R,
    victim: &Pack,
) -> Result<Option<String>, CatalogRepoError> {
    let parent_level = match victim.parent_id {
        Some(parent_id) => repo.get_pack(parent_id)?.map(|parent| parent.level),
        None => None,
    };
    if let Some(finding) = parent_link_finding(victim, parent_level) {
        return Ok(Some(format!(
            "pack {} has an inconsistent parent link ({finding:?}); skipped",
            victim.id
        )));
    }

    let child_level = victim.level.child();
    for level in PackLevel::ALL {
        if Some(level) == child_level {
            continue;
        }
        let stray = repo.list_child_packs(Some(victim.id), level)?;
        if let Some(child) = stray.first() {
            return Ok(Some(format!(
                "level-{} pack {} owns level-{level} child {}; skipped",
                victim.level, victim.id, child.id
            )));
        }
    }
    Ok(None)
}

fn merge_child_packs<R: CatalogRepository>(
    repo: &R,
    survivor: &Pack,
    victim: &Pack,
    report: &mut ReconciliationReport,
) {
    let Some(child_level) = victim.level.child() else {
        return;
    };
    let (survivor_children, victim_children) = match (
        repo.list_child_packs(Some(survivor.id), child_level),
        repo.list_child_packs(Some(victim.id), child_level),
    ) {
        (Ok(survivor_children), Ok(victim_children)) => (survivor_children, victim_children),
        (Err(err), _) | (_, Err(err)) => {
            record_failure(report, EntityRef::Pack(victim.id), "list child packs", &err);
            return;
        }
    };

    let mut by_title: HashMap<String, Pack> = HashMap::new();
    for child in survivor_children {
        by_title.entry(child.title.clone()).or_insert(child);
    }

    for child in victim_children {
        match by_title.get(&child.title) {
            Some(target) => {
                let target = target.clone();
                merge_pack_into(repo, &target, &child, report);
            }
            None => match repo.move_pack(child.id, survivor.id) {
                Ok(()) => {
                    report.packs_reparented += 1;
                    let mut moved = child;
                    moved.parent_id = Some(survivor.id);
                    by_title.insert(moved.title.clone(), moved);
                }
                Err(err) => {
                    record_failure(report, EntityRef::Pack(child.id), "reparent pack", &err)
                }
            },
        }
    }
}

/// Moves every course of `from_pack` into `into_pack`, merging title clashes.
pub fn relocate_courses<R: CatalogRepository>(
    repo: &R,
    into_pack: PackId,
    from_pack: PackId,
    report: &mut ReconciliationReport,
) {
    let (existing, incoming) = match (repo.list_courses(into_pack), repo.list_courses(from_pack))
    {
        (Ok(existing), Ok(incoming)) => (existing, incoming),
        (Err(err), _) | (_, Err(err)) => {
            record_failure(report, EntityRef::Pack(from_pack), "list courses", &err);
            return;
        }
    };

    let mut by_title: HashMap<String, Course> = HashMap::new();
    for course in existing {
        by_title.entry(course.title.clone()).or_insert(course);
    }

    for course in incoming {
        match by_title.get(&course.title) {
            Some(current) => {
                let current = current.clone();
                if let Some(kept) = merge_course_pair(repo, into_pack, &current, &course, report)
                {
                    by_title.insert(kept.title.clone(), kept);
                }
            }
            None => match repo.move_course(course.id, into_pack) {
                Ok(()) => {
                    report.courses_reparented += 1;
                    let mut moved = course;
                    moved.pack_id = into_pack;
                    by_title.insert(moved.title.clone(), moved);
                }
                Err(err) => {
                    record_failure(report, EntityRef::Course(course.id), "reparent course", &err)
                }
            },
        }
    }
}

/// Merges two same-titled courses so that one remains under `owner_pack`.
///
/// The course with more statements is kept; on a tie `existing` is kept.
/// Returns the kept course, or `None` when the merge could not start.
pub fn merge_course_pair<R: CatalogRepository>(
    repo: &R,
    owner_pack: PackId,
    existing: &Course,
    incoming: &Course,
    report: &mut ReconciliationReport,
) -> Option<Course> {
    let counts = match (
        repo.count_statements(existing.id),
        repo.count_statements(incoming.id),
    ) {
        (Ok(existing_count), Ok(incoming_count)) => [existing_count, incoming_count],
        (Err(err), _) | (_, Err(err)) => {
            record_failure(report, EntityRef::Course(incoming.id), "count statements", &err);
            return None;
        }
    };

    let (kept, folded) = if rank_canonical_course(&counts) == Some(1) {
        if let Err(err) = repo.move_course(incoming.id, owner_pack) {
            record_failure(report, EntityRef::Course(incoming.id), "reparent course", &err);
            return None;
        }
        let mut moved = incoming.clone();
        moved.pack_id = owner_pack;
        (moved, existing.clone())
    } else {
        (existing.clone(), incoming.clone())
    };

    fold_course_into(repo, &kept, &folded, report);
    Some(kept)
}

/// Appends every statement of `folded` to `kept` and deletes `folded`.
///
/// Returns whether `folded` was fully emptied and deleted.
pub fn fold_course_into<R: CatalogRepository>(
    repo: &R,
    kept: &Course,
    folded: &Course,
    report: &mut ReconciliationReport,
) -> bool {
    if kept.id == folded.id {
        return false;
    }
    let (kept_statements, moving) = match (
        repo.list_statements(kept.id),
        repo.list_statements(folded.id),
    ) {
        (Ok(kept_statements), Ok(moving)) => (kept_statements, moving),
        (Err(err), _) | (_, Err(err)) => {
            record_failure(report, EntityRef::Course(folded.id), "list statements", &err);
            return false;
        }
    };

    let mut next_order = kept_statements
        .iter()
        .map(|statement| statement.order)
        .max()
        .unwrap_or(0);
    let mut complete = true;
    for statement in moving {
        next_order += 1;
        match repo.move_statement(statement.id, kept.id, next_order) {
            Ok(()) => report.statements_relocated += 1,
            Err(err) => {
                complete = false;
                record_failure(
                    report,
                    EntityRef::Statement(statement.id),
                    "relocate statement",
                    &err,
                );
            }
        }
    }
    if !complete {
        return false;
    }

    match repo.delete_course(folded.id) {
        Ok(_) => {
            report.courses_merged += 1;
            debug!(
                "event=merge_course module=merger status=ok kept={} folded={}",
                kept.id, folded.id
            );
            true
        }
        Err(err) => {
            record_failure(report, EntityRef::Course(folded.id), "delete merged course", &err);
            false
        }
    }
}

/// Merges same-titled courses inside one pack.
pub fn dedupe_pack_courses<R: CatalogRepository>(
    repo: &R,
    pack_id: PackId,
    report: &mut ReconciliationReport,
) {
    let courses = match repo.list_courses(pack_id) {
        Ok(courses) => courses,
        Err(err) => {
            record_failure(report, EntityRef::Pack(pack_id), "list courses", &err);
            return;
        }
    };

    for group in group_duplicate_courses(courses) {
        fold_course_group(repo, &group, report);
    }
}

/// Folds every course of `group` into the one with the most statements.
pub fn fold_course_group<R: CatalogRepository>(
    repo: &R,
    group: &[Course],
    report: &mut ReconciliationReport,
) {
    let mut counts = Vec::with_capacity(group.len());
    for course in group {
        match repo.count_statements(course.id) {
            Ok(count) => counts.push(count),
            Err(err) => {
                record_failure(report, EntityRef::Course(course.id), "count statements", &err);
                return;
            }
        }
    }
    let Some(kept_index) = rank_canonical_course(&counts) else {
        return;
    };
    let kept = &group[kept_index];
    for (index, folded) in group.iter().enumerate() {
        if index != kept_index {
            fold_course_into(repo, kept, folded, report);
        }
    }
}

fn delete_emptied_pack<R: CatalogRepository>(
    repo: &R,
    victim: &Pack,
    report: &mut ReconciliationReport,
) {
    match repo.delete_pack(victim.id) {
        Ok(true) => report.packs_deleted += 1,
        Ok(false) => {}
        Err(CatalogRepoError::PackNotEmpty(pack_id)) => {
            warn!(
                "event=merge_pack module=merger status=skip reason=not_empty pack={pack_id}"
            );
            report.record(
                IssueKind::RelocationFailure,
                EntityRef::Pack(pack_id),
                "pack still owns content after merge; left in place",
            );
        }
        Err(err) => record_failure(report, EntityRef::Pack(victim.id), "delete merged pack", &err),
    }
}

pub(crate) fn record_failure(
    report: &mut ReconciliationReport,
    entity: EntityRef,
    action: &str,
    err: &CatalogRepoError,
) {
    warn!(
        "event=relocation module=merger status=error action=\"{}\" entity={:?} error={}",
        action, entity, err
    );
    report.record(
        IssueKind::RelocationFailure,
        entity,
        format!("{action} failed: {err}"),
    );
}
