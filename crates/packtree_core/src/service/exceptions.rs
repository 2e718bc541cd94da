//! Explicit reconciliation exceptions.
//!
//! # Responsibility
//! - Hold operator-curated groups of packs or courses that must be merged
//!   even though their titles differ (near-duplicates, variant characters).
//! - Resolve those groups against live rows before they are merged.
//!
//! # Invariants
//! - Members missing from the store are ignored; a group that resolves to
//!   fewer than two live members is a no-op.
//! - Pack members must share level and parent; course members must share
//!   their owning pack. Groups breaking this are skipped and reported.
//! - A scoped run only sees groups lying wholly inside its scope.

use crate::model::course::{Course, CourseId};
use crate::model::pack::{Pack, PackId};
use crate::repo::catalog_repo::{CatalogRepoResult, CatalogRepository};
use crate::service::detector::{DetectionScope, DuplicateOrigin, DuplicateSet};
use crate::service::report::{EntityRef, IssueKind, ReconcileIssue};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One named group of records that belong together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionGroup {
    pub label: String,
    pub ids: Vec<Uuid>,
}

impl ExceptionGroup {
    pub fn new(label: impl Into<String>, ids: Vec<Uuid>) -> Self {
        Self {
            label: label.into(),
            ids,
        }
    }
}

/// Auditable table of manual merges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionTable {
    #[serde(default, rename = "packs")]
    pub pack_groups: Vec<ExceptionGroup>,
    #[serde(default, rename = "courses")]
    pub course_groups: Vec<ExceptionGroup>,
}

/// Course exception group resolved against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseExceptionSet {
    pub label: String,
    pub pack_id: PackId,
    /// Live members in listed order.
    pub members: Vec<Course>,
}

impl ExceptionTable {
    pub fn is_empty(&self) -> bool {
        self.pack_groups.is_empty() && self.course_groups.is_empty()
    }

    /// Keeps the groups whose live members all sit inside `scope`.
    ///
    /// Course members count as inside when their owning pack is. Groups
    /// reaching outside `scope`, or with no live member, are dropped.
    pub fn scoped_to<R: CatalogRepository>(
        &self,
        repo: &R,
        scope: &DetectionScope,
    ) -> CatalogRepoResult<ExceptionTable> {
        let mut scoped = ExceptionTable::default();
        for group in &self.pack_groups {
            let members = live_packs(repo, &group.ids)?;
            if !members.is_empty() && members.iter().all(|pack| scope.contains(pack)) {
                scoped.pack_groups.push(group.clone());
            }
        }
        for group in &self.course_groups {
            let members = live_courses(repo, &group.ids)?;
            let mut inside = !members.is_empty();
            for course in &members {
                if !inside {
                    break;
                }
                inside = repo
                    .get_pack(course.pack_id)?
                    .is_some_and(|pack| scope.contains(&pack));
            }
            if inside {
                scoped.course_groups.push(group.clone());
            }
        }
        Ok(scoped)
    }

    /// Resolves pack groups to duplicate sets tagged with their label.
    pub fn resolve_pack_sets<R: CatalogRepository>(
        &self,
        repo: &R,
    ) -> CatalogRepoResult<(Vec<DuplicateSet>, Vec<ReconcileIssue>)> {
        let mut sets = Vec::new();
        let mut issues = Vec::new();
        for group in &self.pack_groups {
            let members = live_packs(repo, &group.ids)?;
            if members.len() < 2 {
                continue;
            }
            let first = &members[0];
            if let Some(stray) = members
                .iter()
                .find(|pack| pack.level != first.level || pack.parent_id != first.parent_id)
            {
                issues.push(ReconcileIssue {
                    kind: IssueKind::InvariantViolation,
                    entity: EntityRef::Pack(stray.id),
                    message: format!(
                        "exception group `{}` mixes parents or levels; skipped",
                        group.label
                    ),
                });
                continue;
            }
            sets.push(DuplicateSet {
                key: first.key(),
                origin: DuplicateOrigin::Exception(group.label.clone()),
                members,
            });
        }
        Ok((sets, issues))
    }

    /// Resolves course groups to same-pack course sets.
    pub fn resolve_course_sets<R: CatalogRepository>(
        &self,
        repo: &R,
    ) -> CatalogRepoResult<(Vec<CourseExceptionSet>, Vec<ReconcileIssue>)> {
        let mut sets = Vec::new();
        let mut issues = Vec::new();
        for group in &self.course_groups {
            let members = live_courses(repo, &group.ids)?;
            if members.len() < 2 {
                continue;
            }
            let pack_id = members[0].pack_id;
            if let Some(stray) = members.iter().find(|course| course.pack_id != pack_id) {
                issues.push(ReconcileIssue {
                    kind: IssueKind::InvariantViolation,
                    entity: EntityRef::Course(stray.id),
                    message: format!(
                        "exception group `{}` spans several packs; skipped",
                        group.label
                    ),
                });
                continue;
            }
            sets.push(CourseExceptionSet {
                label: group.label.clone(),
                pack_id,
                members,
            });
        }
        Ok((sets, issues))
    }
}

fn live_packs<R: CatalogRepository>(repo: &R, ids: &[PackId]) -> CatalogRepoResult<Vec<Pack>> {
    let mut packs: Vec<Pack> = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(pack) = repo.get_pack(*id)? {
            if !packs.iter().any(|seen| seen.id == pack.id) {
                packs.push(pack);
            }
        }
    }
    Ok(packs)
}

fn live_courses<R: CatalogRepository>(
    repo: &R,
    ids: &[CourseId],
) -> CatalogRepoResult<Vec<Course>> {
    let mut courses: Vec<Course> = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(course) = repo.get_course(*id)? {
            if !courses.iter().any(|seen| seen.id == course.id) {
                courses.push(course);
            }
        }
    }
    Ok(courses)
}

#[cfg(test)]
mod tests {
    use super::{ExceptionGroup, ExceptionTable};
    use crate::model::course::Course;
    use crate::model::pack::{Pack, PackLevel};
    use crate::repo::catalog_repo::CatalogRepository;
    use crate::repo::memory_repo::MemoryCatalogRepository;
    use crate::service::detector::{DetectionScope, DuplicateOrigin};
    use crate::service::report::IssueKind;

    #[test]
    fn resolves_near_duplicates_and_skips_mixed_parents() {
        let repo = MemoryCatalogRepository::new();
        let root = repo.insert_pack(&Pack::new_root("W", 1)).unwrap();
        let other_root = repo.insert_pack(&Pack::new_root("X", 2)).unwrap();
        let family = repo
            .insert_pack(&Pack::new_child(&root, "家庭", 1).unwrap())
            .unwrap();
        let variant = repo
            .insert_pack(&Pack::new_child(&root, "家庭成员", 2).unwrap())
            .unwrap();
        let elsewhere = repo
            .insert_pack(&Pack::new_child(&other_root, "家庭", 1).unwrap())
            .unwrap();

        let table = ExceptionTable {
            pack_groups: vec![
                ExceptionGroup::new("family", vec![family.id, variant.id, uuid::Uuid::new_v4()]),
                ExceptionGroup::new("cross-root", vec![family.id, elsewhere.id]),
            ],
            course_groups: Vec::new(),
        };

        let (sets, issues) = table.resolve_pack_sets(&repo).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].origin, DuplicateOrigin::Exception("family".to_string()));
        assert_eq!(sets[0].member_ids(), vec![family.id, variant.id]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::InvariantViolation);
    }

    #[test]
    fn scoping_drops_groups_outside_the_scope() {
        let repo = MemoryCatalogRepository::new();
        let left = repo.insert_pack(&Pack::new_root("L", 1)).unwrap();
        let right = repo.insert_pack(&Pack::new_root("R", 2)).unwrap();
        let left_family = repo
            .insert_pack(&Pack::new_child(&left, "家庭", 1).unwrap())
            .unwrap();
        let left_spaced = repo
            .insert_pack(&Pack::new_child(&left, "家 庭", 2).unwrap())
            .unwrap();
        let right_family = repo
            .insert_pack(&Pack::new_child(&right, "家庭", 1).unwrap())
            .unwrap();
        let right_spaced = repo
            .insert_pack(&Pack::new_child(&right, "家 庭", 2).unwrap())
            .unwrap();
        let course = Course::new(right_family.id, "C", 1);
        let course_variant = Course::new(right_family.id, "C ", 2);
        repo.insert_course(&course).unwrap();
        repo.insert_course(&course_variant).unwrap();

        let table = ExceptionTable {
            pack_groups: vec![
                ExceptionGroup::new("left", vec![left_family.id, left_spaced.id]),
                ExceptionGroup::new("right", vec![right_family.id, right_spaced.id]),
            ],
            course_groups: vec![ExceptionGroup::new(
                "right-courses",
                vec![course.id, course_variant.id],
            )],
        };
        let scope = DetectionScope::Siblings {
            parent_id: left.id,
            level: PackLevel::Category,
        };

        let scoped = table.scoped_to(&repo, &scope).unwrap();
        assert_eq!(scoped.pack_groups.len(), 1);
        assert_eq!(scoped.pack_groups[0].label, "left");
        assert!(scoped.course_groups.is_empty());

        let roots = table
            .scoped_to(&repo, &DetectionScope::Roots { title: None })
            .unwrap();
        assert!(roots.is_empty());
    }

    #[test]
    fn deserializes_from_toml_shape() {
        let json = r#"{"packs":[{"label":"a","ids":["6f1c2a8e-3f0b-4c1e-9d8a-1b2c3d4e5f60"]}]}"#;
        let table: ExceptionTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.pack_groups.len(), 1);
        assert!(table.course_groups.is_empty());
        assert!(!table.is_empty());
    }
}
