//! Duplicate detection over pack sibling scopes.
//!
//! # Responsibility
//! - Resolve a detection scope to the packs it covers.
//! - Group packs by identity key and report groups with more than one member.
//!
//! # Invariants
//! - Titles are compared byte for byte; no trimming or case folding.
//! - Output order follows discovery order (`order ASC, id ASC`) so repeated
//!   runs over the same data produce the same sets.
//! - Detection never writes.

use crate::model::course::Course;
use crate::model::pack::{Pack, PackId, PackKey, PackLevel};
use crate::repo::catalog_repo::CatalogRepository;
use crate::service::reconciler::ReconcileError;
use serde::Serialize;
use std::collections::HashMap;

/// Which packs a detection pass looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionScope {
    /// Children of `parent_id` at `level`.
    Siblings { parent_id: PackId, level: PackLevel },
    /// Level-1 packs, optionally restricted to one title.
    Roots { title: Option<String> },
}

impl DetectionScope {
    /// Scope covering the direct children of `pack`, `None` for leaf packs.
    pub fn children_of(pack: &Pack) -> Option<Self> {
        pack.level.child().map(|level| Self::Siblings {
            parent_id: pack.id,
            level,
        })
    }

    /// Whether `pack` is one of the packs this scope compares.
    pub fn contains(&self, pack: &Pack) -> bool {
        match self {
            Self::Siblings { parent_id, level } => {
                pack.parent_id == Some(*parent_id) && pack.level == *level
            }
            Self::Roots { title } => {
                pack.level == PackLevel::Catalog
                    && title.as_deref().map_or(true, |title| pack.title == title)
            }
        }
    }
}

/// How a duplicate set was discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "label", rename_all = "snake_case")]
pub enum DuplicateOrigin {
    /// Members share one identity key.
    General,
    /// Members were named together in the exception table.
    Exception(String),
}

/// Group of packs that should become one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateSet {
    pub key: PackKey,
    pub origin: DuplicateOrigin,
    /// Members in discovery order; always two or more.
    pub members: Vec<Pack>,
}

impl DuplicateSet {
    pub fn member_ids(&self) -> Vec<PackId> {
        self.members.iter().map(|pack| pack.id).collect()
    }
}

/// Lists the packs covered by `scope` in discovery order.
///
/// # Errors
/// - `ScopeNotFound` when a sibling scope names a missing parent.
/// - `InvalidScope` when the parent is not one level above `level`.
pub fn scope_packs<R: CatalogRepository>(
    repo: &R,
    scope: &DetectionScope,
) -> Result<Vec<Pack>, ReconcileError> {
    match scope {
        DetectionScope::Siblings { parent_id, level } => {
            let parent = repo
                .get_pack(*parent_id)?
                .ok_or(ReconcileError::ScopeNotFound(*parent_id))?;
            if level.parent() != Some(parent.level) {
                return Err(ReconcileError::InvalidScope(format!(
                    "pack {} is level {}, cannot hold level-{} children",
                    parent.id, parent.level, level
                )));
            }
            Ok(repo.list_child_packs(Some(*parent_id), *level)?)
        }
        DetectionScope::Roots { title } => {
            let roots = repo.list_child_packs(None, PackLevel::Catalog)?;
            Ok(match title {
                Some(title) => roots
                    .into_iter()
                    .filter(|pack| &pack.title == title)
                    .collect(),
                None => roots,
            })
        }
    }
}

/// Detects duplicate sets inside one scope.
pub fn detect<R: CatalogRepository>(
    repo: &R,
    scope: &DetectionScope,
) -> Result<Vec<DuplicateSet>, ReconcileError> {
    let packs = scope_packs(repo, scope)?;
    Ok(group_duplicates(packs))
}

/// Groups packs by identity key, keeping groups with two or more members.
pub fn group_duplicates(packs: Vec<Pack>) -> Vec<DuplicateSet> {
    let mut index_by_key: HashMap<PackKey, usize> = HashMap::new();
    let mut groups: Vec<(PackKey, Vec<Pack>)> = Vec::new();
    for pack in packs {
        let key = pack.key();
        match index_by_key.get(&key) {
            Some(&index) => groups[index].1.push(pack),
            None => {
                index_by_key.insert(key.clone(), groups.len());
                groups.push((key, vec![pack]));
            }
        }
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(key, members)| DuplicateSet {
            key,
            origin: DuplicateOrigin::General,
            members,
        })
        .collect()
}

/// Groups courses of one pack by exact title, keeping groups of two or more.
pub fn group_duplicate_courses(courses: Vec<Course>) -> Vec<Vec<Course>> {
    let mut index_by_title: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<Course>> = Vec::new();
    for course in courses {
        match index_by_title.get(&course.title) {
            Some(&index) => groups[index].push(course),
            None => {
                index_by_title.insert(course.title.clone(), groups.len());
                groups.push(vec![course]);
            }
        }
    }
    groups.into_iter().filter(|group| group.len() > 1).collect()
}

#[cfg(test)]
mod tests {
    use super::{group_duplicate_courses, group_duplicates, DetectionScope, DuplicateOrigin};
    use crate::model::course::Course;
    use crate::model::pack::{Pack, PackLevel};

    #[test]
    fn scope_contains_only_its_own_packs() {
        let left = Pack::new_root("L", 1);
        let right = Pack::new_root("R", 2);
        let under_left = Pack::new_child(&left, "家庭", 1).unwrap();
        let under_right = Pack::new_child(&right, "家庭", 1).unwrap();

        let siblings = DetectionScope::Siblings {
            parent_id: left.id,
            level: PackLevel::Category,
        };
        assert!(siblings.contains(&under_left));
        assert!(!siblings.contains(&under_right));
        assert!(!siblings.contains(&left));

        let titled = DetectionScope::Roots {
            title: Some("L".to_string()),
        };
        assert!(titled.contains(&left));
        assert!(!titled.contains(&right));
        assert!(!titled.contains(&under_left));
        assert!(DetectionScope::Roots { title: None }.contains(&right));
    }

    #[test]
    fn groups_by_exact_title_in_discovery_order() {
        let root = Pack::new_root("W", 1);
        let a1 = Pack::new_child(&root, "A", 1).unwrap();
        let b = Pack::new_child(&root, "B", 2).unwrap();
        let a2 = Pack::new_child(&root, "A", 3).unwrap();
        let spaced = Pack::new_child(&root, "A ", 4).unwrap();

        let sets = group_duplicates(vec![a1.clone(), b, a2.clone(), spaced]);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].origin, DuplicateOrigin::General);
        assert_eq!(sets[0].member_ids(), vec![a1.id, a2.id]);
    }

    #[test]
    fn same_title_under_different_parents_is_not_a_duplicate() {
        let left = Pack::new_root("L", 1);
        let right = Pack::new_root("R", 2);
        let a = Pack::new_child(&left, "A", 1).unwrap();
        let b = Pack::new_child(&right, "A", 1).unwrap();
        assert!(group_duplicates(vec![a, b]).is_empty());
    }

    #[test]
    fn groups_duplicate_courses_by_title() {
        let pack_id = uuid::Uuid::new_v4();
        let groups = group_duplicate_courses(vec![
            Course::new(pack_id, "C", 1),
            Course::new(pack_id, "D", 2),
            Course::new(pack_id, "C", 3),
        ]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }
}
