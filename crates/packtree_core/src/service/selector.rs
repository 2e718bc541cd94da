//! Canonical survivor selection.
//!
//! # Responsibility
//! - Rank duplicate packs and pick the one every other member folds into.
//! - Pick the course that survives a same-title course merge.
//!
//! # Invariants
//! - Pack priority: has child packs, then most statements in the subtree,
//!   then lowest `order`, then earliest discovery.
//! - Course priority: most statements, then earliest discovery.
//! - Ranking is pure; only profiling touches the repository.

use crate::model::pack::{Pack, PackId};
use crate::repo::catalog_repo::{CatalogRepoResult, CatalogRepository};
use serde::Serialize;
use std::cmp::Reverse;

/// Ranking inputs gathered for one duplicate candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackProfile {
    pub pack_id: PackId,
    pub order: i64,
    pub has_children: bool,
    pub statement_total: u64,
    /// Position in detection output.
    pub discovery_index: usize,
}

/// Returns the index of the canonical profile, `None` for empty input.
pub fn rank_canonical(profiles: &[PackProfile]) -> Option<usize> {
    profiles
        .iter()
        .enumerate()
        .min_by_key(|(_, profile)| {
            (
                Reverse(profile.has_children),
                Reverse(profile.statement_total),
                profile.order,
                profile.discovery_index,
            )
        })
        .map(|(index, _)| index)
}

/// Returns the index of the course that survives, given statement counts in
/// discovery order.
pub fn rank_canonical_course(statement_counts: &[u64]) -> Option<usize> {
    statement_counts
        .iter()
        .enumerate()
        .min_by_key(|(index, count)| (Reverse(**count), *index))
        .map(|(index, _)| index)
}

/// Builds the ranking profile of one pack.
pub fn profile_pack<R: CatalogRepository>(
    repo: &R,
    pack: &Pack,
    discovery_index: usize,
) -> CatalogRepoResult<PackProfile> {
    let has_children = match pack.level.child() {
        Some(child_level) => !repo
            .list_child_packs(Some(pack.id), child_level)?
            .is_empty(),
        None => false,
    };
    Ok(PackProfile {
        pack_id: pack.id,
        order: pack.order,
        has_children,
        statement_total: subtree_statement_count(repo, pack)?,
        discovery_index,
    })
}

/// Profiles `members` and returns the index of the survivor.
pub fn select_canonical<R: CatalogRepository>(
    repo: &R,
    members: &[Pack],
) -> CatalogRepoResult<Option<usize>> {
    let profiles = members
        .iter()
        .enumerate()
        .map(|(index, pack)| profile_pack(repo, pack, index))
        .collect::<CatalogRepoResult<Vec<_>>>()?;
    Ok(rank_canonical(&profiles))
}

/// Counts statements in every course under `pack`, descendants included.
pub fn subtree_statement_count<R: CatalogRepository>(
    repo: &R,
    pack: &Pack,
) -> CatalogRepoResult<u64> {
    let mut total = 0;
    for course in repo.list_courses(pack.id)? {
        total += repo.count_statements(course.id)?;
    }
    if let Some(child_level) = pack.level.child() {
        for child in repo.list_child_packs(Some(pack.id), child_level)? {
            total += subtree_statement_count(repo, &child)?;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::{rank_canonical, rank_canonical_course, PackProfile};
    use uuid::Uuid;

    fn profile(order: i64, has_children: bool, statements: u64, index: usize) -> PackProfile {
        PackProfile {
            pack_id: Uuid::new_v4(),
            order,
            has_children,
            statement_total: statements,
            discovery_index: index,
        }
    }

    #[test]
    fn children_outrank_statement_count() {
        let profiles = [profile(1, false, 100, 0), profile(2, true, 1, 1)];
        assert_eq!(rank_canonical(&profiles), Some(1));
    }

    #[test]
    fn statements_then_order_then_discovery() {
        let by_statements = [profile(1, true, 3, 0), profile(2, true, 9, 1)];
        assert_eq!(rank_canonical(&by_statements), Some(1));

        let by_order = [profile(5, true, 9, 0), profile(2, true, 9, 1)];
        assert_eq!(rank_canonical(&by_order), Some(1));

        let by_discovery = [profile(2, false, 0, 0), profile(2, false, 0, 1)];
        assert_eq!(rank_canonical(&by_discovery), Some(0));
        assert_eq!(rank_canonical(&[]), None);
    }

    #[test]
    fn course_with_more_statements_wins_and_ties_keep_first() {
        assert_eq!(rank_canonical_course(&[5, 8]), Some(1));
        assert_eq!(rank_canonical_course(&[4, 4, 2]), Some(0));
        assert_eq!(rank_canonical_course(&[]), None);
    }
}
