//! Level collapse: fold level-3 packs into their level-2 parents.
//!
//! # Responsibility
//! - Reassign every course of a level-3 pack to its level-2 parent.
//! - Delete the emptied level-3 packs.
//!
//! # Invariants
//! - Courses keep their `order`; statements are not touched.
//! - A level-3 pack is deleted only when nothing is left under it.

use crate::model::pack::{Pack, PackLevel};
use crate::repo::catalog_repo::{CatalogRepoError, CatalogRepository};
use crate::service::merger::record_failure;
use crate::service::report::{EntityRef, IssueKind, ReconciliationReport};
use log::{debug, warn};

/// Collapses every level-3 pack under `root` into its level-2 parent.
pub fn collapse_subcategories<R: CatalogRepository>(
    repo: &R,
    root: &Pack,
    report: &mut ReconciliationReport,
) {
    let categories = match repo.list_child_packs(Some(root.id), PackLevel::Category) {
        Ok(categories) => categories,
        Err(err) => {
            record_failure(report, EntityRef::Pack(root.id), "list categories", &err);
            return;
        }
    };

    for category in &categories {
        collapse_category(repo, category, report);
    }
}

fn collapse_category<R: CatalogRepository>(
    repo: &R,
    category: &Pack,
    report: &mut ReconciliationReport,
) {
    let subcategories = match repo.list_child_packs(Some(category.id), PackLevel::Subcategory) {
        Ok(subcategories) => subcategories,
        Err(err) => {
            record_failure(report, EntityRef::Pack(category.id), "list subcategories", &err);
            return;
        }
    };

    for subcategory in subcategories {
        let courses = match repo.list_courses(subcategory.id) {
            Ok(courses) => courses,
            Err(err) => {
                record_failure(report, EntityRef::Pack(subcategory.id), "list courses", &err);
                continue;
            }
        };
        for course in courses {
            match repo.move_course(course.id, category.id) {
                Ok(()) => report.courses_reparented += 1,
                Err(err) => {
                    record_failure(report, EntityRef::Course(course.id), "lift course", &err)
                }
            }
        }

        match repo.delete_pack(subcategory.id) {
            Ok(true) => {
                report.packs_collapsed += 1;
                debug!(
                    "event=collapse_pack module=collapser status=ok pack={} into={}",
                    subcategory.id, category.id
                );
            }
            Ok(false) => {}
            Err(CatalogRepoError::PackNotEmpty(pack_id)) => {
                warn!(
                    "event=collapse_pack module=collapser status=skip reason=not_empty pack={pack_id}"
                );
                report.record(
                    IssueKind::RelocationFailure,
                    EntityRef::Pack(pack_id),
                    "level-3 pack still owns courses; left in place",
                );
            }
            Err(err) => record_failure(
                report,
                EntityRef::Pack(subcategory.id),
                "delete collapsed pack",
                &err,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::collapse_subcategories;
    use crate::model::course::Course;
    use crate::model::pack::{Pack, PackLevel};
    use crate::repo::catalog_repo::CatalogRepository;
    use crate::repo::memory_repo::MemoryCatalogRepository;
    use crate::service::report::{IssueKind, ReconciliationReport};

    #[test]
    fn failed_lift_leaves_subcategory_in_place() {
        let repo = MemoryCatalogRepository::new();
        let root = repo.insert_pack(&Pack::new_root("W", 1)).unwrap();
        let category = repo
            .insert_pack(&Pack::new_child(&root, "A", 1).unwrap())
            .unwrap();
        let sub = repo
            .insert_pack(&Pack::new_child(&category, "a1", 1).unwrap())
            .unwrap();
        let stuck = Course::new(sub.id, "stuck", 1);
        let free = Course::new(sub.id, "free", 2);
        repo.insert_course(&stuck).unwrap();
        repo.insert_course(&free).unwrap();
        repo.fail_writes_for(stuck.id);

        let mut report = ReconciliationReport::new();
        collapse_subcategories(&repo, &root, &mut report);

        assert_eq!(report.courses_reparented, 1);
        assert_eq!(report.packs_collapsed, 0);
        assert_eq!(report.issue_count(IssueKind::RelocationFailure), 2);
        assert_eq!(
            repo.list_packs_at_level(PackLevel::Subcategory).unwrap().len(),
            1
        );
    }
}
