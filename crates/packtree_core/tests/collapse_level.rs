use packtree_core::db::open_db_in_memory;
use packtree_core::{
    CatalogRepository, Course, Pack, PackLevel, ReconcileError, ReconcileOptions, Reconciler,
    SqliteCatalogRepository, Statement,
};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn add_child(repo: &SqliteCatalogRepository<'_>, parent: &Pack, title: &str, order: i64) -> Pack {
    repo.insert_pack(&Pack::new_child(parent, title, order).unwrap())
        .unwrap()
}

fn add_course(repo: &SqliteCatalogRepository<'_>, pack: &Pack, title: &str, order: i64, words: i64) {
    let course = Course::new(pack.id, title, order);
    repo.insert_course(&course).unwrap();
    for index in 1..=words {
        repo.insert_statement(&Statement::new(course.id, index, format!("w{index}"), "词"))
            .unwrap();
    }
}

/// Builds 2 categories × 2 subcategories × 3 courses × 2 statements.
fn seed_three_level_tree(repo: &SqliteCatalogRepository<'_>) -> Pack {
    let root = repo.insert_pack(&Pack::new_root("1600分类单词", 10)).unwrap();
    for (category_index, category_title) in ["A", "B"].into_iter().enumerate() {
        let category = add_child(repo, &root, category_title, category_index as i64 + 1);
        for sub_index in 1..=2 {
            let sub_title = format!("{category_title}{sub_index}");
            let sub = add_child(repo, &category, &sub_title, sub_index);
            for course_index in 1..=3 {
                add_course(repo, &sub, &format!("{sub_title}-c{course_index}"), course_index, 2);
            }
        }
    }
    root
}

#[test]
fn collapse_moves_every_course_to_level_two() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let root = seed_three_level_tree(&repo);
    let before = repo.catalog_totals().unwrap();

    let reconciler = Reconciler::new(&repo);
    let report = reconciler
        .collapse_level(root.id, PackLevel::Subcategory)
        .unwrap();

    assert!(repo
        .list_packs_at_level(PackLevel::Subcategory)
        .unwrap()
        .is_empty());
    let categories = repo
        .list_child_packs(Some(root.id), PackLevel::Category)
        .unwrap();
    assert_eq!(categories.len(), 2);
    let mut total_courses = 0;
    for category in &categories {
        total_courses += repo.list_courses(category.id).unwrap().len();
    }
    assert_eq!(total_courses, 12);

    let after = repo.catalog_totals().unwrap();
    assert_eq!(after.statements, before.statements);
    assert_eq!(after.courses, before.courses);
    assert_eq!(after.packs, before.packs - 4);

    assert_eq!(report.packs_collapsed, 4);
    assert_eq!(report.courses_reparented, 12);
    assert!(report.is_clean(), "report not clean: {report:?}");
}

#[test]
fn collapse_merges_duplicate_categories_first() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let root = repo.insert_pack(&Pack::new_root("W", 1)).unwrap();
    let first = add_child(&repo, &root, "A", 1);
    let second = add_child(&repo, &root, "A", 2);
    let first_sub = add_child(&repo, &first, "a1", 1);
    let second_sub = add_child(&repo, &second, "a2", 1);
    add_course(&repo, &first_sub, "C", 1, 3);
    add_course(&repo, &second_sub, "C", 1, 4);

    let reconciler = Reconciler::with_options(
        &repo,
        ReconcileOptions {
            dedupe_courses: true,
            ..ReconcileOptions::default()
        },
    );
    let report = reconciler
        .collapse_level(root.id, PackLevel::Subcategory)
        .unwrap();

    let categories = repo
        .list_child_packs(Some(root.id), PackLevel::Category)
        .unwrap();
    assert_eq!(categories.len(), 1);
    let courses = repo.list_courses(categories[0].id).unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(repo.count_statements(courses[0].id).unwrap(), 7);

    assert_eq!(report.duplicate_sets_found, 1);
    assert_eq!(report.packs_collapsed, 2);
    assert_eq!(report.courses_merged, 1);
    assert!(report.is_clean());
}

#[test]
fn collapse_without_category_merge_keeps_duplicates_visible() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let root = repo.insert_pack(&Pack::new_root("W", 1)).unwrap();
    add_child(&repo, &root, "A", 1);
    add_child(&repo, &root, "A", 2);

    let reconciler = Reconciler::with_options(
        &repo,
        ReconcileOptions {
            merge_before_collapse: false,
            ..ReconcileOptions::default()
        },
    );
    let report = reconciler
        .collapse_level(root.id, PackLevel::Subcategory)
        .unwrap();
    assert_eq!(report.verification.unwrap().remaining_duplicate_sets, 1);
    assert!(!report.is_clean());
}

#[test]
fn collapse_of_missing_root_or_wrong_level_fails_before_writes() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let root = seed_three_level_tree(&repo);
    let before = repo.catalog_totals().unwrap();

    let reconciler = Reconciler::new(&repo);
    assert!(matches!(
        reconciler.collapse_level(uuid::Uuid::new_v4(), PackLevel::Subcategory),
        Err(ReconcileError::ScopeNotFound(_))
    ));
    assert!(matches!(
        reconciler.collapse_level(root.id, PackLevel::Category),
        Err(ReconcileError::InvalidScope(_))
    ));
    assert_eq!(repo.catalog_totals().unwrap(), before);
}
