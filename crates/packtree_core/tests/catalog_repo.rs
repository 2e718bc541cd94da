use packtree_core::db::open_db_in_memory;
use packtree_core::{
    CatalogRepoError, CatalogRepository, Course, Pack, PackLevel, SqliteCatalogRepository,
    Statement,
};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

#[test]
fn insert_and_read_back_pack_tree() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();

    let root = repo
        .insert_pack(&Pack::new_root("W", 10).with_description("root pack"))
        .unwrap();
    assert!(root.created_at > 0);
    assert_eq!(root.description, "root pack");
    assert!(root.is_free);
    assert_eq!(root.share_level, "public");

    let category = repo
        .insert_pack(&Pack::new_child(&root, "A", 1).unwrap())
        .unwrap();
    let loaded = repo.get_pack(category.id).unwrap().unwrap();
    assert_eq!(loaded.level, PackLevel::Category);
    assert_eq!(loaded.parent_id, Some(root.id));
    assert_eq!(loaded.creator_id, "system");
}

#[test]
fn child_listing_orders_by_sort_order_then_id() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let root = repo.insert_pack(&Pack::new_root("W", 1)).unwrap();

    let late = repo
        .insert_pack(&Pack::new_child(&root, "late", 5).unwrap())
        .unwrap();
    let tie_a = repo
        .insert_pack(&Pack::new_child(&root, "tie", 1).unwrap())
        .unwrap();
    let tie_b = repo
        .insert_pack(&Pack::new_child(&root, "tie", 1).unwrap())
        .unwrap();

    let children = repo
        .list_child_packs(Some(root.id), PackLevel::Category)
        .unwrap();
    let mut expected_ties = vec![tie_a.id, tie_b.id];
    expected_ties.sort();
    assert_eq!(children[0].id, expected_ties[0]);
    assert_eq!(children[1].id, expected_ties[1]);
    assert_eq!(children[2].id, late.id);
}

#[test]
fn insert_rejects_wrong_parent_level_and_root_courses() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let root = repo.insert_pack(&Pack::new_root("W", 1)).unwrap();
    let category = repo
        .insert_pack(&Pack::new_child(&root, "A", 1).unwrap())
        .unwrap();

    let mut skipping = Pack::new_child(&category, "a1", 1).unwrap();
    skipping.parent_id = Some(root.id);
    assert!(matches!(
        repo.insert_pack(&skipping),
        Err(CatalogRepoError::InvalidParent { .. })
    ));

    assert!(matches!(
        repo.insert_course(&Course::new(root.id, "C", 1)),
        Err(CatalogRepoError::CourseOwnerIsRoot(_))
    ));
    assert!(matches!(
        repo.insert_pack(&Pack::new_root(" ", 1)),
        Err(CatalogRepoError::Validation(_))
    ));
}

#[test]
fn moves_are_idempotent_and_validate_targets() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let root = repo.insert_pack(&Pack::new_root("W", 1)).unwrap();
    let a = repo
        .insert_pack(&Pack::new_child(&root, "A", 1).unwrap())
        .unwrap();
    let b = repo
        .insert_pack(&Pack::new_child(&root, "B", 2).unwrap())
        .unwrap();
    let a1 = repo
        .insert_pack(&Pack::new_child(&a, "a1", 1).unwrap())
        .unwrap();

    repo.move_pack(a1.id, a.id).unwrap();
    repo.move_pack(a1.id, b.id).unwrap();
    assert_eq!(repo.get_pack(a1.id).unwrap().unwrap().parent_id, Some(b.id));

    assert!(matches!(
        repo.move_pack(a1.id, root.id),
        Err(CatalogRepoError::InvalidParent { .. })
    ));
    assert!(matches!(
        repo.move_pack(uuid::Uuid::new_v4(), b.id),
        Err(CatalogRepoError::PackNotFound(_))
    ));

    let course = Course::new(a.id, "C", 1);
    repo.insert_course(&course).unwrap();
    repo.move_course(course.id, a.id).unwrap();
    repo.move_course(course.id, a1.id).unwrap();
    assert_eq!(repo.list_courses(a1.id).unwrap().len(), 1);
    assert!(matches!(
        repo.move_course(uuid::Uuid::new_v4(), a.id),
        Err(CatalogRepoError::CourseNotFound(_))
    ));
}

#[test]
fn statements_move_with_new_order_and_counts_follow() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let root = repo.insert_pack(&Pack::new_root("W", 1)).unwrap();
    let a = repo
        .insert_pack(&Pack::new_child(&root, "A", 1).unwrap())
        .unwrap();
    let left = Course::new(a.id, "L", 1);
    let right = Course::new(a.id, "R", 2);
    repo.insert_course(&left).unwrap();
    repo.insert_course(&right).unwrap();
    let statement = Statement::new(left.id, 1, "apple", "苹果").with_soundmark("/ˈæp.əl/");
    repo.insert_statement(&statement).unwrap();

    repo.move_statement(statement.id, right.id, 7).unwrap();
    assert_eq!(repo.count_statements(left.id).unwrap(), 0);
    let moved = repo.list_statements(right.id).unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].order, 7);
    assert_eq!(moved[0].soundmark, "/ˈæp.əl/");

    let totals = repo.catalog_totals().unwrap();
    assert_eq!(totals.packs, 2);
    assert_eq!(totals.courses, 2);
    assert_eq!(totals.statements, 1);
}

#[test]
fn delete_refuses_non_empty_rows_and_reports_missing_rows() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let root = repo.insert_pack(&Pack::new_root("W", 1)).unwrap();
    let a = repo
        .insert_pack(&Pack::new_child(&root, "A", 1).unwrap())
        .unwrap();
    let course = Course::new(a.id, "C", 1);
    repo.insert_course(&course).unwrap();
    repo.insert_statement(&Statement::new(course.id, 1, "a", "一"))
        .unwrap();

    assert!(matches!(
        repo.delete_pack(root.id),
        Err(CatalogRepoError::PackNotEmpty(_))
    ));
    assert!(matches!(
        repo.delete_pack(a.id),
        Err(CatalogRepoError::PackNotEmpty(_))
    ));
    assert!(matches!(
        repo.delete_course(course.id),
        Err(CatalogRepoError::CourseNotEmpty(_))
    ));
    assert!(!repo.delete_course(uuid::Uuid::new_v4()).unwrap());
    assert!(!repo.delete_pack(uuid::Uuid::new_v4()).unwrap());
}

#[test]
fn unit_rollback_discards_writes_and_commit_keeps_them() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let root = repo.insert_pack(&Pack::new_root("W", 1)).unwrap();

    repo.begin_unit().unwrap();
    repo.insert_pack(&Pack::new_child(&root, "discarded", 1).unwrap())
        .unwrap();
    repo.rollback_unit().unwrap();
    assert!(repo
        .list_child_packs(Some(root.id), PackLevel::Category)
        .unwrap()
        .is_empty());

    repo.begin_unit().unwrap();
    repo.insert_pack(&Pack::new_child(&root, "kept", 1).unwrap())
        .unwrap();
    repo.commit_unit().unwrap();
    let children = repo
        .list_child_packs(Some(root.id), PackLevel::Category)
        .unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].title, "kept");
}

#[test]
fn set_pack_cover_updates_only_cover() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let root = repo.insert_pack(&Pack::new_root("W", 1)).unwrap();

    repo.set_pack_cover(root.id, Some("https://cdn.example/w.png"))
        .unwrap();
    let loaded = repo.get_pack(root.id).unwrap().unwrap();
    assert_eq!(loaded.cover.as_deref(), Some("https://cdn.example/w.png"));
    assert_eq!(loaded.title, "W");

    repo.set_pack_cover(root.id, None).unwrap();
    assert_eq!(repo.get_pack(root.id).unwrap().unwrap().cover, None);
    assert!(matches!(
        repo.set_pack_cover(uuid::Uuid::new_v4(), None),
        Err(CatalogRepoError::PackNotFound(_))
    ));
}
