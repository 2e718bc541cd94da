use packtree_core::db::open_db_in_memory;
use packtree_core::{
    audit_catalog, AuditFinding, CatalogQueryService, CatalogRepository, Course, Pack, PackLevel,
    QueryError, SqliteCatalogRepository, Statement,
};
use rusqlite::{params, Connection};
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn insert_raw_pack(conn: &Connection, id: Uuid, title: &str, level: i64, parent_id: Option<Uuid>) {
    conn.execute(
        "INSERT INTO course_packs (id, sort_order, title, level, parent_id)
         VALUES (?1, 1, ?2, ?3, ?4);",
        params![
            id.to_string(),
            title,
            level,
            parent_id.map(|value| value.to_string())
        ],
    )
    .unwrap();
}

#[test]
fn audit_finds_orphans_and_level_mismatches() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let root = repo.insert_pack(&Pack::new_root("W", 1)).unwrap();

    let orphan = Uuid::new_v4();
    let missing_parent = Uuid::new_v4();
    conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
    insert_raw_pack(&conn, orphan, "lost", 2, Some(missing_parent));
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();

    let skipped = Uuid::new_v4();
    insert_raw_pack(&conn, skipped, "skipped", 3, Some(root.id));

    let report = audit_catalog(&repo).unwrap();
    assert!(!report.is_clean());
    assert!(report.findings.contains(&AuditFinding::OrphanedPack {
        pack_id: orphan,
        parent_id: missing_parent,
    }));
    assert!(report.findings.contains(&AuditFinding::LevelMismatch {
        pack_id: skipped,
        level: PackLevel::Subcategory,
        parent_id: root.id,
        parent_level: PackLevel::Catalog,
    }));
    assert_eq!(report.totals.packs, 3);
    assert_eq!(report.levels.iter().map(|level| level.packs).sum::<u64>(), 3);
}

#[test]
fn audit_reports_duplicates_without_changing_anything() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let root = repo.insert_pack(&Pack::new_root("W", 1)).unwrap();
    let first = repo
        .insert_pack(&Pack::new_child(&root, "A", 1).unwrap())
        .unwrap();
    repo.insert_pack(&Pack::new_child(&root, "A", 2).unwrap())
        .unwrap();
    repo.insert_course(&Course::new(first.id, "C", 1)).unwrap();
    repo.insert_course(&Course::new(first.id, "C", 2)).unwrap();
    let before = repo.catalog_totals().unwrap();

    let report = audit_catalog(&repo).unwrap();

    assert_eq!(
        report
            .findings
            .iter()
            .filter(|finding| matches!(finding, AuditFinding::DuplicateSiblings { .. }))
            .count(),
        1
    );
    assert!(report.findings.iter().any(|finding| matches!(
        finding,
        AuditFinding::DuplicateCourses { pack_id, course_ids, .. }
            if *pack_id == first.id && course_ids.len() == 2
    )));
    assert_eq!(repo.catalog_totals().unwrap(), before);
}

struct Catalog {
    root: Pack,
    category: Pack,
    courses: Vec<Course>,
}

fn seed_catalog(repo: &SqliteCatalogRepository<'_>) -> Catalog {
    let root = repo.insert_pack(&Pack::new_root("1600分类单词", 10)).unwrap();
    let category = repo
        .insert_pack(&Pack::new_child(&root, "身体", 1).unwrap())
        .unwrap();
    let sub = repo
        .insert_pack(&Pack::new_child(&category, "头部", 1).unwrap())
        .unwrap();
    repo.insert_course(&Course::new(sub.id, "头部词汇练习", 1))
        .unwrap();

    let mut courses = Vec::new();
    for (order, title) in [(2, "second"), (1, "first"), (3, "third")] {
        let course = Course::new(category.id, title, order);
        repo.insert_course(&course).unwrap();
        courses.push(course);
    }
    courses.sort_by_key(|course| course.order);
    for (index, english) in ["eye", "ear"].into_iter().enumerate() {
        repo.insert_statement(&Statement::new(
            courses[0].id,
            index as i64 + 1,
            english,
            "词",
        ))
        .unwrap();
    }
    Catalog {
        root,
        category,
        courses,
    }
}

#[test]
fn hierarchy_nests_levels_with_course_counts() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let catalog = seed_catalog(&repo);
    let query = CatalogQueryService::new(&repo);

    let tree = query.hierarchy(None).unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].pack.id, catalog.root.id);
    assert_eq!(tree[0].course_count, 0);
    let category = &tree[0].children[0];
    assert_eq!(category.pack.title, "身体");
    assert_eq!(category.course_count, 3);
    assert_eq!(category.children.len(), 1);
    assert_eq!(category.children[0].course_count, 1);
    assert!(category.children[0].children.is_empty());

    let rooted = query.hierarchy(Some(catalog.root.id)).unwrap();
    assert_eq!(rooted, tree);
    assert!(matches!(
        query.hierarchy(Some(Uuid::new_v4())),
        Err(QueryError::PackNotFound(_))
    ));

    assert_eq!(query.list_roots().unwrap().len(), 1);
    assert_eq!(query.children(catalog.root.id).unwrap().len(), 1);
}

#[test]
fn pack_and_course_lookups_follow_display_order() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let catalog = seed_catalog(&repo);
    let query = CatalogQueryService::new(&repo);

    let pack = query.pack_with_courses(catalog.category.id).unwrap();
    let titles: Vec<&str> = pack
        .courses
        .iter()
        .map(|summary| summary.course.title.as_str())
        .collect();
    assert_eq!(titles, vec!["first", "second", "third"]);
    assert_eq!(pack.courses[0].statement_count, 2);

    let first = &catalog.courses[0];
    let detail = query
        .course_with_statements(catalog.category.id, first.id)
        .unwrap();
    assert_eq!(detail.statements.len(), 2);
    assert_eq!(detail.statements[0].english, "eye");

    let next = query
        .next_course(catalog.category.id, first.id)
        .unwrap()
        .unwrap();
    assert_eq!(next.title, "second");
    let last = &catalog.courses[2];
    assert!(query
        .next_course(catalog.category.id, last.id)
        .unwrap()
        .is_none());
}

#[test]
fn course_lookup_rejects_foreign_pack() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let catalog = seed_catalog(&repo);
    let query = CatalogQueryService::new(&repo);
    let course = &catalog.courses[0];

    assert!(matches!(
        query.course_with_statements(catalog.root.id, course.id),
        Err(QueryError::CourseNotInPack { .. })
    ));
    assert!(matches!(
        query.next_course(catalog.category.id, Uuid::new_v4()),
        Err(QueryError::CourseNotFound(_))
    ));
    assert!(matches!(
        query.pack_with_courses(Uuid::new_v4()),
        Err(QueryError::PackNotFound(_))
    ));
}
