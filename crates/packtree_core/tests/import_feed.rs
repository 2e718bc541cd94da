use packtree_core::db::open_db_in_memory;
use packtree_core::{
    CatalogRepository, EnrichmentError, ImportError, ImportOptions, ImportService,
    NoPhoneticLookup, Pack, PackLevel, PhoneticEnricher, PhoneticLookup,
    SqliteCatalogRepository, VocabularyRecord,
};
use rusqlite::Connection;
use std::cell::Cell;
use std::time::Duration;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn word(category: &str, subcategory: &str, english: &str) -> VocabularyRecord {
    VocabularyRecord {
        category: category.to_string(),
        subcategory: subcategory.to_string(),
        english: english.to_string(),
        chinese: format!("{english}-zh"),
        phonetic: None,
    }
}

fn sample_feed() -> Vec<VocabularyRecord> {
    vec![
        word("A", "a1", "apple"),
        word("A", "a1", "apricot"),
        word("A", "a2", "ant"),
        word("B", "b1", "bear"),
        VocabularyRecord {
            phonetic: Some("/bɔːl/".to_string()),
            ..word("B", "b1", "ball")
        },
    ]
}

struct CountingLookup {
    calls: Cell<u32>,
}

impl PhoneticLookup for CountingLookup {
    fn lookup(&self, word: &str) -> Result<String, EnrichmentError> {
        self.calls.set(self.calls.get() + 1);
        if word.starts_with('a') {
            Ok(format!("/{word}/"))
        } else {
            Err(EnrichmentError::Unavailable("rate limited".to_string()))
        }
    }
}

fn service<'a, L: PhoneticLookup>(
    repo: &'a SqliteCatalogRepository<'a>,
    lookup: L,
) -> ImportService<&'a SqliteCatalogRepository<'a>, L> {
    ImportService::new(
        repo,
        PhoneticEnricher::with_delay(lookup, Duration::ZERO),
        ImportOptions::default(),
    )
}

#[test]
fn import_builds_three_level_tree_with_one_course_per_subcategory() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let feed = sample_feed();

    let report = service(&repo, NoPhoneticLookup).import(&feed).unwrap();

    let roots = repo.list_packs_at_level(PackLevel::Catalog).unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].title, "1600分类单词");
    assert_eq!(roots[0].order, 10);
    assert!(roots[0].is_free);
    assert_eq!(roots[0].share_level, "public");
    assert_eq!(roots[0].creator_id, "system");
    assert_eq!(repo.list_packs_at_level(PackLevel::Category).unwrap().len(), 2);
    let subcategories = repo.list_packs_at_level(PackLevel::Subcategory).unwrap();
    assert_eq!(subcategories.len(), 3);

    let totals = repo.catalog_totals().unwrap();
    assert_eq!(totals.courses, 3);
    assert_eq!(totals.statements, feed.len() as u64);

    let a1 = subcategories
        .iter()
        .find(|pack| pack.title == "a1")
        .unwrap();
    let courses = repo.list_courses(a1.id).unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0].title, "a1词汇练习");
    let statements = repo.list_statements(courses[0].id).unwrap();
    assert_eq!(statements[0].english, "apple");
    assert_eq!(statements[0].order, 1);
    assert_eq!(statements[1].english, "apricot");
    assert_eq!(statements[1].order, 2);

    assert!(report.root_created);
    assert_eq!(report.packs_created, 6);
    assert_eq!(report.courses_created, 3);
    assert_eq!(report.statements_created, 5);
    assert_eq!(report.phonetic_lookups, 4);
    assert_eq!(report.phonetic_misses, 4);
}

#[test]
fn reimport_reuses_packs_and_skips_existing_courses() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let feed = sample_feed();
    service(&repo, NoPhoneticLookup).import(&feed).unwrap();
    let totals = repo.catalog_totals().unwrap();

    let second = service(&repo, NoPhoneticLookup).import(&feed).unwrap();
    assert_eq!(repo.catalog_totals().unwrap(), totals);
    assert!(!second.root_created);
    assert_eq!(second.packs_created, 0);
    assert_eq!(second.packs_reused, 5);
    assert_eq!(second.courses_created, 0);
    assert_eq!(second.courses_skipped, 3);
    assert_eq!(second.statements_created, 0);
}

#[test]
fn import_merges_duplicate_roots_before_writing() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let first = repo.insert_pack(&Pack::new_root("1600分类单词", 10)).unwrap();
    let second = repo.insert_pack(&Pack::new_root("1600分类单词", 11)).unwrap();
    repo.insert_pack(&Pack::new_child(&second, "A", 1).unwrap())
        .unwrap();

    let report = service(&repo, NoPhoneticLookup)
        .import(&sample_feed())
        .unwrap();

    let roots = repo.list_packs_at_level(PackLevel::Catalog).unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].id, second.id);
    assert!(repo.get_pack(first.id).unwrap().is_none());
    assert_eq!(report.roots_merged, 1);
    assert_eq!(report.root_id, Some(second.id));
    assert_eq!(repo.list_packs_at_level(PackLevel::Category).unwrap().len(), 2);
}

#[test]
fn phonetic_enrichment_fills_missing_transcriptions_only() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let lookup = CountingLookup {
        calls: Cell::new(0),
    };

    let report = service(&repo, &lookup).import(&sample_feed()).unwrap();

    assert_eq!(lookup.calls.get(), 4);
    assert_eq!(report.phonetic_lookups, 4);
    assert_eq!(report.phonetic_misses, 1);

    let b1 = repo
        .list_packs_at_level(PackLevel::Subcategory)
        .unwrap()
        .into_iter()
        .find(|pack| pack.title == "b1")
        .unwrap();
    let course = &repo.list_courses(b1.id).unwrap()[0];
    let statements = repo.list_statements(course.id).unwrap();
    assert_eq!(statements[0].soundmark, "");
    assert_eq!(statements[1].soundmark, "/bɔːl/");
}

#[test]
fn invalid_record_aborts_before_any_write() {
    let conn = setup();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let mut feed = sample_feed();
    feed.push(word("C", "", "cat"));

    let err = service(&repo, NoPhoneticLookup).import(&feed).unwrap_err();
    assert!(matches!(err, ImportError::InvalidRecord { index: 5, .. }));
    assert_eq!(repo.catalog_totals().unwrap().packs, 0);
}
