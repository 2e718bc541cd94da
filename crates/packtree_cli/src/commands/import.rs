use crate::config::{CliConfig, Settings};
use crate::support::{open_catalog, print_json, read_json, yes_no};
use packtree_core::{
    ImportService, NoPhoneticLookup, PhoneticEnricher, PhoneticLookup, SqliteCatalogRepository,
    TablePhoneticLookup, VocabularyRecord,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub struct Args {
    pub feed: PathBuf,
    pub phonetics: Option<PathBuf>,
    pub root_title: Option<String>,
}

pub fn run(settings: &Settings, config: &CliConfig, args: Args) -> Result<(), String> {
    let records: Vec<VocabularyRecord> = read_json(&args.feed)?;
    let mut options = config.import_options();
    if let Some(root_title) = args.root_title {
        options.root_title = root_title;
    }

    // Without a table nothing is looked up, so there is nothing to pace.
    let enricher = match &args.phonetics {
        Some(path) => {
            let entries: HashMap<String, String> = read_json(path)?;
            let lookup: Box<dyn PhoneticLookup> = Box::new(TablePhoneticLookup::new(entries));
            match config.phonetic_delay() {
                Some(delay) => PhoneticEnricher::with_delay(lookup, delay),
                None => PhoneticEnricher::new(lookup),
            }
        }
        None => {
            let lookup: Box<dyn PhoneticLookup> = Box::new(NoPhoneticLookup);
            PhoneticEnricher::with_delay(lookup, Duration::ZERO)
        }
    };

    let conn = open_catalog(&settings.db)?;
    let repo = SqliteCatalogRepository::try_new(&conn)
        .map_err(|err| format!("catalog not ready: {err}"))?;
    let report = ImportService::new(&repo, enricher, options)
        .import(&records)
        .map_err(|err| format!("import failed: {err}"))?;

    if settings.json {
        return print_json(&report);
    }

    println!("packtree import {}", args.feed.display());
    println!("  Records: {}", records.len());
    if let Some(root_id) = report.root_id {
        println!("  Root: {root_id} (created: {})", yes_no(report.root_created));
    }
    println!("  Duplicate roots merged: {}", report.roots_merged);
    println!(
        "  Packs: {} created, {} reused",
        report.packs_created, report.packs_reused
    );
    println!(
        "  Courses: {} created, {} skipped",
        report.courses_created, report.courses_skipped
    );
    println!("  Statements created: {}", report.statements_created);
    println!(
        "  Phonetic lookups: {} ({} missed)",
        report.phonetic_lookups, report.phonetic_misses
    );
    Ok(())
}
