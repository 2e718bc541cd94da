//! Vocabulary feed import.
//!
//! # Responsibility
//! - Group flat vocabulary records into category → subcategory → words.
//! - Materialize the groups as a three-level pack tree with one course per
//!   subcategory, reusing whatever already exists.
//!
//! # Invariants
//! - Packs are resolved by identity key before creation, so a re-import never
//!   creates duplicate packs.
//! - A subcategory whose course already exists is skipped entirely.
//! - Statements are numbered `1..=n` in feed order.
//! - The feed is validated before the first write.

use crate::logging::sanitize_message;
use crate::model::course::{Course, Statement};
use crate::model::pack::{Pack, PackId, PackLevel, PackValidationError};
use crate::repo::catalog_repo::{CatalogRepoError, CatalogRepository};
use crate::service::phonetic::{PhoneticEnricher, PhoneticLookup};
use crate::service::reconciler::{ReconcileError, Reconciler};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const MAX_LOGGED_TITLE_CHARS: usize = 80;

/// One word of the upstream vocabulary feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyRecord {
    pub category: String,
    pub subcategory: String,
    pub english: String,
    #[serde(default)]
    pub chinese: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonetic: Option<String>,
}

/// Words of one subcategory in feed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubcategoryGroup {
    pub title: String,
    pub words: Vec<VocabularyRecord>,
}

/// Subcategories of one category in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    pub title: String,
    pub subcategories: Vec<SubcategoryGroup>,
}

/// Groups records by category and subcategory, preserving first-seen order.
pub fn group_records(records: &[VocabularyRecord]) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    for record in records {
        let category_index = match groups
            .iter()
            .position(|group| group.title == record.category)
        {
            Some(index) => index,
            None => {
                groups.push(CategoryGroup {
                    title: record.category.clone(),
                    subcategories: Vec::new(),
                });
                groups.len() - 1
            }
        };
        let subcategories = &mut groups[category_index].subcategories;
        match subcategories
            .iter_mut()
            .find(|group| group.title == record.subcategory)
        {
            Some(group) => group.words.push(record.clone()),
            None => subcategories.push(SubcategoryGroup {
                title: record.subcategory.clone(),
                words: vec![record.clone()],
            }),
        }
    }
    groups
}

/// Import naming and placement settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub root_title: String,
    pub root_description: String,
    pub root_order: i64,
    /// Appended to the subcategory title to form the course title.
    pub course_title_suffix: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            root_title: "1600分类单词".to_string(),
            root_description: "1600个分类单词，按主题和场景分类学习".to_string(),
            root_order: 10,
            course_title_suffix: "词汇练习".to_string(),
        }
    }
}

/// Counters of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub root_id: Option<PackId>,
    pub root_created: bool,
    /// Duplicate roots merged before importing.
    pub roots_merged: u64,
    pub packs_created: u64,
    pub packs_reused: u64,
    pub courses_created: u64,
    pub courses_skipped: u64,
    pub statements_created: u64,
    pub phonetic_lookups: u64,
    pub phonetic_misses: u64,
}

/// Errors from import runs.
#[derive(Debug)]
pub enum ImportError {
    /// Feed record is unusable; nothing was written.
    InvalidRecord { index: usize, reason: String },
    /// Duplicate roots could not be reconciled.
    Reconcile(ReconcileError),
    Repo(CatalogRepoError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRecord { index, reason } => {
                write!(f, "invalid vocabulary record #{index}: {reason}")
            }
            Self::Reconcile(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Reconcile(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::InvalidRecord { .. } => None,
        }
    }
}

impl From<CatalogRepoError> for ImportError {
    fn from(value: CatalogRepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ReconcileError> for ImportError {
    fn from(value: ReconcileError) -> Self {
        Self::Reconcile(value)
    }
}

/// Import service facade.
pub struct ImportService<R: CatalogRepository, L: PhoneticLookup> {
    repo: R,
    enricher: PhoneticEnricher<L>,
    options: ImportOptions,
}

impl<R: CatalogRepository, L: PhoneticLookup> ImportService<R, L> {
    pub fn new(repo: R, enricher: PhoneticEnricher<L>, options: ImportOptions) -> Self {
        Self {
            repo,
            enricher,
            options,
        }
    }

    /// Imports `records` under the configured root.
    ///
    /// # Errors
    /// - `InvalidRecord` for a blank category, subcategory or english word.
    /// - `Reconcile` when duplicate roots cannot be merged.
    /// - `Repo` for storage failures.
    pub fn import(&self, records: &[VocabularyRecord]) -> Result<ImportReport, ImportError> {
        validate_records(records)?;
        let started_at = Instant::now();
        info!(
            "event=import module=import status=start records={} root={}",
            records.len(),
            sanitize_message(&self.options.root_title, MAX_LOGGED_TITLE_CHARS)
        );

        let mut report = ImportReport::default();
        let root = self.resolve_root(&mut report)?;
        report.root_id = Some(root.id);

        for (category_index, category) in group_records(records).iter().enumerate() {
            let description = format!(
                "{}相关词汇，包含{}个子分类",
                category.title,
                category.subcategories.len()
            );
            let category_pack = self.get_or_create_child(
                &root,
                &category.title,
                category_index as i64 + 1,
                description,
                &mut report,
            )?;

            for (sub_index, subcategory) in category.subcategories.iter().enumerate() {
                let description = format!(
                    "{}词汇，包含{}个单词",
                    subcategory.title,
                    subcategory.words.len()
                );
                let sub_pack = self.get_or_create_child(
                    &category_pack,
                    &subcategory.title,
                    sub_index as i64 + 1,
                    description,
                    &mut report,
                )?;
                self.import_subcategory(&sub_pack, subcategory, &mut report)?;
            }
        }

        info!(
            "event=import module=import status=ok duration_ms={} packs_created={} packs_reused={} courses_created={} courses_skipped={} statements_created={} phonetic_misses={}",
            started_at.elapsed().as_millis(),
            report.packs_created,
            report.packs_reused,
            report.courses_created,
            report.courses_skipped,
            report.statements_created,
            report.phonetic_misses
        );
        Ok(report)
    }

    fn resolve_root(&self, report: &mut ImportReport) -> Result<Pack, ImportError> {
        let title = self.options.root_title.as_str();
        let mut roots = matching_roots(&self.repo, title)?;
        if roots.len() > 1 {
            Reconciler::new(&self.repo).reconcile_root_by_title(title)?;
            let remaining = matching_roots(&self.repo, title)?;
            report.roots_merged = (roots.len() - remaining.len()) as u64;
            roots = remaining;
        }

        if let Some(root) = roots.into_iter().next() {
            return Ok(root);
        }

        let root = Pack::new_root(title, self.options.root_order)
            .with_description(self.options.root_description.clone());
        let root = self.repo.insert_pack(&root)?;
        report.root_created = true;
        report.packs_created += 1;
        Ok(root)
    }

    fn get_or_create_child(
        &self,
        parent: &Pack,
        title: &str,
        order: i64,
        description: String,
        report: &mut ImportReport,
    ) -> Result<Pack, ImportError> {
        let Some(level) = parent.level.child() else {
            return Err(CatalogRepoError::Validation(
                PackValidationError::LeafCannotHaveChildren(parent.id),
            )
            .into());
        };
        if let Some(existing) = self
            .repo
            .list_child_packs(Some(parent.id), level)?
            .into_iter()
            .find(|pack| pack.title == title)
        {
            report.packs_reused += 1;
            return Ok(existing);
        }

        let pack = Pack::new_child(parent, title, order)
            .map_err(CatalogRepoError::from)?
            .with_description(description);
        let pack = self.repo.insert_pack(&pack)?;
        report.packs_created += 1;
        debug!(
            "event=import_pack module=import status=created level={} pack={} title={}",
            pack.level,
            pack.id,
            sanitize_message(&pack.title, MAX_LOGGED_TITLE_CHARS)
        );
        Ok(pack)
    }

    fn import_subcategory(
        &self,
        pack: &Pack,
        group: &SubcategoryGroup,
        report: &mut ImportReport,
    ) -> Result<(), ImportError> {
        let course_title = format!("{}{}", group.title, self.options.course_title_suffix);
        let existing = self.repo.list_courses(pack.id)?;
        if existing.iter().any(|course| course.title == course_title) {
            report.courses_skipped += 1;
            debug!(
                "event=import_course module=import status=skip reason=exists pack={} title={}",
                pack.id,
                sanitize_message(&course_title, MAX_LOGGED_TITLE_CHARS)
            );
            return Ok(());
        }

        let order = existing.iter().map(|course| course.order).max().unwrap_or(0) + 1;
        let course = Course::new(pack.id, course_title, order)
            .with_description(format!("学习{}相关的英语词汇", group.title));
        self.repo.insert_course(&course)?;
        report.courses_created += 1;

        for (index, word) in group.words.iter().enumerate() {
            let soundmark = match word.phonetic.as_deref().map(str::trim) {
                Some(phonetic) if !phonetic.is_empty() => phonetic.to_string(),
                _ => {
                    report.phonetic_lookups += 1;
                    let phonetic = self.enricher.enrich(&word.english);
                    if phonetic.is_empty() {
                        report.phonetic_misses += 1;
                    }
                    phonetic
                }
            };
            let statement = Statement::new(
                course.id,
                index as i64 + 1,
                word.english.trim(),
                word.chinese.trim(),
            )
            .with_soundmark(soundmark);
            self.repo.insert_statement(&statement)?;
            report.statements_created += 1;
        }
        Ok(())
    }
}

fn matching_roots<R: CatalogRepository>(
    repo: &R,
    title: &str,
) -> Result<Vec<Pack>, CatalogRepoError> {
    Ok(repo
        .list_child_packs(None, PackLevel::Catalog)?
        .into_iter()
        .filter(|pack| pack.title == title)
        .collect())
}

fn validate_records(records: &[VocabularyRecord]) -> Result<(), ImportError> {
    for (index, record) in records.iter().enumerate() {
        let blank = if record.category.trim().is_empty() {
            Some("category")
        } else if record.subcategory.trim().is_empty() {
            Some("subcategory")
        } else if record.english.trim().is_empty() {
            Some("english")
        } else {
            None
        };
        if let Some(field) = blank {
            return Err(ImportError::InvalidRecord {
                index,
                reason: format!("`{field}` must not be blank"),
            });
        }
    }
    Ok(())
}
