//! Reconciliation use-case orchestration.
//!
//! # Responsibility
//! - Drive detection, canonical selection and subtree merge over a scope.
//! - Apply the exception table, course de-duplication and level collapse.
//! - Produce a verified `ReconciliationReport` for every run.
//!
//! # Invariants
//! - Only a missing or unreadable top-level scope is returned as `Err`; every
//!   later problem is recorded in the report and the run continues.
//! - Every run is re-runnable: a second run over a clean scope changes nothing.
//! - With `transactional`, each duplicate set is merged inside one unit of
//!   work and rolled back as a whole when any of its writes fails.

use crate::logging::sanitize_message;
use crate::model::course::CourseId;
use crate::model::pack::{Pack, PackId, PackLevel};
use crate::repo::catalog_repo::{CatalogRepoError, CatalogRepository, CatalogTotals};
use crate::service::collapser::collapse_subcategories;
use crate::service::detector::{
    detect, group_duplicate_courses, scope_packs, DetectionScope, DuplicateOrigin, DuplicateSet,
};
use crate::service::exceptions::ExceptionTable;
use crate::service::merger::{
    dedupe_pack_courses, fold_course_group, merge_pack_into, record_failure,
};
use crate::service::report::{
    EntityRef, IssueKind, ReconcileIssue, ReconciliationReport, Verification,
};
use crate::service::selector::select_canonical;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const MAX_LOGGED_TITLE_CHARS: usize = 80;

/// Errors that abort a reconciliation run before any write.
#[derive(Debug)]
pub enum ReconcileError {
    /// Scope parent or target pack does not exist.
    ScopeNotFound(PackId),
    /// No level-1 pack carries the requested title.
    RootNotFound(String),
    /// Scope exists but cannot be processed as requested.
    InvalidScope(String),
    /// Repository failure while reading the initial scope.
    Repo(CatalogRepoError),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScopeNotFound(id) => write!(f, "scope pack not found: {id}"),
            Self::RootNotFound(title) => write!(f, "no level-1 pack titled `{title}`"),
            Self::InvalidScope(message) => write!(f, "invalid scope: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CatalogRepoError> for ReconcileError {
    fn from(value: CatalogRepoError) -> Self {
        match value {
            CatalogRepoError::PackNotFound(pack_id) => Self::ScopeNotFound(pack_id),
            other => Self::Repo(other),
        }
    }
}

/// Knobs for one reconciler instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Descend into every surviving pack and normalize its child scopes.
    pub recursive: bool,
    /// Merge same-titled courses inside every visited non-root pack.
    pub dedupe_courses: bool,
    /// Merge each duplicate set inside one unit of work.
    pub transactional: bool,
    /// Merge duplicate level-2 siblings before collapsing level 3.
    pub merge_before_collapse: bool,
    /// Manual merge groups. Applied after general merges; a scoped run only
    /// applies the groups lying wholly inside its scope.
    pub exceptions: ExceptionTable,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            dedupe_courses: false,
            transactional: false,
            merge_before_collapse: true,
            exceptions: ExceptionTable::default(),
        }
    }
}

/// Reconciliation service facade.
pub struct Reconciler<R: CatalogRepository> {
    repo: R,
    options: ReconcileOptions,
}

impl<R: CatalogRepository> Reconciler<R> {
    /// Creates reconciler with default options.
    pub fn new(repo: R) -> Self {
        Self::with_options(repo, ReconcileOptions::default())
    }

    pub fn with_options(repo: R, options: ReconcileOptions) -> Self {
        Self { repo, options }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Detects and merges every duplicate set inside `scope`.
    ///
    /// With `recursive`, the child scopes of every pack left in `scope` are
    /// reconciled too. Exception groups whose members all sit inside `scope`
    /// are applied after general merges; the rest are left for
    /// `apply_exceptions`.
    ///
    /// # Errors
    /// - `ScopeNotFound` / `InvalidScope` for a bad sibling scope.
    /// - `Repo` when the scope cannot be read.
    pub fn reconcile(
        &self,
        scope: &DetectionScope,
    ) -> Result<ReconciliationReport, ReconcileError> {
        let started_at = Instant::now();
        let totals_before = self.repo.catalog_totals()?;
        let sets = detect(&self.repo, scope)?;
        let exceptions = self.options.exceptions.scoped_to(&self.repo, scope)?;
        info!(
            "event=reconcile module=reconciler status=start scope={} sets={} exception_groups={}",
            describe_scope(scope),
            sets.len(),
            exceptions.pack_groups.len() + exceptions.course_groups.len()
        );

        let mut report = ReconciliationReport::new();
        report.duplicate_sets_found += sets.len() as u64;
        for set in &sets {
            self.merge_set(set, &mut report);
        }

        if !exceptions.is_empty() {
            self.apply_exception_groups(&exceptions, &mut report);
        }

        if self.options.recursive || self.options.dedupe_courses {
            match scope_packs(&self.repo, scope) {
                Ok(packs) => {
                    for pack in &packs {
                        self.normalize_subtree(pack, &mut report);
                    }
                }
                Err(err) => record_scope_failure(&mut report, scope, &err),
            }
        }

        self.verify(totals_before, &mut report, |this| {
            let general = this.count_remaining(scope)?;
            Ok(general + count_remaining_exceptions(&this.repo, &exceptions)?)
        });
        log_finished("reconcile", &report, started_at);
        Ok(report)
    }

    /// Reconciles the level-1 packs titled `title` and everything below them.
    ///
    /// # Errors
    /// - `RootNotFound` when no root carries the title.
    pub fn reconcile_root_by_title(
        &self,
        title: &str,
    ) -> Result<ReconciliationReport, ReconcileError> {
        let scope = DetectionScope::Roots {
            title: Some(title.to_string()),
        };
        if scope_packs(&self.repo, &scope)?.is_empty() {
            return Err(ReconcileError::RootNotFound(title.to_string()));
        }
        self.reconcile(&scope)
    }

    /// Merges one caller-supplied duplicate set.
    ///
    /// Members are re-read so that stale snapshots are not merged.
    pub fn merge_duplicate_set(
        &self,
        set: &DuplicateSet,
    ) -> Result<ReconciliationReport, ReconcileError> {
        let totals_before = self.repo.catalog_totals()?;
        let mut members = Vec::with_capacity(set.members.len());
        for member in &set.members {
            if let Some(pack) = self.repo.get_pack(member.id)? {
                members.push(pack);
            }
        }

        let mut report = ReconciliationReport::new();
        match set.origin {
            DuplicateOrigin::General => report.duplicate_sets_found += 1,
            DuplicateOrigin::Exception(_) => report.exception_sets_found += 1,
        }
        let live = DuplicateSet {
            key: set.key.clone(),
            origin: set.origin.clone(),
            members,
        };
        self.merge_set(&live, &mut report);

        let ids = live.member_ids();
        self.verify(totals_before, &mut report, |this| {
            let mut remaining = 0;
            for id in &ids {
                if this.repo.get_pack(*id)?.is_some() {
                    remaining += 1;
                }
            }
            Ok(u64::from(remaining > 1))
        });
        Ok(report)
    }

    /// Merges same-titled courses inside one pack.
    ///
    /// # Errors
    /// - `ScopeNotFound` when the pack does not exist.
    pub fn dedupe_courses(&self, pack_id: PackId) -> Result<ReconciliationReport, ReconcileError> {
        let started_at = Instant::now();
        self.repo
            .get_pack(pack_id)?
            .ok_or(ReconcileError::ScopeNotFound(pack_id))?;
        let totals_before = self.repo.catalog_totals()?;

        let mut report = ReconciliationReport::new();
        dedupe_pack_courses(&self.repo, pack_id, &mut report);
        self.verify(totals_before, &mut report, |this| {
            Ok(group_duplicate_courses(this.repo.list_courses(pack_id)?).len() as u64)
        });
        log_finished("dedupe_courses", &report, started_at);
        Ok(report)
    }

    /// Merges every pack and course group named in the exception table.
    pub fn apply_exceptions(&self) -> Result<ReconciliationReport, ReconcileError> {
        let started_at = Instant::now();
        let totals_before = self.repo.catalog_totals()?;
        // An unreadable exception table aborts before any write.
        self.options.exceptions.resolve_pack_sets(&self.repo)?;

        let mut report = ReconciliationReport::new();
        self.apply_exception_groups(&self.options.exceptions, &mut report);
        self.verify(totals_before, &mut report, |this| {
            count_remaining_exceptions(&this.repo, &this.options.exceptions)
        });
        log_finished("apply_exceptions", &report, started_at);
        Ok(report)
    }

    /// Removes `level` beneath the level-1 pack `root_id`.
    ///
    /// Only the leaf level can be collapsed. Duplicate level-2 siblings are
    /// merged first when `merge_before_collapse` is set.
    ///
    /// # Errors
    /// - `InvalidScope` when `level` is not the leaf level or `root_id` is
    ///   not a level-1 pack.
    /// - `ScopeNotFound` when `root_id` does not exist.
    pub fn collapse_level(
        &self,
        root_id: PackId,
        level: PackLevel,
    ) -> Result<ReconciliationReport, ReconcileError> {
        if level != PackLevel::Subcategory {
            return Err(ReconcileError::InvalidScope(format!(
                "only level 3 can be collapsed, got level {level}"
            )));
        }
        let root = self
            .repo
            .get_pack(root_id)?
            .ok_or(ReconcileError::ScopeNotFound(root_id))?;
        if root.level != PackLevel::Catalog {
            return Err(ReconcileError::InvalidScope(format!(
                "collapse root {root_id} is level {}, expected level 1",
                root.level
            )));
        }

        let started_at = Instant::now();
        let totals_before = self.repo.catalog_totals()?;
        let category_scope = DetectionScope::Siblings {
            parent_id: root.id,
            level: PackLevel::Category,
        };
        info!(
            "event=collapse module=reconciler status=start root={} title={}",
            root.id,
            sanitize_message(&root.title, MAX_LOGGED_TITLE_CHARS)
        );

        let mut report = ReconciliationReport::new();
        if self.options.merge_before_collapse {
            let sets = detect(&self.repo, &category_scope)?;
            report.duplicate_sets_found += sets.len() as u64;
            for set in &sets {
                self.merge_set(set, &mut report);
            }
        }

        collapse_subcategories(&self.repo, &root, &mut report);

        if self.options.dedupe_courses {
            match self.repo.list_child_packs(Some(root.id), PackLevel::Category) {
                Ok(categories) => {
                    for category in &categories {
                        dedupe_pack_courses(&self.repo, category.id, &mut report);
                    }
                }
                Err(err) => record_failure(
                    &mut report,
                    EntityRef::Pack(root.id),
                    "list categories",
                    &err,
                ),
            }
        }

        self.verify(totals_before, &mut report, |this| {
            Ok(detect(&this.repo, &category_scope)
                .map_err(into_repo_error)?
                .len() as u64)
        });
        log_finished("collapse", &report, started_at);
        Ok(report)
    }

    fn merge_set(&self, set: &DuplicateSet, report: &mut ReconciliationReport) {
        let survivor_index = match select_canonical(&self.repo, &set.members) {
            Ok(Some(index)) => index,
            Ok(None) => return,
            Err(err) => {
                if let Some(first) = set.members.first() {
                    record_failure(report, EntityRef::Pack(first.id), "profile duplicates", &err);
                }
                return;
            }
        };
        let survivor = &set.members[survivor_index];
        info!(
            "event=merge_set module=reconciler status=start survivor={} members={} title={}",
            survivor.id,
            set.members.len(),
            sanitize_message(&survivor.title, MAX_LOGGED_TITLE_CHARS)
        );

        if !self.options.transactional {
            for victim in &set.members {
                merge_pack_into(&self.repo, survivor, victim, report);
            }
            return;
        }

        if let Err(err) = self.repo.begin_unit() {
            record_failure(report, EntityRef::Pack(survivor.id), "begin unit", &err);
            return;
        }
        let mut scratch = ReconciliationReport::new();
        for victim in &set.members {
            merge_pack_into(&self.repo, survivor, victim, &mut scratch);
        }

        if scratch.issues.is_empty() {
            match self.repo.commit_unit() {
                Ok(()) => report.absorb(scratch),
                Err(err) => {
                    record_failure(report, EntityRef::Pack(survivor.id), "commit unit", &err);
                    self.roll_back(survivor, report);
                }
            }
            return;
        }

        report.issues.extend(scratch.issues);
        self.roll_back(survivor, report);
    }

    fn roll_back(&self, survivor: &Pack, report: &mut ReconciliationReport) {
        match self.repo.rollback_unit() {
            Ok(()) => {
                warn!(
                    "event=merge_set module=reconciler status=rolled_back survivor={}",
                    survivor.id
                );
                report.record(
                    IssueKind::RolledBack,
                    EntityRef::Pack(survivor.id),
                    "duplicate set merge rolled back",
                );
            }
            Err(err) => record_failure(report, EntityRef::Pack(survivor.id), "rollback unit", &err),
        }
    }

    fn apply_exception_groups(
        &self,
        exceptions: &ExceptionTable,
        report: &mut ReconciliationReport,
    ) {
        match exceptions.resolve_pack_sets(&self.repo) {
            Ok((sets, issues)) => {
                warn_issues(&issues);
                report.issues.extend(issues);
                report.exception_sets_found += sets.len() as u64;
                for set in &sets {
                    self.merge_set(set, report);
                }
            }
            Err(err) => {
                warn!("event=apply_exceptions module=reconciler status=error error={err}");
                report.record(
                    IssueKind::RelocationFailure,
                    EntityRef::Pack(PackId::nil()),
                    format!("resolve pack exceptions failed: {err}"),
                );
            }
        }

        match exceptions.resolve_course_sets(&self.repo) {
            Ok((sets, issues)) => {
                warn_issues(&issues);
                report.issues.extend(issues);
                report.exception_sets_found += sets.len() as u64;
                for set in &sets {
                    info!(
                        "event=merge_courses module=reconciler status=start label={} pack={} members={}",
                        sanitize_message(&set.label, MAX_LOGGED_TITLE_CHARS),
                        set.pack_id,
                        set.members.len()
                    );
                    fold_course_group(&self.repo, &set.members, report);
                }
            }
            Err(err) => {
                warn!("event=apply_exceptions module=reconciler status=error error={err}");
                report.record(
                    IssueKind::RelocationFailure,
                    EntityRef::Course(CourseId::nil()),
                    format!("resolve course exceptions failed: {err}"),
                );
            }
        }
    }

    fn normalize_subtree(&self, pack: &Pack, report: &mut ReconciliationReport) {
        if self.options.dedupe_courses && pack.level != PackLevel::Catalog {
            dedupe_pack_courses(&self.repo, pack.id, report);
        }
        if !self.options.recursive {
            return;
        }
        let Some(child_scope) = DetectionScope::children_of(pack) else {
            return;
        };

        match detect(&self.repo, &child_scope) {
            Ok(sets) => {
                report.duplicate_sets_found += sets.len() as u64;
                for set in &sets {
                    self.merge_set(set, report);
                }
            }
            Err(err) => {
                record_scope_failure(report, &child_scope, &err);
                return;
            }
        }

        match scope_packs(&self.repo, &child_scope) {
            Ok(children) => {
                for child in &children {
                    self.normalize_subtree(child, report);
                }
            }
            Err(err) => record_scope_failure(report, &child_scope, &err),
        }
    }

    fn count_remaining(&self, scope: &DetectionScope) -> Result<u64, CatalogRepoError> {
        let mut remaining = detect(&self.repo, scope).map_err(into_repo_error)?.len() as u64;
        if self.options.recursive {
            for pack in scope_packs(&self.repo, scope).map_err(into_repo_error)? {
                remaining += self.count_remaining_below(&pack)?;
            }
        }
        Ok(remaining)
    }

    fn count_remaining_below(&self, pack: &Pack) -> Result<u64, CatalogRepoError> {
        let Some(child_scope) = DetectionScope::children_of(pack) else {
            return Ok(0);
        };
        let mut remaining = detect(&self.repo, &child_scope)
            .map_err(into_repo_error)?
            .len() as u64;
        for child in scope_packs(&self.repo, &child_scope).map_err(into_repo_error)? {
            remaining += self.count_remaining_below(&child)?;
        }
        Ok(remaining)
    }

    fn verify(
        &self,
        totals_before: CatalogTotals,
        report: &mut ReconciliationReport,
        remaining: impl FnOnce(&Self) -> Result<u64, CatalogRepoError>,
    ) {
        let outcome = self
            .repo
            .catalog_totals()
            .and_then(|totals_after| Ok((totals_after, remaining(self)?)));
        match outcome {
            Ok((totals_after, remaining)) => {
                let verification = Verification::new(totals_before, totals_after, remaining);
                if !verification.statements_conserved {
                    warn!(
                        "event=verify module=reconciler status=error statements_before={} statements_after={}",
                        totals_before.statements, totals_after.statements
                    );
                }
                report.verification = Some(verification);
            }
            Err(err) => {
                warn!("event=verify module=reconciler status=error error={err}");
                report.record(
                    IssueKind::RelocationFailure,
                    EntityRef::Pack(PackId::nil()),
                    format!("verification read failed: {err}"),
                );
            }
        }
    }
}

fn count_remaining_exceptions<R: CatalogRepository>(
    repo: &R,
    exceptions: &ExceptionTable,
) -> Result<u64, CatalogRepoError> {
    if exceptions.is_empty() {
        return Ok(0);
    }
    let (pack_sets, _) = exceptions.resolve_pack_sets(repo)?;
    let (course_sets, _) = exceptions.resolve_course_sets(repo)?;
    Ok((pack_sets.len() + course_sets.len()) as u64)
}

fn into_repo_error(err: ReconcileError) -> CatalogRepoError {
    match err {
        ReconcileError::Repo(inner) => inner,
        ReconcileError::ScopeNotFound(pack_id) => CatalogRepoError::PackNotFound(pack_id),
        other => CatalogRepoError::InvalidData(other.to_string()),
    }
}

fn record_scope_failure(
    report: &mut ReconciliationReport,
    scope: &DetectionScope,
    err: &ReconcileError,
) {
    let entity = match scope {
        DetectionScope::Siblings { parent_id, .. } => EntityRef::Pack(*parent_id),
        DetectionScope::Roots { .. } => EntityRef::Pack(PackId::nil()),
    };
    warn!(
        "event=reconcile module=reconciler status=error scope={} error={}",
        describe_scope(scope),
        err
    );
    report.record(
        IssueKind::RelocationFailure,
        entity,
        format!("reading scope failed: {err}"),
    );
}

fn warn_issues(issues: &[ReconcileIssue]) {
    for issue in issues {
        warn!(
            "event=apply_exceptions module=reconciler status=skip entity={:?} message={}",
            issue.entity, issue.message
        );
    }
}

fn describe_scope(scope: &DetectionScope) -> String {
    match scope {
        DetectionScope::Siblings { parent_id, level } => {
            format!("siblings(parent={parent_id},level={level})")
        }
        DetectionScope::Roots { title: Some(title) } => format!(
            "roots(title={})",
            sanitize_message(title, MAX_LOGGED_TITLE_CHARS)
        ),
        DetectionScope::Roots { title: None } => "roots(all)".to_string(),
    }
}

fn log_finished(operation: &str, report: &ReconciliationReport, started_at: Instant) {
    let clean = report.is_clean();
    let status = if clean { "ok" } else { "partial" };
    info!(
        "event={operation} module=reconciler status={status} duration_ms={} sets={} exception_sets={} packs_deleted={} packs_reparented={} courses_reparented={} courses_merged={} statements_relocated={} packs_collapsed={} issues={}",
        started_at.elapsed().as_millis(),
        report.duplicate_sets_found,
        report.exception_sets_found,
        report.packs_deleted,
        report.packs_reparented,
        report.courses_reparented,
        report.courses_merged,
        report.statements_relocated,
        report.packs_collapsed,
        report.issues.len()
    );
}
