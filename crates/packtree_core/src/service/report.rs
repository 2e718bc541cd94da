//! Reconciliation report model.
//!
//! # Responsibility
//! - Accumulate counters and per-entity issues while a run mutates the tree.
//! - Carry the post-run verification block consumed by operators and tests.
//!
//! # Invariants
//! - Counters only ever grow within one report.
//! - A report is clean only when it has no issues, statements were conserved
//!   and no duplicate sets remain in the processed scope.

use crate::model::course::{CourseId, StatementId};
use crate::model::pack::PackId;
use crate::repo::catalog_repo::CatalogTotals;
use serde::Serialize;

/// Category of a non-fatal problem met during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Node failed level/parent checks and was skipped.
    InvariantViolation,
    /// A single write failed; the run continued.
    RelocationFailure,
    /// A unit of work was rolled back.
    RolledBack,
}

/// Entity an issue refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EntityRef {
    Pack(PackId),
    Course(CourseId),
    Statement(StatementId),
}

/// One recorded problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileIssue {
    pub kind: IssueKind,
    pub entity: EntityRef,
    pub message: String,
}

/// Post-run checks over the processed scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub totals_before: CatalogTotals,
    pub totals_after: CatalogTotals,
    pub statements_conserved: bool,
    pub remaining_duplicate_sets: u64,
}

impl Verification {
    pub fn new(
        totals_before: CatalogTotals,
        totals_after: CatalogTotals,
        remaining_duplicate_sets: u64,
    ) -> Self {
        Self {
            totals_before,
            totals_after,
            statements_conserved: totals_before.statements == totals_after.statements,
            remaining_duplicate_sets,
        }
    }
}

/// Structured outcome of a reconciliation, collapse or exception run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub duplicate_sets_found: u64,
    pub exception_sets_found: u64,
    pub packs_deleted: u64,
    pub packs_reparented: u64,
    pub courses_reparented: u64,
    pub courses_merged: u64,
    pub statements_relocated: u64,
    pub packs_collapsed: u64,
    pub issues: Vec<ReconcileIssue>,
    pub verification: Option<Verification>,
}

impl ReconciliationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one issue.
    pub fn record(&mut self, kind: IssueKind, entity: EntityRef, message: impl Into<String>) {
        self.issues.push(ReconcileIssue {
            kind,
            entity,
            message: message.into(),
        });
    }

    /// Adds counters and issues of `other` into `self`.
    ///
    /// `other.verification` is dropped; callers verify the outer scope.
    pub fn absorb(&mut self, other: ReconciliationReport) {
        self.duplicate_sets_found += other.duplicate_sets_found;
        self.exception_sets_found += other.exception_sets_found;
        self.packs_deleted += other.packs_deleted;
        self.packs_reparented += other.packs_reparented;
        self.courses_reparented += other.courses_reparented;
        self.courses_merged += other.courses_merged;
        self.statements_relocated += other.statements_relocated;
        self.packs_collapsed += other.packs_collapsed;
        self.issues.extend(other.issues);
    }

    /// Number of issues of one kind.
    pub fn issue_count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|issue| issue.kind == kind).count()
    }

    /// Whether the run finished without issues and left a verified scope.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
            && self.verification.is_some_and(|verification| {
                verification.statements_conserved && verification.remaining_duplicate_sets == 0
            })
    }
}
