//! Core domain logic for packtree.
//! This crate is the single source of truth for catalog invariants and
//! duplicate reconciliation.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{
    default_log_level, init_logging, init_logging_with, logging_status, LoggingOptions,
};
pub use model::course::{Course, CourseId, Statement, StatementId};
pub use model::pack::{Pack, PackId, PackKey, PackLevel, PackValidationError};
pub use repo::catalog_repo::{
    CatalogRepoError, CatalogRepoResult, CatalogRepository, CatalogTotals,
    SqliteCatalogRepository,
};
pub use repo::memory_repo::MemoryCatalogRepository;
pub use service::audit::{audit_catalog, AuditFinding, AuditReport};
pub use service::covers::{assign_child_covers, CoverError};
pub use service::detector::{detect, DetectionScope, DuplicateOrigin, DuplicateSet};
pub use service::exceptions::{ExceptionGroup, ExceptionTable};
pub use service::import::{
    group_records, ImportError, ImportOptions, ImportReport, ImportService, VocabularyRecord,
};
pub use service::phonetic::{
    EnrichmentError, NoPhoneticLookup, PhoneticEnricher, PhoneticLookup, TablePhoneticLookup,
};
pub use service::query::{CatalogQueryService, PackNode, QueryError};
pub use service::reconciler::{ReconcileError, ReconcileOptions, Reconciler};
pub use service::report::{
    EntityRef, IssueKind, ReconcileIssue, ReconciliationReport, Verification,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
