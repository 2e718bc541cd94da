//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the single-entity data access contract used by every service.
//! - Isolate SQLite query details from reconciliation orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Pack::validate()` and parent levels before
//!   persistence.
//! - Repository APIs return semantic errors (`PackNotFound`, `PackNotEmpty`)
//!   in addition to DB transport errors.

pub mod catalog_repo;
pub mod memory_repo;
