//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into reconciliation, import and query
//!   use cases.
//! - Keep the CLI decoupled from storage details.
//!
//! # Invariants
//! - Services talk to storage only through `CatalogRepository`.
//! - Mutating services report non-fatal problems instead of aborting.

pub mod audit;
pub mod collapser;
pub mod covers;
pub mod detector;
pub mod exceptions;
pub mod import;
pub mod merger;
pub mod phonetic;
pub mod query;
pub mod reconciler;
pub mod report;
pub mod selector;
