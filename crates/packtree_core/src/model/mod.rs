//! Catalog tree domain model.
//!
//! # Responsibility
//! - Define pack/course/statement records shared by repository and services.
//! - Keep level and parentage rules next to the data they constrain.
//!
//! # Invariants
//! - Packs form a tree of depth three; courses hang off packs, statements off
//!   courses.
//! - Reconciliation only rewrites ownership references, never titles or
//!   metadata.

pub mod course;
pub mod pack;
