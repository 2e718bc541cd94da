//! Course and statement domain model.
//!
//! # Invariants
//! - Every course is owned by exactly one pack (`pack_id`).
//! - Every statement is owned by exactly one course (`course_id`).
//! - Statements are never destroyed by reconciliation; they only move.

use crate::model::pack::PackId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a course.
pub type CourseId = Uuid;

/// Stable identifier of a statement.
pub type StatementId = Uuid;

/// Learning unit owning an ordered list of statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub order: i64,
    pub pack_id: PackId,
}

impl Course {
    /// Creates a course under `pack_id` with a generated id.
    pub fn new(pack_id: PackId, title: impl Into<String>, order: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            order,
            pack_id,
        }
    }

    /// Sets the description, builder style.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Single practice sentence or word entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub id: StatementId,
    pub order: i64,
    pub english: String,
    pub chinese: String,
    /// Phonetic transcription; empty when unknown.
    pub soundmark: String,
    pub course_id: CourseId,
}

impl Statement {
    /// Creates a statement under `course_id` with a generated id.
    pub fn new(
        course_id: CourseId,
        order: i64,
        english: impl Into<String>,
        chinese: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order,
            english: english.into(),
            chinese: chinese.into(),
            soundmark: String::new(),
            course_id,
        }
    }

    /// Sets the phonetic transcription, builder style.
    pub fn with_soundmark(mut self, soundmark: impl Into<String>) -> Self {
        self.soundmark = soundmark.into();
        self
    }
}
