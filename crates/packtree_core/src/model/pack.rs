//! Course pack domain model.
//!
//! # Responsibility
//! - Define the three-level pack hierarchy node and its identity key.
//! - Validate level/parent shape before a pack reaches persistence.
//!
//! # Invariants
//! - `parent_id` is `None` iff `level == PackLevel::Catalog`.
//! - A child pack is exactly one level below its parent.
//! - Titles are only unique within `(parent_id, level, title)`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a course pack.
pub type PackId = Uuid;

/// Depth of a pack in the catalog hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackLevel {
    /// Level 1: root catalog entry without parent.
    Catalog,
    /// Level 2: category under a catalog entry.
    Category,
    /// Level 3: subcategory under a category.
    Subcategory,
}

impl PackLevel {
    /// All levels from root to leaf.
    pub const ALL: [PackLevel; 3] = [Self::Catalog, Self::Category, Self::Subcategory];

    /// Returns the persisted integer form (`1..=3`).
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Catalog => 1,
            Self::Category => 2,
            Self::Subcategory => 3,
        }
    }

    /// Parses the persisted integer form.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Catalog),
            2 => Some(Self::Category),
            3 => Some(Self::Subcategory),
            _ => None,
        }
    }

    /// Level of the parent pack, `None` for roots.
    pub fn parent(self) -> Option<Self> {
        match self {
            Self::Catalog => None,
            Self::Category => Some(Self::Catalog),
            Self::Subcategory => Some(Self::Category),
        }
    }

    /// Level of child packs, `None` for the leaf level.
    pub fn child(self) -> Option<Self> {
        match self {
            Self::Catalog => Some(Self::Category),
            Self::Category => Some(Self::Subcategory),
            Self::Subcategory => None,
        }
    }
}

impl Display for PackLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

/// Identity key used to decide whether two packs are duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PackKey {
    pub parent_id: Option<PackId>,
    pub level: PackLevel,
    pub title: String,
}

/// Validation failures for pack shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackValidationError {
    /// Title is blank after trim.
    BlankTitle,
    /// Level-1 pack carries a parent reference.
    RootWithParent(PackId),
    /// Level-2/3 pack has no parent reference.
    MissingParent { level: PackLevel },
    /// Pack references itself as parent.
    SelfParent(PackId),
    /// Leaf-level pack cannot own child packs.
    LeafCannotHaveChildren(PackId),
}

impl Display for PackValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "pack title must not be blank"),
            Self::RootWithParent(id) => write!(f, "level-1 pack {id} must not have a parent"),
            Self::MissingParent { level } => {
                write!(f, "level-{level} pack requires a parent")
            }
            Self::SelfParent(id) => write!(f, "pack {id} cannot be its own parent"),
            Self::LeafCannotHaveChildren(id) => {
                write!(f, "level-3 pack {id} cannot own child packs")
            }
        }
    }
}

impl Error for PackValidationError {}

/// One node of the course pack hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pack {
    pub id: PackId,
    pub title: String,
    pub level: PackLevel,
    pub parent_id: Option<PackId>,
    /// Sibling sort key; not unique, ties broken by `id`.
    pub order: i64,
    pub description: String,
    pub cover: Option<String>,
    pub is_free: bool,
    pub share_level: String,
    pub creator_id: String,
    /// Epoch ms creation timestamp, assigned by storage.
    pub created_at: i64,
    /// Epoch ms update timestamp, assigned by storage.
    pub updated_at: i64,
}

impl Pack {
    /// Creates a level-1 catalog pack with a generated id.
    pub fn new_root(title: impl Into<String>, order: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            level: PackLevel::Catalog,
            parent_id: None,
            order,
            description: String::new(),
            cover: None,
            is_free: true,
            share_level: "public".to_string(),
            creator_id: "system".to_string(),
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Creates a child pack one level below `parent`.
    ///
    /// Metadata (`is_free`, `share_level`, `creator_id`) is copied forward
    /// from the parent.
    ///
    /// # Errors
    /// - `LeafCannotHaveChildren` when `parent` is level 3.
    pub fn new_child(
        parent: &Pack,
        title: impl Into<String>,
        order: i64,
    ) -> Result<Self, PackValidationError> {
        let level = parent
            .level
            .child()
            .ok_or(PackValidationError::LeafCannotHaveChildren(parent.id))?;
        Ok(Self {
            id: Uuid::new_v4(),
            title: title.into(),
            level,
            parent_id: Some(parent.id),
            order,
            description: String::new(),
            cover: None,
            is_free: parent.is_free,
            share_level: parent.share_level.clone(),
            creator_id: parent.creator_id.clone(),
            created_at: 0,
            updated_at: 0,
        })
    }

    /// Sets the description, builder style.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns the duplicate-detection identity key.
    pub fn key(&self) -> PackKey {
        PackKey {
            parent_id: self.parent_id,
            level: self.level,
            title: self.title.clone(),
        }
    }

    /// Validates local shape invariants.
    ///
    /// Parent existence and parent level are checked by storage-aware callers.
    pub fn validate(&self) -> Result<(), PackValidationError> {
        if self.title.trim().is_empty() {
            return Err(PackValidationError::BlankTitle);
        }
        match (self.level, self.parent_id) {
            (PackLevel::Catalog, Some(_)) => Err(PackValidationError::RootWithParent(self.id)),
            (level, None) if level != PackLevel::Catalog => {
                Err(PackValidationError::MissingParent { level })
            }
            (_, Some(parent_id)) if parent_id == self.id => {
                Err(PackValidationError::SelfParent(self.id))
            }
            _ => Ok(()),
        }
    }

    /// Returns whether `parent` is a valid parent for this pack.
    pub fn is_valid_child_of(&self, parent: &Pack) -> bool {
        self.parent_id == Some(parent.id) && self.level.parent() == Some(parent.level)
    }
}
