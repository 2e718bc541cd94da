//! Bulk cover assignment below a root pack.
//!
//! # Invariants
//! - Only packs at the requested level under the given root are touched.
//! - Reconciliation never calls this; it does not rewrite metadata.

use crate::model::pack::{Pack, PackId, PackLevel};
use crate::repo::catalog_repo::{CatalogRepoError, CatalogRepository};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum CoverError {
    RootNotFound(PackId),
    /// Target pack is not level 1.
    NotARoot(PackId),
    /// Level 1 has no packs below a root.
    InvalidLevel(PackLevel),
    Repo(CatalogRepoError),
}

impl Display for CoverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RootNotFound(id) => write!(f, "root pack not found: {id}"),
            Self::NotARoot(id) => write!(f, "pack {id} is not a level-1 pack"),
            Self::InvalidLevel(level) => {
                write!(f, "cover level must be below the root, got level {level}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CoverError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CatalogRepoError> for CoverError {
    fn from(value: CatalogRepoError) -> Self {
        Self::Repo(value)
    }
}

/// Sets `cover` on every pack at `level` under `root_id`.
///
/// Returns the number of packs updated.
pub fn assign_child_covers<R: CatalogRepository>(
    repo: &R,
    root_id: PackId,
    level: PackLevel,
    cover: Option<&str>,
) -> Result<u64, CoverError> {
    if level == PackLevel::Catalog {
        return Err(CoverError::InvalidLevel(level));
    }
    let root = repo
        .get_pack(root_id)?
        .ok_or(CoverError::RootNotFound(root_id))?;
    if root.level != PackLevel::Catalog {
        return Err(CoverError::NotARoot(root_id));
    }

    let mut frontier: Vec<Pack> = vec![root];
    while let Some(current) = frontier.first() {
        if current.level.child() == Some(level) {
            break;
        }
        let mut next = Vec::new();
        for pack in &frontier {
            if let Some(child_level) = pack.level.child() {
                next.extend(repo.list_child_packs(Some(pack.id), child_level)?);
            }
        }
        frontier = next;
    }

    let mut updated = 0;
    for parent in &frontier {
        for pack in repo.list_child_packs(Some(parent.id), level)? {
            repo.set_pack_cover(pack.id, cover)?;
            updated += 1;
        }
    }
    info!(
        "event=assign_covers module=covers status=ok root={root_id} level={level} updated={updated}"
    );
    Ok(updated)
}
