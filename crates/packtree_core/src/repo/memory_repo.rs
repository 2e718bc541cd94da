//! In-memory catalog repository.
//!
//! # Responsibility
//! - Mirror `SqliteCatalogRepository` semantics without a database.
//! - Allow tests to inject write failures for chosen entities.
//!
//! # Invariants
//! - Ordering, emptiness and parent-level rules match the SQLite backend.
//! - Units of work snapshot the whole state; rollback restores it exactly.

use crate::model::course::{Course, CourseId, Statement, StatementId};
use crate::model::pack::{Pack, PackId, PackLevel};
use crate::repo::catalog_repo::{
    CatalogRepoError, CatalogRepoResult, CatalogRepository, CatalogTotals,
};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    packs: BTreeMap<PackId, Pack>,
    courses: BTreeMap<CourseId, Course>,
    statements: BTreeMap<StatementId, Statement>,
}

/// Catalog repository held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryCatalogRepository {
    state: RefCell<MemoryState>,
    units: RefCell<Vec<MemoryState>>,
    failing_ids: RefCell<HashSet<Uuid>>,
    clock_ms: Cell<i64>,
}

impl MemoryCatalogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later write targeting `id` fail with `Unavailable`.
    ///
    /// `id` may be a pack, course or statement id.
    pub fn fail_writes_for(&self, id: Uuid) {
        self.failing_ids.borrow_mut().insert(id);
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        self.failing_ids.borrow_mut().clear();
    }

    fn check_writable(&self, id: Uuid) -> CatalogRepoResult<()> {
        if self.failing_ids.borrow().contains(&id) {
            return Err(CatalogRepoError::Unavailable(format!(
                "injected write failure for {id}"
            )));
        }
        Ok(())
    }

    fn tick(&self) -> i64 {
        let next = self.clock_ms.get() + 1;
        self.clock_ms.set(next);
        next
    }

    fn ensure_parent(
        &self,
        pack_id: PackId,
        level: PackLevel,
        parent_id: PackId,
    ) -> CatalogRepoResult<()> {
        let state = self.state.borrow();
        match state.packs.get(&parent_id) {
            Some(parent) if level.parent() == Some(parent.level) => Ok(()),
            _ => Err(CatalogRepoError::InvalidParent { pack_id, parent_id }),
        }
    }

    fn ensure_course_owner(&self, pack_id: PackId) -> CatalogRepoResult<()> {
        let state = self.state.borrow();
        match state.packs.get(&pack_id) {
            None => Err(CatalogRepoError::PackNotFound(pack_id)),
            Some(pack) if pack.level == PackLevel::Catalog => {
                Err(CatalogRepoError::CourseOwnerIsRoot(pack_id))
            }
            Some(_) => Ok(()),
        }
    }
}

fn sorted_packs<'a>(packs: impl Iterator<Item = &'a Pack>) -> Vec<Pack> {
    let mut items: Vec<Pack> = packs.cloned().collect();
    items.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)));
    items
}

impl CatalogRepository for MemoryCatalogRepository {
    fn get_pack(&self, pack_id: PackId) -> CatalogRepoResult<Option<Pack>> {
        Ok(self.state.borrow().packs.get(&pack_id).cloned())
    }

    fn list_child_packs(
        &self,
        parent_id: Option<PackId>,
        level: PackLevel,
    ) -> CatalogRepoResult<Vec<Pack>> {
        let state = self.state.borrow();
        Ok(sorted_packs(state.packs.values().filter(|pack| {
            pack.parent_id == parent_id && pack.level == level
        })))
    }

    fn list_packs_at_level(&self, level: PackLevel) -> CatalogRepoResult<Vec<Pack>> {
        let state = self.state.borrow();
        Ok(sorted_packs(
            state.packs.values().filter(|pack| pack.level == level),
        ))
    }

    fn get_course(&self, course_id: CourseId) -> CatalogRepoResult<Option<Course>> {
        Ok(self.state.borrow().courses.get(&course_id).cloned())
    }

    fn list_courses(&self, pack_id: PackId) -> CatalogRepoResult<Vec<Course>> {
        let state = self.state.borrow();
        let mut items: Vec<Course> = state
            .courses
            .values()
            .filter(|course| course.pack_id == pack_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    fn list_statements(&self, course_id: CourseId) -> CatalogRepoResult<Vec<Statement>> {
        let state = self.state.borrow();
        let mut items: Vec<Statement> = state
            .statements
            .values()
            .filter(|statement| statement.course_id == course_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    fn count_statements(&self, course_id: CourseId) -> CatalogRepoResult<u64> {
        let state = self.state.borrow();
        Ok(state
            .statements
            .values()
            .filter(|statement| statement.course_id == course_id)
            .count() as u64)
    }

    fn catalog_totals(&self) -> CatalogRepoResult<CatalogTotals> {
        let state = self.state.borrow();
        Ok(CatalogTotals {
            packs: state.packs.len() as u64,
            courses: state.courses.len() as u64,
            statements: state.statements.len() as u64,
        })
    }

    fn insert_pack(&self, pack: &Pack) -> CatalogRepoResult<Pack> {
        pack.validate()?;
        self.check_writable(pack.id)?;
        if let Some(parent_id) = pack.parent_id {
            self.ensure_parent(pack.id, pack.level, parent_id)?;
        }
        if self.state.borrow().packs.contains_key(&pack.id) {
            return Err(CatalogRepoError::InvalidData(format!(
                "duplicate pack id {}",
                pack.id
            )));
        }

        let now = self.tick();
        let mut stored = pack.clone();
        stored.created_at = now;
        stored.updated_at = now;
        self.state
            .borrow_mut()
            .packs
            .insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn insert_course(&self, course: &Course) -> CatalogRepoResult<()> {
        self.check_writable(course.id)?;
        self.ensure_course_owner(course.pack_id)?;
        let mut state = self.state.borrow_mut();
        if state.courses.contains_key(&course.id) {
            return Err(CatalogRepoError::InvalidData(format!(
                "duplicate course id {}",
                course.id
            )));
        }
        state.courses.insert(course.id, course.clone());
        Ok(())
    }

    fn insert_statement(&self, statement: &Statement) -> CatalogRepoResult<()> {
        self.check_writable(statement.id)?;
        let mut state = self.state.borrow_mut();
        if !state.courses.contains_key(&statement.course_id) {
            return Err(CatalogRepoError::CourseNotFound(statement.course_id));
        }
        if state.statements.contains_key(&statement.id) {
            return Err(CatalogRepoError::InvalidData(format!(
                "duplicate statement id {}",
                statement.id
            )));
        }
        state.statements.insert(statement.id, statement.clone());
        Ok(())
    }

    fn move_pack(&self, pack_id: PackId, new_parent_id: PackId) -> CatalogRepoResult<()> {
        self.check_writable(pack_id)?;
        let pack = self
            .get_pack(pack_id)?
            .ok_or(CatalogRepoError::PackNotFound(pack_id))?;
        if pack.parent_id == Some(new_parent_id) {
            return Ok(());
        }
        self.ensure_parent(pack_id, pack.level, new_parent_id)?;
        let now = self.tick();
        if let Some(stored) = self.state.borrow_mut().packs.get_mut(&pack_id) {
            stored.parent_id = Some(new_parent_id);
            stored.updated_at = now;
        }
        Ok(())
    }

    fn move_course(&self, course_id: CourseId, pack_id: PackId) -> CatalogRepoResult<()> {
        self.check_writable(course_id)?;
        let course = self
            .get_course(course_id)?
            .ok_or(CatalogRepoError::CourseNotFound(course_id))?;
        if course.pack_id == pack_id {
            return Ok(());
        }
        self.ensure_course_owner(pack_id)?;
        if let Some(stored) = self.state.borrow_mut().courses.get_mut(&course_id) {
            stored.pack_id = pack_id;
        }
        Ok(())
    }

    fn move_statement(
        &self,
        statement_id: StatementId,
        course_id: CourseId,
        order: i64,
    ) -> CatalogRepoResult<()> {
        self.check_writable(statement_id)?;
        let mut state = self.state.borrow_mut();
        if !state.courses.contains_key(&course_id) {
            return Err(CatalogRepoError::CourseNotFound(course_id));
        }
        let stored = state
            .statements
            .get_mut(&statement_id)
            .ok_or(CatalogRepoError::StatementNotFound(statement_id))?;
        stored.course_id = course_id;
        stored.order = order;
        Ok(())
    }

    fn set_pack_cover(&self, pack_id: PackId, cover: Option<&str>) -> CatalogRepoResult<()> {
        self.check_writable(pack_id)?;
        let now = self.tick();
        let mut state = self.state.borrow_mut();
        let stored = state
            .packs
            .get_mut(&pack_id)
            .ok_or(CatalogRepoError::PackNotFound(pack_id))?;
        stored.cover = cover.map(str::to_string);
        stored.updated_at = now;
        Ok(())
    }

    fn delete_pack(&self, pack_id: PackId) -> CatalogRepoResult<bool> {
        self.check_writable(pack_id)?;
        let mut state = self.state.borrow_mut();
        if !state.packs.contains_key(&pack_id) {
            return Ok(false);
        }
        let has_children = state
            .packs
            .values()
            .any(|pack| pack.parent_id == Some(pack_id));
        let has_courses = state
            .courses
            .values()
            .any(|course| course.pack_id == pack_id);
        if has_children || has_courses {
            return Err(CatalogRepoError::PackNotEmpty(pack_id));
        }
        state.packs.remove(&pack_id);
        Ok(true)
    }

    fn delete_course(&self, course_id: CourseId) -> CatalogRepoResult<bool> {
        self.check_writable(course_id)?;
        let mut state = self.state.borrow_mut();
        if !state.courses.contains_key(&course_id) {
            return Ok(false);
        }
        if state
            .statements
            .values()
            .any(|statement| statement.course_id == course_id)
        {
            return Err(CatalogRepoError::CourseNotEmpty(course_id));
        }
        state.courses.remove(&course_id);
        Ok(true)
    }

    fn begin_unit(&self) -> CatalogRepoResult<()> {
        let snapshot = self.state.borrow().clone();
        self.units.borrow_mut().push(snapshot);
        Ok(())
    }

    fn commit_unit(&self) -> CatalogRepoResult<()> {
        self.units
            .borrow_mut()
            .pop()
            .map(|_| ())
            .ok_or_else(|| CatalogRepoError::InvalidData("no open unit to commit".to_string()))
    }

    fn rollback_unit(&self) -> CatalogRepoResult<()> {
        let snapshot = self.units.borrow_mut().pop().ok_or_else(|| {
            CatalogRepoError::InvalidData("no open unit to roll back".to_string())
        })?;
        *self.state.borrow_mut() = snapshot;
        Ok(())
    }
}
