//! Catalog repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide single-entity read/write APIs over packs, courses and statements.
//! - Keep SQL details and ordering behavior inside the repository boundary.
//!
//! # Invariants
//! - Listings are deterministic: `sort_order ASC, id ASC`.
//! - Writes never change a pack's level; moves keep `parent.level = level - 1`.
//! - Non-empty packs/courses are never deleted, so no reference is orphaned.
//! - Moving a row to its current owner succeeds without side effects.
//! - Deleting a missing row returns `Ok(false)`.

use crate::db::migrations::{latest_version, CATALOG_SCHEMA};
use crate::db::DbError;
use crate::model::course::{Course, CourseId, Statement, StatementId};
use crate::model::pack::{Pack, PackId, PackLevel, PackValidationError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const PACK_SELECT_SQL: &str = "SELECT
    id,
    sort_order,
    title,
    description,
    is_free,
    cover,
    creator_id,
    share_level,
    parent_id,
    level,
    created_at,
    updated_at
FROM course_packs";

const COURSE_SELECT_SQL: &str = "SELECT
    id,
    sort_order,
    title,
    description,
    course_pack_id
FROM courses";

const STATEMENT_SELECT_SQL: &str = "SELECT
    id,
    sort_order,
    english,
    chinese,
    soundmark,
    course_id
FROM statements";

const UNIT_SAVEPOINT: &str = "packtree_unit";

/// Result type used by catalog repository operations.
pub type CatalogRepoResult<T> = Result<T, CatalogRepoError>;

/// Errors from catalog repository operations.
#[derive(Debug)]
pub enum CatalogRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Pack shape rejected before persistence.
    Validation(PackValidationError),
    PackNotFound(PackId),
    CourseNotFound(CourseId),
    StatementNotFound(StatementId),
    /// Parent is missing or not exactly one level above the pack.
    InvalidParent { pack_id: PackId, parent_id: PackId },
    /// Courses may only hang off level-2 or level-3 packs.
    CourseOwnerIsRoot(PackId),
    /// Pack still owns child packs or courses.
    PackNotEmpty(PackId),
    /// Course still owns statements.
    CourseNotEmpty(CourseId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Store refused the write (connectivity or injected failure).
    Unavailable(String),
}

impl Display for CatalogRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::PackNotFound(id) => write!(f, "course pack not found: {id}"),
            Self::CourseNotFound(id) => write!(f, "course not found: {id}"),
            Self::StatementNotFound(id) => write!(f, "statement not found: {id}"),
            Self::InvalidParent { pack_id, parent_id } => write!(
                f,
                "pack {parent_id} is not a valid parent for pack {pack_id}"
            ),
            Self::CourseOwnerIsRoot(id) => {
                write!(f, "level-1 pack {id} cannot own courses")
            }
            Self::PackNotEmpty(id) => write!(f, "course pack is not empty: {id}"),
            Self::CourseNotEmpty(id) => write!(f, "course still owns statements: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "catalog repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "catalog repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "catalog repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid catalog data: {message}"),
            Self::Unavailable(message) => write!(f, "catalog store unavailable: {message}"),
        }
    }
}

impl Error for CatalogRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for CatalogRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for CatalogRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<PackValidationError> for CatalogRepoError {
    fn from(value: PackValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Whole-catalog row counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogTotals {
    pub packs: u64,
    pub courses: u64,
    pub statements: u64,
}

/// Repository interface for the course catalog tree.
///
/// Every write touches one entity; multi-step operations are composed by
/// services. `begin_unit`/`commit_unit`/`rollback_unit` let a caller group
/// several writes into one all-or-nothing unit when it wants that guarantee.
pub trait CatalogRepository {
    /// Loads one pack by id.
    fn get_pack(&self, pack_id: PackId) -> CatalogRepoResult<Option<Pack>>;
    /// Lists packs at `level` under `parent_id` (`None` means roots).
    fn list_child_packs(
        &self,
        parent_id: Option<PackId>,
        level: PackLevel,
    ) -> CatalogRepoResult<Vec<Pack>>;
    /// Lists every pack stored at `level`, regardless of parent.
    fn list_packs_at_level(&self, level: PackLevel) -> CatalogRepoResult<Vec<Pack>>;
    /// Loads one course by id.
    fn get_course(&self, course_id: CourseId) -> CatalogRepoResult<Option<Course>>;
    /// Lists courses directly owned by one pack.
    fn list_courses(&self, pack_id: PackId) -> CatalogRepoResult<Vec<Course>>;
    /// Lists statements of one course.
    fn list_statements(&self, course_id: CourseId) -> CatalogRepoResult<Vec<Statement>>;
    /// Counts statements of one course.
    fn count_statements(&self, course_id: CourseId) -> CatalogRepoResult<u64>;
    /// Counts all rows of the catalog.
    fn catalog_totals(&self) -> CatalogRepoResult<CatalogTotals>;

    /// Inserts one pack after validating shape and parent level.
    fn insert_pack(&self, pack: &Pack) -> CatalogRepoResult<Pack>;
    /// Inserts one course under an existing non-root pack.
    fn insert_course(&self, course: &Course) -> CatalogRepoResult<()>;
    /// Inserts one statement under an existing course.
    fn insert_statement(&self, statement: &Statement) -> CatalogRepoResult<()>;

    /// Reattaches a pack to another parent one level above it.
    fn move_pack(&self, pack_id: PackId, new_parent_id: PackId) -> CatalogRepoResult<()>;
    /// Reassigns a course's owning pack.
    fn move_course(&self, course_id: CourseId, pack_id: PackId) -> CatalogRepoResult<()>;
    /// Reassigns a statement's owning course and order.
    fn move_statement(
        &self,
        statement_id: StatementId,
        course_id: CourseId,
        order: i64,
    ) -> CatalogRepoResult<()>;
    /// Replaces a pack's cover reference.
    fn set_pack_cover(&self, pack_id: PackId, cover: Option<&str>) -> CatalogRepoResult<()>;
    /// Deletes an empty pack. Returns `false` when it was already gone.
    fn delete_pack(&self, pack_id: PackId) -> CatalogRepoResult<bool>;
    /// Deletes an empty course. Returns `false` when it was already gone.
    fn delete_course(&self, course_id: CourseId) -> CatalogRepoResult<bool>;

    /// Opens a unit of work.
    fn begin_unit(&self) -> CatalogRepoResult<()>;
    /// Makes the writes of the innermost unit permanent.
    fn commit_unit(&self) -> CatalogRepoResult<()>;
    /// Discards the writes of the innermost unit.
    fn rollback_unit(&self) -> CatalogRepoResult<()>;
}

impl<T: CatalogRepository + ?Sized> CatalogRepository for &T {
    fn get_pack(&self, pack_id: PackId) -> CatalogRepoResult<Option<Pack>> {
        (**self).get_pack(pack_id)
    }
    fn list_child_packs(
        &self,
        parent_id: Option<PackId>,
        level: PackLevel,
    ) -> CatalogRepoResult<Vec<Pack>> {
        (**self).list_child_packs(parent_id, level)
    }
    fn list_packs_at_level(&self, level: PackLevel) -> CatalogRepoResult<Vec<Pack>> {
        (**self).list_packs_at_level(level)
    }
    fn get_course(&self, course_id: CourseId) -> CatalogRepoResult<Option<Course>> {
        (**self).get_course(course_id)
    }
    fn list_courses(&self, pack_id: PackId) -> CatalogRepoResult<Vec<Course>> {
        (**self).list_courses(pack_id)
    }
    fn list_statements(&self, course_id: CourseId) -> CatalogRepoResult<Vec<Statement>> {
        (**self).list_statements(course_id)
    }
    fn count_statements(&self, course_id: CourseId) -> CatalogRepoResult<u64> {
        (**self).count_statements(course_id)
    }
    fn catalog_totals(&self) -> CatalogRepoResult<CatalogTotals> {
        (**self).catalog_totals()
    }
    fn insert_pack(&self, pack: &Pack) -> CatalogRepoResult<Pack> {
        (**self).insert_pack(pack)
    }
    fn insert_course(&self, course: &Course) -> CatalogRepoResult<()> {
        (**self).insert_course(course)
    }
    fn insert_statement(&self, statement: &Statement) -> CatalogRepoResult<()> {
        (**self).insert_statement(statement)
    }
    fn move_pack(&self, pack_id: PackId, new_parent_id: PackId) -> CatalogRepoResult<()> {
        (**self).move_pack(pack_id, new_parent_id)
    }
    fn move_course(&self, course_id: CourseId, pack_id: PackId) -> CatalogRepoResult<()> {
        (**self).move_course(course_id, pack_id)
    }
    fn move_statement(
        &self,
        statement_id: StatementId,
        course_id: CourseId,
        order: i64,
    ) -> CatalogRepoResult<()> {
        (**self).move_statement(statement_id, course_id, order)
    }
    fn set_pack_cover(&self, pack_id: PackId, cover: Option<&str>) -> CatalogRepoResult<()> {
        (**self).set_pack_cover(pack_id, cover)
    }
    fn delete_pack(&self, pack_id: PackId) -> CatalogRepoResult<bool> {
        (**self).delete_pack(pack_id)
    }
    fn delete_course(&self, course_id: CourseId) -> CatalogRepoResult<bool> {
        (**self).delete_course(course_id)
    }
    fn begin_unit(&self) -> CatalogRepoResult<()> {
        (**self).begin_unit()
    }
    fn commit_unit(&self) -> CatalogRepoResult<()> {
        (**self).commit_unit()
    }
    fn rollback_unit(&self) -> CatalogRepoResult<()> {
        (**self).rollback_unit()
    }
}

/// SQLite-backed catalog repository.
pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> CatalogRepoResult<Self> {
        ensure_catalog_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn require_pack(&self, pack_id: PackId) -> CatalogRepoResult<Pack> {
        self.get_pack(pack_id)?
            .ok_or(CatalogRepoError::PackNotFound(pack_id))
    }

    fn ensure_parent(
        &self,
        pack_id: PackId,
        level: PackLevel,
        parent_id: PackId,
    ) -> CatalogRepoResult<()> {
        match self.get_pack(parent_id)? {
            Some(parent) if level.parent() == Some(parent.level) => Ok(()),
            _ => Err(CatalogRepoError::InvalidParent { pack_id, parent_id }),
        }
    }

    fn ensure_course_owner(&self, pack_id: PackId) -> CatalogRepoResult<()> {
        let owner = self.require_pack(pack_id)?;
        if owner.level == PackLevel::Catalog {
            return Err(CatalogRepoError::CourseOwnerIsRoot(pack_id));
        }
        Ok(())
    }

    fn query_packs(
        &self,
        sql: &str,
        bind: impl rusqlite::Params,
    ) -> CatalogRepoResult<Vec<Pack>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(bind)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_pack_row(row)?);
        }
        Ok(items)
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn get_pack(&self, pack_id: PackId) -> CatalogRepoResult<Option<Pack>> {
        let packs = self.query_packs(
            &format!("{PACK_SELECT_SQL} WHERE id = ?1;"),
            [pack_id.to_string()],
        )?;
        Ok(packs.into_iter().next())
    }

    fn list_child_packs(
        &self,
        parent_id: Option<PackId>,
        level: PackLevel,
    ) -> CatalogRepoResult<Vec<Pack>> {
        match parent_id {
            Some(parent_id) => self.query_packs(
                &format!(
                    "{PACK_SELECT_SQL}
                     WHERE parent_id = ?1
                       AND level = ?2
                     ORDER BY sort_order ASC, id ASC;"
                ),
                params![parent_id.to_string(), level.as_i64()],
            ),
            None => self.query_packs(
                &format!(
                    "{PACK_SELECT_SQL}
                     WHERE parent_id IS NULL
                       AND level = ?1
                     ORDER BY sort_order ASC, id ASC;"
                ),
                params![level.as_i64()],
            ),
        }
    }

    fn list_packs_at_level(&self, level: PackLevel) -> CatalogRepoResult<Vec<Pack>> {
        self.query_packs(
            &format!(
                "{PACK_SELECT_SQL}
                 WHERE level = ?1
                 ORDER BY sort_order ASC, id ASC;"
            ),
            params![level.as_i64()],
        )
    }

    fn get_course(&self, course_id: CourseId) -> CatalogRepoResult<Option<Course>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COURSE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([course_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_course_row(row)?));
        }
        Ok(None)
    }

    fn list_courses(&self, pack_id: PackId) -> CatalogRepoResult<Vec<Course>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COURSE_SELECT_SQL}
             WHERE course_pack_id = ?1
             ORDER BY sort_order ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([pack_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_course_row(row)?);
        }
        Ok(items)
    }

    fn list_statements(&self, course_id: CourseId) -> CatalogRepoResult<Vec<Statement>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STATEMENT_SELECT_SQL}
             WHERE course_id = ?1
             ORDER BY sort_order ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([course_id.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_statement_row(row)?);
        }
        Ok(items)
    }

    fn count_statements(&self, course_id: CourseId) -> CatalogRepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM statements WHERE course_id = ?1;",
            [course_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn catalog_totals(&self) -> CatalogRepoResult<CatalogTotals> {
        let (packs, courses, statements): (i64, i64, i64) = self.conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM course_packs),
                (SELECT COUNT(*) FROM courses),
                (SELECT COUNT(*) FROM statements);",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok(CatalogTotals {
            packs: packs.max(0) as u64,
            courses: courses.max(0) as u64,
            statements: statements.max(0) as u64,
        })
    }

    fn insert_pack(&self, pack: &Pack) -> CatalogRepoResult<Pack> {
        pack.validate()?;
        if let Some(parent_id) = pack.parent_id {
            self.ensure_parent(pack.id, pack.level, parent_id)?;
        }

        self.conn.execute(
            "INSERT INTO course_packs (
                id,
                sort_order,
                title,
                description,
                is_free,
                cover,
                creator_id,
                share_level,
                parent_id,
                level
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                pack.id.to_string(),
                pack.order,
                pack.title.as_str(),
                pack.description.as_str(),
                bool_to_int(pack.is_free),
                pack.cover.as_deref(),
                pack.creator_id.as_str(),
                pack.share_level.as_str(),
                pack.parent_id.map(|value| value.to_string()),
                pack.level.as_i64(),
            ],
        )?;
        self.require_pack(pack.id)
    }

    fn insert_course(&self, course: &Course) -> CatalogRepoResult<()> {
        self.ensure_course_owner(course.pack_id)?;
        self.conn.execute(
            "INSERT INTO courses (id, sort_order, title, description, course_pack_id)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                course.id.to_string(),
                course.order,
                course.title.as_str(),
                course.description.as_str(),
                course.pack_id.to_string(),
            ],
        )?;
        Ok(())
    }

    fn insert_statement(&self, statement: &Statement) -> CatalogRepoResult<()> {
        if self.get_course(statement.course_id)?.is_none() {
            return Err(CatalogRepoError::CourseNotFound(statement.course_id));
        }
        self.conn.execute(
            "INSERT INTO statements (id, sort_order, english, chinese, soundmark, course_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                statement.id.to_string(),
                statement.order,
                statement.english.as_str(),
                statement.chinese.as_str(),
                statement.soundmark.as_str(),
                statement.course_id.to_string(),
            ],
        )?;
        Ok(())
    }

    fn move_pack(&self, pack_id: PackId, new_parent_id: PackId) -> CatalogRepoResult<()> {
        let pack = self.require_pack(pack_id)?;
        if pack.parent_id == Some(new_parent_id) {
            return Ok(());
        }
        self.ensure_parent(pack_id, pack.level, new_parent_id)?;
        self.conn.execute(
            "UPDATE course_packs
             SET parent_id = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![pack_id.to_string(), new_parent_id.to_string()],
        )?;
        Ok(())
    }

    fn move_course(&self, course_id: CourseId, pack_id: PackId) -> CatalogRepoResult<()> {
        let course = self
            .get_course(course_id)?
            .ok_or(CatalogRepoError::CourseNotFound(course_id))?;
        if course.pack_id == pack_id {
            return Ok(());
        }
        self.ensure_course_owner(pack_id)?;
        self.conn.execute(
            "UPDATE courses SET course_pack_id = ?2 WHERE id = ?1;",
            params![course_id.to_string(), pack_id.to_string()],
        )?;
        Ok(())
    }

    fn move_statement(
        &self,
        statement_id: StatementId,
        course_id: CourseId,
        order: i64,
    ) -> CatalogRepoResult<()> {
        if self.get_course(course_id)?.is_none() {
            return Err(CatalogRepoError::CourseNotFound(course_id));
        }
        let changed = self.conn.execute(
            "UPDATE statements SET course_id = ?2, sort_order = ?3 WHERE id = ?1;",
            params![statement_id.to_string(), course_id.to_string(), order],
        )?;
        if changed == 0 {
            return Err(CatalogRepoError::StatementNotFound(statement_id));
        }
        Ok(())
    }

    fn set_pack_cover(&self, pack_id: PackId, cover: Option<&str>) -> CatalogRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE course_packs
             SET cover = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![pack_id.to_string(), cover],
        )?;
        if changed == 0 {
            return Err(CatalogRepoError::PackNotFound(pack_id));
        }
        Ok(())
    }

    fn delete_pack(&self, pack_id: PackId) -> CatalogRepoResult<bool> {
        let (exists, has_children, has_courses): (i64, i64, i64) = self.conn.query_row(
            "SELECT
                EXISTS(SELECT 1 FROM course_packs WHERE id = ?1),
                EXISTS(SELECT 1 FROM course_packs WHERE parent_id = ?1),
                EXISTS(SELECT 1 FROM courses WHERE course_pack_id = ?1);",
            [pack_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        if exists == 0 {
            return Ok(false);
        }
        if has_children == 1 || has_courses == 1 {
            return Err(CatalogRepoError::PackNotEmpty(pack_id));
        }
        self.conn.execute(
            "DELETE FROM course_packs WHERE id = ?1;",
            [pack_id.to_string()],
        )?;
        Ok(true)
    }

    fn delete_course(&self, course_id: CourseId) -> CatalogRepoResult<bool> {
        let (exists, has_statements): (i64, i64) = self.conn.query_row(
            "SELECT
                EXISTS(SELECT 1 FROM courses WHERE id = ?1),
                EXISTS(SELECT 1 FROM statements WHERE course_id = ?1);",
            [course_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if exists == 0 {
            return Ok(false);
        }
        if has_statements == 1 {
            return Err(CatalogRepoError::CourseNotEmpty(course_id));
        }
        self.conn
            .execute("DELETE FROM courses WHERE id = ?1;", [course_id.to_string()])?;
        Ok(true)
    }

    fn begin_unit(&self) -> CatalogRepoResult<()> {
        self.conn
            .execute_batch(&format!("SAVEPOINT {UNIT_SAVEPOINT};"))?;
        Ok(())
    }

    fn commit_unit(&self) -> CatalogRepoResult<()> {
        self.conn
            .execute_batch(&format!("RELEASE SAVEPOINT {UNIT_SAVEPOINT};"))?;
        Ok(())
    }

    fn rollback_unit(&self) -> CatalogRepoResult<()> {
        self.conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {UNIT_SAVEPOINT};
             RELEASE SAVEPOINT {UNIT_SAVEPOINT};"
        ))?;
        Ok(())
    }
}

fn parse_pack_row(row: &Row<'_>) -> CatalogRepoResult<Pack> {
    let id_text: String = row.get("id")?;
    let parent_id = row
        .get::<_, Option<String>>("parent_id")?
        .map(|value| parse_uuid(&value, "course_packs.parent_id"))
        .transpose()?;
    let level_value: i64 = row.get("level")?;
    let level = PackLevel::from_i64(level_value).ok_or_else(|| {
        CatalogRepoError::InvalidData(format!(
            "invalid level `{level_value}` in course_packs.level"
        ))
    })?;

    Ok(Pack {
        id: parse_uuid(&id_text, "course_packs.id")?,
        title: row.get("title")?,
        level,
        parent_id,
        order: row.get("sort_order")?,
        description: row.get("description")?,
        cover: row.get("cover")?,
        is_free: int_to_bool(row.get("is_free")?, "course_packs.is_free")?,
        share_level: row.get("share_level")?,
        creator_id: row.get("creator_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_course_row(row: &Row<'_>) -> CatalogRepoResult<Course> {
    let id_text: String = row.get("id")?;
    let pack_text: String = row.get("course_pack_id")?;
    Ok(Course {
        id: parse_uuid(&id_text, "courses.id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        order: row.get("sort_order")?,
        pack_id: parse_uuid(&pack_text, "courses.course_pack_id")?,
    })
}

fn parse_statement_row(row: &Row<'_>) -> CatalogRepoResult<Statement> {
    let id_text: String = row.get("id")?;
    let course_text: String = row.get("course_id")?;
    Ok(Statement {
        id: parse_uuid(&id_text, "statements.id")?,
        order: row.get("sort_order")?,
        english: row.get("english")?,
        chinese: row.get("chinese")?,
        soundmark: row.get("soundmark")?,
        course_id: parse_uuid(&course_text, "statements.course_id")?,
    })
}

fn parse_uuid(value: &str, column: &'static str) -> CatalogRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| CatalogRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

fn int_to_bool(value: i64, column: &'static str) -> CatalogRepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CatalogRepoError::InvalidData(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}

fn ensure_catalog_connection_ready(conn: &Connection) -> CatalogRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(CatalogRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in CATALOG_SCHEMA {
        if !table_exists(conn, table)? {
            return Err(CatalogRepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(CatalogRepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> CatalogRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> CatalogRepoResult<bool> {
    let found: Option<String> = conn
        .query_row(
            &format!("SELECT name FROM pragma_table_info('{table}') WHERE name = ?1;"),
            [column],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}
