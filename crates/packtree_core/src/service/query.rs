//! Read-only catalog browsing.
//!
//! # Responsibility
//! - Serve hierarchy, pack, course and next-course lookups to outer layers.
//!
//! # Invariants
//! - Queries never write.
//! - Course navigation follows `order ASC, id ASC` inside one pack.

use crate::model::course::{Course, CourseId, Statement};
use crate::model::pack::{Pack, PackId, PackLevel};
use crate::repo::catalog_repo::{CatalogRepoError, CatalogRepository};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from catalog queries.
#[derive(Debug)]
pub enum QueryError {
    PackNotFound(PackId),
    CourseNotFound(CourseId),
    /// Course exists but belongs to another pack.
    CourseNotInPack { course_id: CourseId, pack_id: PackId },
    Repo(CatalogRepoError),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PackNotFound(id) => write!(f, "course pack not found: {id}"),
            Self::CourseNotFound(id) => write!(f, "course not found: {id}"),
            Self::CourseNotInPack { course_id, pack_id } => {
                write!(f, "course {course_id} does not belong to pack {pack_id}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CatalogRepoError> for QueryError {
    fn from(value: CatalogRepoError) -> Self {
        match value {
            CatalogRepoError::PackNotFound(id) => Self::PackNotFound(id),
            CatalogRepoError::CourseNotFound(id) => Self::CourseNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Node of the nested hierarchy view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackNode {
    pub pack: Pack,
    pub course_count: u64,
    pub children: Vec<PackNode>,
}

/// Course with its statement count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseSummary {
    pub course: Course,
    pub statement_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackWithCourses {
    pub pack: Pack,
    pub courses: Vec<CourseSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseWithStatements {
    pub course: Course,
    pub statements: Vec<Statement>,
}

/// Catalog query facade.
pub struct CatalogQueryService<R: CatalogRepository> {
    repo: R,
}

impl<R: CatalogRepository> CatalogQueryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Lists level-1 packs in display order.
    pub fn list_roots(&self) -> Result<Vec<Pack>, QueryError> {
        Ok(self.repo.list_child_packs(None, PackLevel::Catalog)?)
    }

    /// Lists direct child packs of `pack_id`.
    pub fn children(&self, pack_id: PackId) -> Result<Vec<Pack>, QueryError> {
        let pack = self.require_pack(pack_id)?;
        match pack.level.child() {
            Some(level) => Ok(self.repo.list_child_packs(Some(pack.id), level)?),
            None => Ok(Vec::new()),
        }
    }

    /// Builds the nested tree under `root_id`, or under every root.
    pub fn hierarchy(&self, root_id: Option<PackId>) -> Result<Vec<PackNode>, QueryError> {
        let roots = match root_id {
            Some(root_id) => vec![self.require_pack(root_id)?],
            None => self.list_roots()?,
        };
        roots.into_iter().map(|root| self.build_node(root)).collect()
    }

    /// Returns a pack and its courses with statement counts.
    pub fn pack_with_courses(&self, pack_id: PackId) -> Result<PackWithCourses, QueryError> {
        let pack = self.require_pack(pack_id)?;
        let mut courses = Vec::new();
        for course in self.repo.list_courses(pack.id)? {
            let statement_count = self.repo.count_statements(course.id)?;
            courses.push(CourseSummary {
                course,
                statement_count,
            });
        }
        Ok(PackWithCourses { pack, courses })
    }

    /// Returns a course of `pack_id` with its ordered statements.
    pub fn course_with_statements(
        &self,
        pack_id: PackId,
        course_id: CourseId,
    ) -> Result<CourseWithStatements, QueryError> {
        let course = self.require_course_in_pack(pack_id, course_id)?;
        let statements = self.repo.list_statements(course.id)?;
        Ok(CourseWithStatements { course, statements })
    }

    /// Returns the course after `course_id` inside `pack_id`, `None` at the end.
    pub fn next_course(
        &self,
        pack_id: PackId,
        course_id: CourseId,
    ) -> Result<Option<Course>, QueryError> {
        self.require_course_in_pack(pack_id, course_id)?;
        let courses = self.repo.list_courses(pack_id)?;
        Ok(courses
            .iter()
            .position(|course| course.id == course_id)
            .and_then(|index| courses.get(index + 1).cloned()))
    }

    fn build_node(&self, pack: Pack) -> Result<PackNode, QueryError> {
        let course_count = self.repo.list_courses(pack.id)?.len() as u64;
        let children = match pack.level.child() {
            Some(level) => self
                .repo
                .list_child_packs(Some(pack.id), level)?
                .into_iter()
                .map(|child| self.build_node(child))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        Ok(PackNode {
            pack,
            course_count,
            children,
        })
    }

    fn require_pack(&self, pack_id: PackId) -> Result<Pack, QueryError> {
        self.repo
            .get_pack(pack_id)?
            .ok_or(QueryError::PackNotFound(pack_id))
    }

    fn require_course_in_pack(
        &self,
        pack_id: PackId,
        course_id: CourseId,
    ) -> Result<Course, QueryError> {
        let course = self
            .repo
            .get_course(course_id)?
            .ok_or(QueryError::CourseNotFound(course_id))?;
        if course.pack_id != pack_id {
            return Err(QueryError::CourseNotInPack { course_id, pack_id });
        }
        Ok(course)
    }
}
