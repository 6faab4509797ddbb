use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    CourseId, CoursePackage, EnrollmentWindow, PackageEnrollment, PackageId, PackageSummary,
    StudentId, StudentPreferenceRecord, StudentRecord,
};

/// Read-only source of package and course definitions.
pub trait PackageCatalog: Send + Sync {
    fn package(&self, id: &PackageId) -> Result<Option<CoursePackage>, RepositoryError>;
}

/// Storage contract of the allocation core.
///
/// Implementations must serve [`AllocationStore::snapshot`] as a point-in-time read and apply
/// [`AllocationStore::commit`] as one atomic unit: after a failed commit no part of it may be
/// visible.
pub trait AllocationStore: PackageCatalog {
    fn snapshot(
        &self,
        package_id: &PackageId,
    ) -> Result<Option<AllocationSnapshot>, RepositoryError>;
    fn student(&self, id: &StudentId) -> Result<Option<StudentRecord>, RepositoryError>;
    /// Replaces the student's ranked list for one package, leaving other packages untouched.
    fn record_preferences(&self, record: StudentPreferenceRecord) -> Result<(), RepositoryError>;
    fn update_window(
        &self,
        package_id: &PackageId,
        window: EnrollmentWindow,
    ) -> Result<CoursePackage, RepositoryError>;
    fn commit(&self, commit: AllocationCommit) -> Result<CommitAck, RepositoryError>;
}

/// Consistent view of a package and every student record, taken at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationSnapshot {
    pub package: CoursePackage,
    /// Ordered by student id.
    pub students: Vec<StudentRecord>,
}

/// Whether a commit replaces or extends the package's previous allocation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitMode {
    /// Clears enrolled lists of competitive courses and the package's student enrollments first.
    Replace,
    Append,
}

/// Enrollment to write for a single student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentEnrollmentUpdate {
    pub student_id: StudentId,
    pub enrollment: PackageEnrollment,
}

/// Every record change produced by one allocation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationCommit {
    pub package_id: PackageId,
    pub mode: CommitMode,
    pub student_updates: Vec<StudentEnrollmentUpdate>,
    pub course_additions: BTreeMap<CourseId, Vec<StudentId>>,
    pub summary: PackageSummary,
}

/// Confirmation returned once a commit is visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAck {
    pub package_id: PackageId,
    pub committed_at: DateTime<Utc>,
    pub students_updated: usize,
    pub courses_updated: usize,
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("package {0} not found")]
    PackageNotFound(PackageId),
    #[error("student {0} not found")]
    StudentNotFound(StudentId),
    #[error("course {course_id} not found in package {package_id}")]
    CourseNotFound {
        package_id: PackageId,
        course_id: CourseId,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
