//! Priority-ordered allocation of students to the courses of an optional-course package.
//!
//! The pipeline reads a point-in-time snapshot from an [`AllocationStore`], resolves every
//! student's ranked list, scores students, runs the greedy [`AllocationEngine`] and hands the
//! outcome to the [`ResultPersister`] as one atomic commit. [`AllocationService`] ties the steps
//! together behind a per-package lease.

pub mod domain;
pub mod engine;
pub mod lease;
pub mod persister;
pub mod preferences;
pub mod priority;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub mod window;

#[cfg(test)]
mod tests;

pub use domain::{
    AcademicCycle, AcademicYear, AllocationStatus, Course, CourseId, CoursePackage,
    EnrollmentWindow, GradeRecord, PackageEnrollment, PackageId, PackageSummary,
    RawPreferenceData, StudentAcademicProfile, StudentId, StudentPreferenceRecord, StudentRecord,
    ValidationError,
};
pub use engine::{AllocationCandidate, AllocationEngine, AllocationResult, Assignment, EngineError};
pub use lease::{LeaseError, PackageLease, PackageLeases};
pub use persister::ResultPersister;
pub use preferences::{PreferenceResolver, PreferenceShapeKind, ResolvedPreferences};
pub use priority::{PriorityCalculator, PriorityScore, ScoreSource};
pub use repository::{
    AllocationCommit, AllocationSnapshot, AllocationStore, CommitAck, CommitMode, PackageCatalog,
    RepositoryError, StudentEnrollmentUpdate,
};
pub use router::{allocation_router, PreferenceSubmission, WindowUpdate};
pub use service::{
    AllocationReport, AllocationService, AllocationServiceError, AllocationSettings,
    AllocationWarning, CourseView, PackageView, RerunPolicy,
};
pub use store::InMemoryAllocationStore;
pub use window::{PeriodGate, WindowStatus, WindowStatusView};
