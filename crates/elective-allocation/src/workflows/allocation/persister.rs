use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::domain::{AllocationStatus, CoursePackage, PackageEnrollment, PackageSummary};
use super::engine::AllocationResult;
use super::repository::{
    AllocationCommit, AllocationStore, CommitAck, CommitMode, RepositoryError,
    StudentEnrollmentUpdate,
};

/// Projects an [`AllocationResult`] onto storage records and hands them to the store as a
/// single commit. No allocation logic lives here.
pub struct ResultPersister<S> {
    store: Arc<S>,
}

impl<S> ResultPersister<S>
where
    S: AllocationStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn commit(
        &self,
        package: &CoursePackage,
        result: &AllocationResult,
        mode: CommitMode,
        run_at: DateTime<Utc>,
    ) -> Result<CommitAck, RepositoryError> {
        self.store.commit(project(package, result, mode, run_at))
    }
}

pub fn project(
    package: &CoursePackage,
    result: &AllocationResult,
    mode: CommitMode,
    run_at: DateTime<Utc>,
) -> AllocationCommit {
    let mut student_updates =
        Vec::with_capacity(result.assignments.len() + result.unallocated.len());
    let mut course_additions: BTreeMap<_, Vec<_>> = BTreeMap::new();

    for assignment in &result.assignments {
        student_updates.push(StudentEnrollmentUpdate {
            student_id: assignment.student_id.clone(),
            enrollment: PackageEnrollment {
                course_id: Some(assignment.course_id.clone()),
                status: AllocationStatus::Allocated,
            },
        });
        course_additions
            .entry(assignment.course_id.clone())
            .or_default()
            .push(assignment.student_id.clone());
    }

    for student_id in &result.unallocated {
        student_updates.push(StudentEnrollmentUpdate {
            student_id: student_id.clone(),
            enrollment: PackageEnrollment {
                course_id: None,
                status: AllocationStatus::Unallocated,
            },
        });
    }

    AllocationCommit {
        package_id: package.id.clone(),
        mode,
        student_updates,
        course_additions,
        summary: PackageSummary {
            processed: true,
            last_run_at: Some(run_at),
            allocated: result.allocated_count(),
            unallocated: result.unallocated_count(),
            rank_histogram: result.rank_histogram.clone(),
        },
    }
}
