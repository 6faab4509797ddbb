use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    AcademicCycle, AcademicYear, AllocationStatus, CourseId, CoursePackage, EnrollmentWindow,
    PackageId, PackageSummary, StudentId, StudentPreferenceRecord, StudentRecord,
    ValidationError,
};
use super::engine::{AllocationCandidate, AllocationEngine, Assignment, EngineError};
use super::lease::{LeaseError, PackageLeases};
use super::persister::ResultPersister;
use super::preferences::PreferenceResolver;
use super::priority::PriorityCalculator;
use super::repository::{AllocationStore, CommitMode, RepositoryError};
use super::window::{PeriodGate, WindowStatus, WindowStatusView};

/// How a run treats allocations left behind by a previous run of the same package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerunPolicy {
    /// Clear earlier allocations in the same commit; repeated runs give identical results.
    #[default]
    Reset,
    /// Keep earlier allocations, count their seats as taken and skip already placed students.
    Additive,
}

impl RerunPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reset" | "replace" => Some(Self::Reset),
            "additive" | "append" => Some(Self::Additive),
            _ => None,
        }
    }

    fn commit_mode(self) -> CommitMode {
        match self {
            RerunPolicy::Reset => CommitMode::Replace,
            RerunPolicy::Additive => CommitMode::Append,
        }
    }
}

/// Tunables of the allocation workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationSettings {
    pub rerun_policy: RerunPolicy,
    /// Month (1-12) in which an academic calendar cycle begins.
    pub cycle_start_month: u32,
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            rerun_policy: RerunPolicy::Reset,
            cycle_start_month: 9,
        }
    }
}

/// Non-fatal conditions reported alongside a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllocationWarning {
    /// No student had resolvable preferences for the package.
    EmptyInput { package_id: PackageId },
}

/// Summary returned to the administrator after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationReport {
    pub package_id: PackageId,
    pub run_at: DateTime<Utc>,
    pub rerun_policy: RerunPolicy,
    pub allocated: usize,
    pub unallocated: usize,
    /// Cohort students left out because no preference data resolved for the package.
    pub excluded: usize,
    pub skipped_preferences: usize,
    pub remaining_capacity: BTreeMap<CourseId, u32>,
    pub rank_histogram: BTreeMap<CourseId, BTreeMap<usize, u32>>,
    pub assignments: Vec<Assignment>,
    pub unallocated_students: BTreeSet<StudentId>,
    pub warnings: Vec<AllocationWarning>,
}

/// Per-course occupancy as seen by readers of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseView {
    pub course_id: CourseId,
    pub name: String,
    pub capacity: Option<u32>,
    pub enrolled: usize,
}

/// Package metadata and the summary of its latest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageView {
    pub package_id: PackageId,
    pub target_year: AcademicYear,
    pub window_status: WindowStatus,
    pub courses: Vec<CourseView>,
    pub summary: PackageSummary,
}

/// Facade composing the store, the lease registry and the allocation pipeline.
pub struct AllocationService<S> {
    store: Arc<S>,
    leases: PackageLeases,
    gate: PeriodGate,
    resolver: PreferenceResolver,
    engine: AllocationEngine,
    persister: ResultPersister<S>,
    settings: AllocationSettings,
}

impl<S> AllocationService<S>
where
    S: AllocationStore + 'static,
{
    pub fn new(store: Arc<S>, settings: AllocationSettings) -> Self {
        Self::with_leases(store, PackageLeases::default(), settings)
    }

    pub fn with_leases(store: Arc<S>, leases: PackageLeases, settings: AllocationSettings) -> Self {
        let persister = ResultPersister::new(Arc::clone(&store));
        Self {
            store,
            leases,
            gate: PeriodGate,
            resolver: PreferenceResolver,
            engine: AllocationEngine,
            persister,
            settings,
        }
    }

    pub fn settings(&self) -> AllocationSettings {
        self.settings
    }

    /// Read, score, match and commit one package while holding its lease.
    ///
    /// Only the package's cohort takes part. Not gated by the enrollment window.
    pub fn run_allocation(
        &self,
        package_id: &PackageId,
        now: DateTime<Utc>,
    ) -> Result<AllocationReport, AllocationServiceError> {
        let _lease = self.leases.acquire(package_id)?;
        let policy = self.settings.rerun_policy;

        let snapshot = self
            .store
            .snapshot(package_id)
            .map_err(|source| AllocationServiceError::repository(package_id, source))?
            .ok_or_else(|| AllocationServiceError::PackageNotFound {
                package_id: package_id.clone(),
            })?;

        let mut package = snapshot.package;
        if policy == RerunPolicy::Reset {
            for course in package.courses.iter_mut().filter(|course| course.is_competitive()) {
                course.enrolled.clear();
            }
        }

        let calculator = PriorityCalculator::new(AcademicCycle::containing(
            now.date_naive(),
            self.settings.cycle_start_month,
        ));

        let mut candidates = Vec::new();
        let mut excluded = 0;
        let cohort = snapshot
            .students
            .iter()
            .filter(|student| package.admits(&student.profile));
        for student in cohort {
            if policy == RerunPolicy::Additive && already_allocated(student, package_id) {
                continue;
            }

            match self
                .resolver
                .resolve(student.id(), &student.preferences, package_id)
            {
                Some(resolved) => candidates.push(AllocationCandidate {
                    student_id: resolved.student_id,
                    score: calculator.score_for(&student.profile, package.target_year),
                    preferences: resolved.courses,
                }),
                None => excluded += 1,
            }
        }

        let mut warnings = Vec::new();
        if candidates.is_empty() {
            warn!(%package_id, "no students with resolvable preferences; all seats stay open");
            warnings.push(AllocationWarning::EmptyInput {
                package_id: package_id.clone(),
            });
        }

        let result = self.engine.allocate(&package, candidates).map_err(|error| match error {
            EngineError::EmptyPackage { package_id } => {
                AllocationServiceError::EmptyPackage { package_id }
            }
        })?;

        let ack = self
            .persister
            .commit(&package, &result, policy.commit_mode(), now)
            .map_err(|source| AllocationServiceError::Persistence {
                package_id: package_id.clone(),
                source,
            })?;

        info!(
            %package_id,
            allocated = result.allocated_count(),
            unallocated = result.unallocated_count(),
            excluded,
            students_updated = ack.students_updated,
            "allocation committed"
        );

        Ok(AllocationReport {
            package_id: package_id.clone(),
            run_at: now,
            rerun_policy: policy,
            allocated: result.allocated_count(),
            unallocated: result.unallocated_count(),
            excluded,
            skipped_preferences: result.skipped_preferences,
            remaining_capacity: result.remaining_capacity,
            rank_histogram: result.rank_histogram,
            assignments: result.assignments,
            unallocated_students: result.unallocated,
            warnings,
        })
    }

    pub fn window_status(
        &self,
        package_id: &PackageId,
        now: DateTime<Utc>,
    ) -> Result<WindowStatusView, AllocationServiceError> {
        let package = self.require_package(package_id)?;
        Ok(WindowStatusView {
            package_id: package.id,
            start: package.window.start,
            end: package.window.end,
            status: self.gate.status(&package.window, now),
            evaluated_at: now,
        })
    }

    /// Administrative setter for the submission window.
    pub fn set_window(
        &self,
        package_id: &PackageId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<EnrollmentWindow, AllocationServiceError> {
        let window = EnrollmentWindow::new(start, end)
            .map_err(|source| AllocationServiceError::validation(package_id, source))?;

        let updated = self
            .store
            .update_window(package_id, window)
            .map_err(|source| AllocationServiceError::repository(package_id, source))?;

        info!(%package_id, start = ?window.start, end = ?window.end, "enrollment window updated");
        Ok(updated.window)
    }

    /// Replace a student's ranked list for one package while the window is open.
    pub fn submit_preferences(
        &self,
        package_id: &PackageId,
        student_id: &StudentId,
        courses: Vec<CourseId>,
        now: DateTime<Utc>,
    ) -> Result<StudentPreferenceRecord, AllocationServiceError> {
        let package = self.require_package(package_id)?;

        let status = self.gate.status(&package.window, now);
        if status != WindowStatus::Open {
            return Err(AllocationServiceError::WindowClosed {
                package_id: package_id.clone(),
                status,
            });
        }

        let student = self
            .store
            .student(student_id)
            .map_err(|source| AllocationServiceError::repository(package_id, source))?
            .ok_or_else(|| AllocationServiceError::StudentNotFound {
                package_id: package_id.clone(),
                student_id: student_id.clone(),
            })?;
        if !package.admits(&student.profile) {
            return Err(AllocationServiceError::validation(
                package_id,
                ValidationError::OutsideCohort {
                    package_id: package_id.clone(),
                    student_id: student_id.clone(),
                    year: student.profile.year,
                },
            ));
        }

        let mut seen = HashSet::with_capacity(courses.len());
        for course_id in &courses {
            if !package.contains_course(course_id) {
                return Err(AllocationServiceError::validation(
                    package_id,
                    ValidationError::UnknownCourse {
                        package_id: package_id.clone(),
                        course_id: course_id.clone(),
                    },
                ));
            }
            if !seen.insert(course_id) {
                return Err(AllocationServiceError::validation(
                    package_id,
                    ValidationError::DuplicateCourse {
                        package_id: package_id.clone(),
                        course_id: course_id.clone(),
                    },
                ));
            }
        }

        let record = StudentPreferenceRecord {
            student_id: student_id.clone(),
            package_id: package_id.clone(),
            courses,
        };
        self.store
            .record_preferences(record.clone())
            .map_err(|source| AllocationServiceError::repository(package_id, source))?;

        info!(%package_id, %student_id, ranked = record.courses.len(), "preferences recorded");
        Ok(record)
    }

    pub fn package_view(
        &self,
        package_id: &PackageId,
        now: DateTime<Utc>,
    ) -> Result<PackageView, AllocationServiceError> {
        let package = self.require_package(package_id)?;
        let window_status = self.gate.status(&package.window, now);
        let courses = package
            .courses
            .iter()
            .map(|course| CourseView {
                course_id: course.id.clone(),
                name: course.name.clone(),
                capacity: course.capacity,
                enrolled: course.enrolled.len(),
            })
            .collect();

        Ok(PackageView {
            package_id: package.id,
            target_year: package.target_year,
            window_status,
            courses,
            summary: package.summary,
        })
    }

    fn require_package(&self, package_id: &PackageId) -> Result<CoursePackage, AllocationServiceError> {
        self.store
            .package(package_id)
            .map_err(|source| AllocationServiceError::repository(package_id, source))?
            .ok_or_else(|| AllocationServiceError::PackageNotFound {
                package_id: package_id.clone(),
            })
    }
}

fn already_allocated(student: &StudentRecord, package_id: &PackageId) -> bool {
    student
        .enrollment(package_id)
        .map(|enrollment| enrollment.status == AllocationStatus::Allocated)
        .unwrap_or(false)
}

/// Error raised by the allocation service. Every variant names the package involved.
#[derive(Debug, thiserror::Error)]
pub enum AllocationServiceError {
    #[error("package {package_id} not found")]
    PackageNotFound { package_id: PackageId },
    #[error("student {student_id} not found for package {package_id}")]
    StudentNotFound {
        package_id: PackageId,
        student_id: StudentId,
    },
    #[error("package {package_id} has no courses")]
    EmptyPackage { package_id: PackageId },
    #[error("invalid request for package {package_id}: {source}")]
    Validation {
        package_id: PackageId,
        source: ValidationError,
    },
    #[error("enrollment window for package {package_id} is {status}")]
    WindowClosed {
        package_id: PackageId,
        status: WindowStatus,
    },
    #[error(transparent)]
    Lease(#[from] LeaseError),
    #[error("allocation for package {package_id} was not committed: {source}")]
    Persistence {
        package_id: PackageId,
        source: RepositoryError,
    },
    #[error("store error for package {package_id}: {source}")]
    Repository {
        package_id: PackageId,
        source: RepositoryError,
    },
}

impl AllocationServiceError {
    fn validation(package_id: &PackageId, source: ValidationError) -> Self {
        Self::Validation {
            package_id: package_id.clone(),
            source,
        }
    }

    /// Store lookups that report a missing record surface as not-found errors.
    fn repository(package_id: &PackageId, source: RepositoryError) -> Self {
        match source {
            RepositoryError::PackageNotFound(package_id) => Self::PackageNotFound { package_id },
            RepositoryError::StudentNotFound(student_id) => Self::StudentNotFound {
                package_id: package_id.clone(),
                student_id,
            },
            other => Self::Repository {
                package_id: package_id.clone(),
                source: other,
            },
        }
    }

    pub fn package_id(&self) -> &PackageId {
        match self {
            Self::PackageNotFound { package_id }
            | Self::StudentNotFound { package_id, .. }
            | Self::EmptyPackage { package_id }
            | Self::Validation { package_id, .. }
            | Self::WindowClosed { package_id, .. }
            | Self::Persistence { package_id, .. }
            | Self::Repository { package_id, .. } => package_id,
            Self::Lease(LeaseError::Held(package_id)) => package_id,
        }
    }
}
