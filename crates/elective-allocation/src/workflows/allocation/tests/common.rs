use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::allocation::domain::{
    AcademicCycle, AcademicYear, Course, CourseId, CoursePackage, EnrollmentWindow,
    GradeRecord, PackageId, PackageSummary, StudentAcademicProfile, StudentId,
    StudentPreferenceRecord, StudentRecord,
};
use crate::workflows::allocation::engine::AllocationCandidate;
use crate::workflows::allocation::priority::PriorityScore;
use crate::workflows::allocation::repository::{
    AllocationCommit, AllocationSnapshot, AllocationStore, CommitAck, PackageCatalog,
    RepositoryError,
};
use crate::workflows::allocation::service::{AllocationService, AllocationSettings, RerunPolicy};
use crate::workflows::allocation::store::InMemoryAllocationStore;

pub(super) const PACKAGE: &str = "pkg-2025-ii";
pub(super) const OTHER_PACKAGE: &str = "pkg-2025-iii";

pub(super) fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Inside the fixture window and inside the 2025-2026 cycle.
pub(super) fn now() -> DateTime<Utc> {
    at(5, 12)
}

pub(super) fn package_id() -> PackageId {
    PackageId::from(PACKAGE)
}

pub(super) fn course(id: &str, capacity: Option<u32>) -> Course {
    Course {
        id: CourseId::from(id),
        name: format!("Course {id}"),
        capacity,
        enrolled: Vec::new(),
    }
}

pub(super) fn package(courses: Vec<Course>) -> CoursePackage {
    CoursePackage {
        id: package_id(),
        target_year: AcademicYear::Second,
        courses,
        window: open_window(),
        summary: PackageSummary::default(),
    }
}

/// Third-year package sharing the store; its course `x` already seats `t0`.
pub(super) fn other_package() -> CoursePackage {
    let mut x = course("x", Some(2));
    x.enrolled.push(StudentId::from("t0"));
    CoursePackage {
        id: PackageId::from(OTHER_PACKAGE),
        target_year: AcademicYear::Third,
        courses: vec![x],
        window: open_window(),
        summary: PackageSummary::default(),
    }
}

pub(super) fn open_window() -> EnrollmentWindow {
    EnrollmentWindow::new(Some(at(1, 8)), Some(at(10, 18))).expect("valid window")
}

pub(super) fn ids(values: &[&str]) -> Vec<CourseId> {
    values.iter().map(|value| CourseId::from(*value)).collect()
}

pub(super) fn candidate(id: &str, score: f64, prefs: &[&str]) -> AllocationCandidate {
    AllocationCandidate {
        student_id: StudentId::from(id),
        score: PriorityScore::new(score),
        preferences: ids(prefs),
    }
}

/// Second-year-package student whose priority comes from 2025-2026 first-year grades.
pub(super) fn student(id: &str, grade: f64, prefs: &[&str]) -> StudentRecord {
    let mut record = StudentRecord::new(StudentAcademicProfile {
        student_id: StudentId::from(id),
        year: AcademicYear::Second,
        first_semester_average: None,
        general_average: Some(5.0),
        grade_history: vec![GradeRecord {
            study_year: AcademicYear::First,
            cycle: AcademicCycle::new(2025),
            grade,
        }],
    });
    if !prefs.is_empty() {
        record
            .preferences
            .by_package
            .insert(package_id(), ids(prefs));
    }
    record
}

pub(super) fn third_year(mut record: StudentRecord) -> StudentRecord {
    record.profile.year = AcademicYear::Third;
    record
}

pub(super) fn store(courses: Vec<Course>, students: Vec<StudentRecord>) -> InMemoryAllocationStore {
    InMemoryAllocationStore::with_records(vec![package(courses)], students)
}

pub(super) fn service_for<S: AllocationStore + 'static>(store: Arc<S>) -> AllocationService<S> {
    AllocationService::new(store, AllocationSettings::default())
}

pub(super) fn additive_service_for<S: AllocationStore + 'static>(
    store: Arc<S>,
) -> AllocationService<S> {
    AllocationService::new(
        store,
        AllocationSettings {
            rerun_policy: RerunPolicy::Additive,
            ..AllocationSettings::default()
        },
    )
}

/// Store whose commits always fail after reading succeeded.
pub(super) struct FailingCommitStore {
    pub(super) inner: InMemoryAllocationStore,
}

impl PackageCatalog for FailingCommitStore {
    fn package(&self, id: &PackageId) -> Result<Option<CoursePackage>, RepositoryError> {
        self.inner.package(id)
    }
}

impl AllocationStore for FailingCommitStore {
    fn snapshot(
        &self,
        package_id: &PackageId,
    ) -> Result<Option<AllocationSnapshot>, RepositoryError> {
        self.inner.snapshot(package_id)
    }

    fn student(&self, id: &StudentId) -> Result<Option<StudentRecord>, RepositoryError> {
        self.inner.student(id)
    }

    fn record_preferences(&self, record: StudentPreferenceRecord) -> Result<(), RepositoryError> {
        self.inner.record_preferences(record)
    }

    fn update_window(
        &self,
        package_id: &PackageId,
        window: EnrollmentWindow,
    ) -> Result<CoursePackage, RepositoryError> {
        self.inner.update_window(package_id, window)
    }

    fn commit(&self, _commit: AllocationCommit) -> Result<CommitAck, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
