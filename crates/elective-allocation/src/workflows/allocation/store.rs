use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::domain::{
    CoursePackage, EnrollmentWindow, PackageId, StudentId, StudentPreferenceRecord, StudentRecord,
};
use super::repository::{
    AllocationCommit, AllocationSnapshot, AllocationStore, CommitAck, CommitMode, PackageCatalog,
    RepositoryError,
};

#[derive(Debug, Clone, Default)]
struct StoreState {
    packages: BTreeMap<PackageId, CoursePackage>,
    students: BTreeMap<StudentId, StudentRecord>,
}

/// Process-local store backing the CLI, the demo server and the tests.
///
/// Every operation runs under one lock. Commits are staged on a copy of the state and swapped in
/// only when every change applied cleanly.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAllocationStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryAllocationStore {
    pub fn with_records<P, S>(packages: P, students: S) -> Self
    where
        P: IntoIterator<Item = CoursePackage>,
        S: IntoIterator<Item = StudentRecord>,
    {
        let state = StoreState {
            packages: packages
                .into_iter()
                .map(|package| (package.id.clone(), package))
                .collect(),
            students: students
                .into_iter()
                .map(|student| (student.id().clone(), student))
                .collect(),
        };

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn package_ids(&self) -> Result<Vec<PackageId>, RepositoryError> {
        Ok(self.lock()?.packages.keys().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl PackageCatalog for InMemoryAllocationStore {
    fn package(&self, id: &PackageId) -> Result<Option<CoursePackage>, RepositoryError> {
        Ok(self.lock()?.packages.get(id).cloned())
    }
}

impl AllocationStore for InMemoryAllocationStore {
    fn snapshot(
        &self,
        package_id: &PackageId,
    ) -> Result<Option<AllocationSnapshot>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard
            .packages
            .get(package_id)
            .map(|package| AllocationSnapshot {
                package: package.clone(),
                students: guard.students.values().cloned().collect(),
            }))
    }

    fn student(&self, id: &StudentId) -> Result<Option<StudentRecord>, RepositoryError> {
        Ok(self.lock()?.students.get(id).cloned())
    }

    fn record_preferences(&self, record: StudentPreferenceRecord) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        if !guard.packages.contains_key(&record.package_id) {
            return Err(RepositoryError::PackageNotFound(record.package_id));
        }
        let student = guard
            .students
            .get_mut(&record.student_id)
            .ok_or_else(|| RepositoryError::StudentNotFound(record.student_id.clone()))?;
        student
            .preferences
            .by_package
            .insert(record.package_id, record.courses);
        Ok(())
    }

    fn update_window(
        &self,
        package_id: &PackageId,
        window: EnrollmentWindow,
    ) -> Result<CoursePackage, RepositoryError> {
        let mut guard = self.lock()?;
        let package = guard
            .packages
            .get_mut(package_id)
            .ok_or_else(|| RepositoryError::PackageNotFound(package_id.clone()))?;
        package.window = window;
        Ok(package.clone())
    }

    fn commit(&self, commit: AllocationCommit) -> Result<CommitAck, RepositoryError> {
        let mut guard = self.lock()?;
        let mut staged = guard.clone();
        let ack = apply(&mut staged, commit)?;
        *guard = staged;
        Ok(ack)
    }
}

fn apply(state: &mut StoreState, commit: AllocationCommit) -> Result<CommitAck, RepositoryError> {
    let AllocationCommit {
        package_id,
        mode,
        student_updates,
        course_additions,
        summary,
    } = commit;

    let package = state
        .packages
        .get_mut(&package_id)
        .ok_or_else(|| RepositoryError::PackageNotFound(package_id.clone()))?;

    // Mandatory rosters are not owned by allocation runs.
    if mode == CommitMode::Replace {
        for course in package.courses.iter_mut().filter(|course| course.is_competitive()) {
            course.enrolled.clear();
        }
        for student in state.students.values_mut() {
            student.enrollments.remove(&package_id);
        }
    }

    let courses_updated = course_additions.len();
    for (course_id, students) in course_additions {
        let course = package
            .courses
            .iter_mut()
            .find(|course| course.id == course_id)
            .ok_or_else(|| RepositoryError::CourseNotFound {
                package_id: package_id.clone(),
                course_id: course_id.clone(),
            })?;
        course.enrolled.extend(students);
    }
    package.summary = summary;

    let students_updated = student_updates.len();
    for update in student_updates {
        let student = state
            .students
            .get_mut(&update.student_id)
            .ok_or_else(|| RepositoryError::StudentNotFound(update.student_id.clone()))?;
        student
            .enrollments
            .insert(package_id.clone(), update.enrollment);
    }

    Ok(CommitAck {
        package_id,
        committed_at: Utc::now(),
        students_updated,
        courses_updated,
    })
}
