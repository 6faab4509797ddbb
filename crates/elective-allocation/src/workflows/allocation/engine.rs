use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{CourseId, CoursePackage, PackageId, StudentId};
use super::priority::PriorityScore;

/// Student entering a run: identity, priority and ranked choices.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationCandidate {
    pub student_id: StudentId,
    pub score: PriorityScore,
    pub preferences: Vec<CourseId>,
}

/// Seat assigned to a student and the preference rank it satisfied (0 = first choice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub rank: usize,
}

/// Outcome of one allocation run. Assignments are listed in processing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub package_id: PackageId,
    pub assignments: Vec<Assignment>,
    pub unallocated: BTreeSet<StudentId>,
    pub remaining_capacity: BTreeMap<CourseId, u32>,
    pub rank_histogram: BTreeMap<CourseId, BTreeMap<usize, u32>>,
    /// Preference entries ignored because they named no competitive course of the package.
    pub skipped_preferences: usize,
}

impl AllocationResult {
    pub fn course_for(&self, student_id: &StudentId) -> Option<&CourseId> {
        self.assignments
            .iter()
            .find(|assignment| &assignment.student_id == student_id)
            .map(|assignment| &assignment.course_id)
    }

    pub fn allocated_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn unallocated_count(&self) -> usize {
        self.unallocated.len()
    }
}

/// Failures of the engine itself. Everything student-related is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("package {package_id} has no courses")]
    EmptyPackage { package_id: PackageId },
}

/// Seat bookkeeping for one course during a run.
#[derive(Debug, Clone, Copy)]
struct Seats {
    capacity: u32,
    occupied: u32,
}

impl Seats {
    fn has_room(self) -> bool {
        self.occupied < self.capacity
    }
}

/// Progress of a run, threaded through the matching loop and turned into the result.
#[derive(Debug)]
pub(crate) struct AllocationState {
    seats: HashMap<CourseId, Seats>,
    assignments: Vec<Assignment>,
    placed: BTreeSet<StudentId>,
    unallocated: BTreeSet<StudentId>,
    skipped_preferences: usize,
}

impl AllocationState {
    /// Competitive courses only, occupied counts seeded from existing enrollment.
    pub(crate) fn seeded(package: &CoursePackage) -> Self {
        let seats = package
            .courses
            .iter()
            .filter_map(|course| {
                course.capacity.map(|capacity| {
                    let occupied = u32::try_from(course.enrolled.len()).unwrap_or(u32::MAX);
                    (course.id.clone(), Seats { capacity, occupied })
                })
            })
            .collect();

        Self {
            seats,
            assignments: Vec::new(),
            placed: BTreeSet::new(),
            unallocated: BTreeSet::new(),
            skipped_preferences: 0,
        }
    }

    fn already_processed(&self, student_id: &StudentId) -> bool {
        self.placed.contains(student_id) || self.unallocated.contains(student_id)
    }

    fn place(&mut self, candidate: &AllocationCandidate) {
        for (rank, course_id) in candidate.preferences.iter().enumerate() {
            let Some(seats) = self.seats.get_mut(course_id) else {
                self.skipped_preferences += 1;
                continue;
            };

            if seats.has_room() {
                seats.occupied += 1;
                self.placed.insert(candidate.student_id.clone());
                self.assignments.push(Assignment {
                    student_id: candidate.student_id.clone(),
                    course_id: course_id.clone(),
                    rank,
                });
                return;
            }
        }

        self.unallocated.insert(candidate.student_id.clone());
    }

    fn into_result(self, package: &CoursePackage) -> AllocationResult {
        let remaining_capacity = self
            .seats
            .iter()
            .map(|(course_id, seats)| {
                (
                    course_id.clone(),
                    seats.capacity.saturating_sub(seats.occupied),
                )
            })
            .collect();

        let mut rank_histogram: BTreeMap<CourseId, BTreeMap<usize, u32>> = BTreeMap::new();
        for assignment in &self.assignments {
            *rank_histogram
                .entry(assignment.course_id.clone())
                .or_default()
                .entry(assignment.rank)
                .or_default() += 1;
        }

        AllocationResult {
            package_id: package.id.clone(),
            assignments: self.assignments,
            unallocated: self.unallocated,
            remaining_capacity,
            rank_histogram,
            skipped_preferences: self.skipped_preferences,
        }
    }
}

/// Deterministic greedy matcher.
///
/// Candidates are visited by descending priority score. Equal scores keep their input order,
/// so callers control the tie-break by the order they pass candidates in.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationEngine;

impl AllocationEngine {
    pub fn allocate(
        &self,
        package: &CoursePackage,
        mut candidates: Vec<AllocationCandidate>,
    ) -> Result<AllocationResult, EngineError> {
        if package.courses.is_empty() {
            return Err(EngineError::EmptyPackage {
                package_id: package.id.clone(),
            });
        }

        // `sort_by` is stable; that is the documented tie-break.
        candidates.sort_by(|left, right| right.score.total_cmp(&left.score));

        let mut state = AllocationState::seeded(package);
        for candidate in &candidates {
            if state.already_processed(&candidate.student_id) {
                debug!(
                    package_id = %package.id,
                    student_id = %candidate.student_id,
                    "duplicate candidate ignored"
                );
                continue;
            }
            state.place(candidate);
        }

        Ok(state.into_result(package))
    }
}
