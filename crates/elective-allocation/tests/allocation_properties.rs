//! Invariants of the allocation engine over generated packages and candidate pools.

use std::collections::{BTreeMap, BTreeSet};

use elective_allocation::workflows::allocation::{
    AcademicYear, AllocationCandidate, AllocationEngine, Course, CourseId, CoursePackage,
    EnrollmentWindow, PackageId, PackageSummary, PriorityScore, StudentId,
};
use proptest::prelude::*;

const COURSE_IDS: [&str; 4] = ["c0", "c1", "c2", "c3"];

fn package(capacities: &[Option<u32>]) -> CoursePackage {
    CoursePackage {
        id: PackageId::from("pkg"),
        target_year: AcademicYear::Third,
        courses: capacities
            .iter()
            .zip(COURSE_IDS)
            .map(|(capacity, id)| Course {
                id: CourseId::from(id),
                name: id.to_uppercase(),
                capacity: *capacity,
                enrolled: Vec::new(),
            })
            .collect(),
        window: EnrollmentWindow::unset(),
        summary: PackageSummary::default(),
    }
}

/// Capacities for four courses; `None` marks a mandatory course.
fn capacities_strategy() -> impl Strategy<Value = Vec<Option<u32>>> {
    prop::collection::vec(prop::option::weighted(0.85, 0u32..4), 4)
}

/// Preference lists may name `ghost`, a course outside every package.
fn candidates_strategy() -> impl Strategy<Value = Vec<AllocationCandidate>> {
    let preference = prop_oneof![
        4 => (0usize..4).prop_map(|index| COURSE_IDS[index].to_string()),
        1 => Just("ghost".to_string()),
    ];
    prop::collection::vec(
        (0u8..=20, prop::collection::vec(preference, 0..5)),
        0..24,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(index, (tenths, prefs))| {
                let mut seen = BTreeSet::new();
                AllocationCandidate {
                    student_id: StudentId(format!("s{index:02}")),
                    score: PriorityScore::new(f64::from(tenths) / 2.0),
                    preferences: prefs
                        .into_iter()
                        .filter(|id| seen.insert(id.clone()))
                        .map(CourseId)
                        .collect(),
                }
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn no_course_exceeds_its_capacity(
        capacities in capacities_strategy(),
        candidates in candidates_strategy(),
    ) {
        let package = package(&capacities);
        let result = AllocationEngine.allocate(&package, candidates).expect("package has courses");

        let mut taken: BTreeMap<&CourseId, u32> = BTreeMap::new();
        for assignment in &result.assignments {
            *taken.entry(&assignment.course_id).or_default() += 1;
        }
        for course in &package.courses {
            let used = taken.get(&course.id).copied().unwrap_or(0);
            match course.capacity {
                Some(capacity) => {
                    prop_assert!(used <= capacity);
                    prop_assert_eq!(result.remaining_capacity[&course.id], capacity - used);
                }
                None => prop_assert_eq!(used, 0),
            }
        }
    }

    #[test]
    fn every_candidate_has_exactly_one_outcome(
        capacities in capacities_strategy(),
        candidates in candidates_strategy(),
    ) {
        let package = package(&capacities);
        let result = AllocationEngine
            .allocate(&package, candidates.clone())
            .expect("package has courses");

        prop_assert_eq!(result.allocated_count() + result.unallocated_count(), candidates.len());
        for candidate in &candidates {
            let placed = result.course_for(&candidate.student_id);
            let unallocated = result.unallocated.contains(&candidate.student_id);
            prop_assert!(placed.is_some() != unallocated);
            if let Some(course_id) = placed {
                prop_assert!(candidate.preferences.contains(course_id));
            }
        }
    }

    #[test]
    fn assigned_rank_points_at_the_assigned_course(
        capacities in capacities_strategy(),
        candidates in candidates_strategy(),
    ) {
        let package = package(&capacities);
        let result = AllocationEngine
            .allocate(&package, candidates.clone())
            .expect("package has courses");

        for assignment in &result.assignments {
            let candidate = candidates
                .iter()
                .find(|candidate| candidate.student_id == assignment.student_id)
                .expect("assignment belongs to a candidate");
            prop_assert_eq!(&candidate.preferences[assignment.rank], &assignment.course_id);
        }
    }

    #[test]
    fn processing_order_never_increases_in_score(
        capacities in capacities_strategy(),
        candidates in candidates_strategy(),
    ) {
        let package = package(&capacities);
        let scores: BTreeMap<StudentId, f64> = candidates
            .iter()
            .map(|candidate| (candidate.student_id.clone(), candidate.score.value()))
            .collect();
        let result = AllocationEngine.allocate(&package, candidates).expect("package has courses");

        for pair in result.assignments.windows(2) {
            prop_assert!(scores[&pair[0].student_id] >= scores[&pair[1].student_id]);
        }
    }

    /// Raising one student's score never leaves them worse off.
    #[test]
    fn higher_score_never_hurts(
        capacities in capacities_strategy(),
        candidates in candidates_strategy(),
        pick in any::<prop::sample::Index>(),
    ) {
        prop_assume!(!candidates.is_empty());
        let package = package(&capacities);
        let chosen = pick.index(candidates.len());
        let student_id = candidates[chosen].student_id.clone();
        let preferences = candidates[chosen].preferences.clone();

        let rank_of = |result: &elective_allocation::workflows::allocation::AllocationResult| {
            result
                .assignments
                .iter()
                .find(|assignment| assignment.student_id == student_id)
                .map(|assignment| assignment.rank)
                .unwrap_or(usize::MAX)
        };

        let before = AllocationEngine
            .allocate(&package, candidates.clone())
            .expect("package has courses");
        let mut boosted = candidates;
        boosted[chosen].score = PriorityScore::new(100.0);
        let after = AllocationEngine.allocate(&package, boosted).expect("package has courses");

        prop_assert!(rank_of(&after) <= rank_of(&before), "preferences {:?}", preferences);
    }

    #[test]
    fn reruns_on_the_same_input_agree(
        capacities in capacities_strategy(),
        candidates in candidates_strategy(),
    ) {
        let package = package(&capacities);
        let first = AllocationEngine
            .allocate(&package, candidates.clone())
            .expect("package has courses");
        let second = AllocationEngine.allocate(&package, candidates).expect("package has courses");
        prop_assert_eq!(first, second);
    }
}
