use super::common::{candidate, course, package};
use crate::workflows::allocation::domain::{CourseId, StudentId};
use crate::workflows::allocation::engine::AllocationEngine;

fn student(id: &str) -> StudentId {
    StudentId::from(id)
}

fn course_id(id: &str) -> CourseId {
    CourseId::from(id)
}

#[test]
fn higher_score_takes_the_contested_first_choice() {
    let package = package(vec![course("a", Some(1)), course("b", Some(1))]);
    let result = AllocationEngine
        .allocate(
            &package,
            vec![
                candidate("s2", 8.0, &["a", "b"]),
                candidate("s1", 9.0, &["a", "b"]),
            ],
        )
        .expect("allocation succeeds");

    assert_eq!(result.course_for(&student("s1")), Some(&course_id("a")));
    assert_eq!(result.course_for(&student("s2")), Some(&course_id("b")));
    assert_eq!(result.unallocated_count(), 0);
    assert_eq!(result.assignments[0].student_id, student("s1"));
    assert_eq!(result.assignments[1].rank, 1);
}

#[test]
fn lower_score_is_unallocated_when_the_only_choice_fills() {
    let package = package(vec![course("a", Some(1))]);
    let result = AllocationEngine
        .allocate(
            &package,
            vec![candidate("s1", 9.0, &["a"]), candidate("s2", 8.0, &["a"])],
        )
        .expect("allocation succeeds");

    assert_eq!(result.course_for(&student("s1")), Some(&course_id("a")));
    assert!(result.unallocated.contains(&student("s2")));
    assert_eq!(result.remaining_capacity[&course_id("a")], 0);
}

#[test]
fn empty_preference_list_is_unallocated_regardless_of_score() {
    let package = package(vec![course("a", Some(10))]);
    let result = AllocationEngine
        .allocate(&package, vec![candidate("s1", 10.0, &[])])
        .expect("allocation succeeds");

    assert!(result.unallocated.contains(&student("s1")));
    assert_eq!(result.remaining_capacity[&course_id("a")], 10);
}

#[test]
fn unknown_course_ids_are_skipped_without_failing_the_run() {
    let package = package(vec![course("a", Some(1))]);
    let result = AllocationEngine
        .allocate(
            &package,
            vec![
                candidate("s1", 9.0, &["ghost"]),
                candidate("s2", 8.0, &["a"]),
            ],
        )
        .expect("allocation succeeds");

    assert!(result.unallocated.contains(&student("s1")));
    assert_eq!(result.course_for(&student("s2")), Some(&course_id("a")));
    assert_eq!(result.skipped_preferences, 1);
}

#[test]
fn zero_capacity_course_never_receives_anyone() {
    let package = package(vec![course("closed", Some(0)), course("b", Some(2))]);
    let result = AllocationEngine
        .allocate(
            &package,
            vec![
                candidate("s1", 9.0, &["closed", "b"]),
                candidate("s2", 8.0, &["closed"]),
            ],
        )
        .expect("allocation succeeds");

    assert!(result
        .assignments
        .iter()
        .all(|assignment| assignment.course_id != course_id("closed")));
    assert_eq!(result.course_for(&student("s1")), Some(&course_id("b")));
    assert!(result.unallocated.contains(&student("s2")));
}

#[test]
fn equal_scores_keep_input_order() {
    let package = package(vec![course("a", Some(1)), course("b", Some(1))]);
    let result = AllocationEngine
        .allocate(
            &package,
            vec![
                candidate("s-late", 7.5, &["a", "b"]),
                candidate("s-early", 7.5, &["a", "b"]),
            ],
        )
        .expect("allocation succeeds");

    assert_eq!(result.course_for(&student("s-late")), Some(&course_id("a")));
    assert_eq!(result.course_for(&student("s-early")), Some(&course_id("b")));
}

#[test]
fn every_student_lands_in_exactly_one_outcome() {
    let package = package(vec![course("a", Some(2)), course("b", Some(1))]);
    let candidates = vec![
        candidate("s1", 9.0, &["a"]),
        candidate("s2", 8.0, &["a", "b"]),
        candidate("s3", 7.0, &["a", "b"]),
        candidate("s4", 6.0, &["b", "a"]),
        candidate("s5", 0.0, &[]),
    ];
    let result = AllocationEngine
        .allocate(&package, candidates.clone())
        .expect("allocation succeeds");

    assert_eq!(result.allocated_count() + result.unallocated_count(), 5);
    for candidate in &candidates {
        let placed = result.course_for(&candidate.student_id).is_some();
        let unallocated = result.unallocated.contains(&candidate.student_id);
        assert!(placed ^ unallocated, "{} in both or neither", candidate.student_id);
    }
    assert_eq!(result.remaining_capacity[&course_id("a")], 0);
    assert_eq!(result.remaining_capacity[&course_id("b")], 0);
    assert_eq!(result.rank_histogram[&course_id("a")][&0], 2);
    assert_eq!(result.rank_histogram[&course_id("b")][&1], 1);
}

#[test]
fn identical_input_gives_identical_result() {
    let package = package(vec![course("a", Some(1)), course("b", Some(2))]);
    let candidates = vec![
        candidate("s1", 6.0, &["a", "b"]),
        candidate("s2", 6.0, &["a", "b"]),
        candidate("s3", 9.0, &["b"]),
        candidate("s4", 5.0, &["a", "b"]),
    ];

    let first = AllocationEngine
        .allocate(&package, candidates.clone())
        .expect("first run");
    let second = AllocationEngine
        .allocate(&package, candidates)
        .expect("second run");

    assert_eq!(first, second);
}
