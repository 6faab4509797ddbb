//! Priority scoring.
//!
//! Each fallback tier is its own strategy function so the chain can be exercised one tier at a
//! time. [`PriorityCalculator::score_for`] walks the tiers in order and settles on the first one
//! that yields a value.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{AcademicCycle, AcademicYear, StudentAcademicProfile};

/// Comparable priority of a student. Higher sorts first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityScore(f64);

impl PriorityScore {
    pub const ZERO: Self = Self(0.0);

    /// Non-finite and negative inputs collapse to zero so they rank last.
    pub fn new(value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            Self(value)
        } else {
            Self::ZERO
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for PriorityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Fallback tier that produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    FirstSemester,
    PriorYear,
    GeneralAverage,
    Missing,
}

/// Score together with the tier it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub score: PriorityScore,
    pub source: ScoreSource,
}

/// Derives priority scores for the packages of a single calendar cycle.
#[derive(Debug, Clone, Copy)]
pub struct PriorityCalculator {
    current_cycle: AcademicCycle,
}

impl PriorityCalculator {
    pub fn new(current_cycle: AcademicCycle) -> Self {
        Self { current_cycle }
    }

    pub fn current_cycle(&self) -> AcademicCycle {
        self.current_cycle
    }

    pub fn score_for(
        &self,
        profile: &StudentAcademicProfile,
        target_year: AcademicYear,
    ) -> PriorityScore {
        self.breakdown(profile, target_year).score
    }

    pub fn breakdown(
        &self,
        profile: &StudentAcademicProfile,
        target_year: AcademicYear,
    ) -> ScoreBreakdown {
        let primary = if profile.year == AcademicYear::First {
            first_semester_tier(profile).map(|value| (value, ScoreSource::FirstSemester))
        } else {
            prior_year_tier(profile, target_year, self.current_cycle)
                .map(|value| (value, ScoreSource::PriorYear))
        };

        match primary.or_else(|| {
            general_average_tier(profile).map(|value| (value, ScoreSource::GeneralAverage))
        }) {
            Some((value, source)) => ScoreBreakdown {
                score: PriorityScore::new(value),
                source,
            },
            None => ScoreBreakdown {
                score: PriorityScore::ZERO,
                source: ScoreSource::Missing,
            },
        }
    }
}

/// First-semester average of a first-year student.
pub fn first_semester_tier(profile: &StudentAcademicProfile) -> Option<f64> {
    profile.first_semester_average.filter(|value| value.is_finite())
}

/// Mean of the grades recorded for the study year preceding `target_year` in `cycle`.
pub fn prior_year_tier(
    profile: &StudentAcademicProfile,
    target_year: AcademicYear,
    cycle: AcademicCycle,
) -> Option<f64> {
    let preceding = target_year.previous()?;
    let grades: Vec<f64> = profile
        .grade_history
        .iter()
        .filter(|record| record.study_year == preceding && record.cycle == cycle)
        .map(|record| record.grade)
        .filter(|grade| grade.is_finite())
        .collect();

    if grades.is_empty() {
        return None;
    }

    Some(grades.iter().sum::<f64>() / grades.len() as f64)
}

pub fn general_average_tier(profile: &StudentAcademicProfile) -> Option<f64> {
    profile.general_average.filter(|value| value.is_finite())
}
