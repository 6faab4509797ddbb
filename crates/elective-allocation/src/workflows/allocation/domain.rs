use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for optional-course packages.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(pub String);

/// Identifier wrapper for a course within a package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub String);

/// Identifier wrapper for students.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub String);

macro_rules! display_id {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<&str> for $ty {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

display_id!(PackageId, CourseId, StudentId);

/// Year of study a package targets or a student is enrolled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AcademicYear {
    #[serde(rename = "I")]
    First,
    #[serde(rename = "II")]
    Second,
    #[serde(rename = "III")]
    Third,
    #[serde(rename = "IV")]
    Fourth,
}

impl AcademicYear {
    pub const fn ordered() -> [Self; 4] {
        [Self::First, Self::Second, Self::Third, Self::Fourth]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::First => "I",
            Self::Second => "II",
            Self::Third => "III",
            Self::Fourth => "IV",
        }
    }

    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::First => None,
            Self::Second => Some(Self::First),
            Self::Third => Some(Self::Second),
            Self::Fourth => Some(Self::Third),
        }
    }

    /// Accepts roman labels (`II`) as well as plain digits (`2`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "I" | "1" => Some(Self::First),
            "II" | "2" => Some(Self::Second),
            "III" | "3" => Some(Self::Third),
            "IV" | "4" => Some(Self::Fourth),
            _ => None,
        }
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Calendar cycle of the academic year, identified by the year it starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AcademicCycle {
    pub start_year: i32,
}

impl AcademicCycle {
    pub const fn new(start_year: i32) -> Self {
        Self { start_year }
    }

    /// Cycle containing `date`, given the month (1-12) in which a cycle begins.
    pub fn containing(date: NaiveDate, start_month: u32) -> Self {
        if date.month() >= start_month {
            Self::new(date.year())
        } else {
            Self::new(date.year() - 1)
        }
    }

    /// Parses `2025-2026` or a bare start year such as `2025`.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let start = trimmed.split(['-', '/']).next()?.trim();
        start.parse::<i32>().ok().map(Self::new)
    }
}

impl fmt::Display for AcademicCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_year, self.start_year + 1)
    }
}

/// One offering inside a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    /// `None` marks a mandatory course that never takes part in allocation.
    pub capacity: Option<u32>,
    #[serde(default)]
    pub enrolled: Vec<StudentId>,
}

impl Course {
    pub fn is_competitive(&self) -> bool {
        self.capacity.is_some()
    }
}

/// Interval during which students may submit or change their ranked preferences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl EnrollmentWindow {
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, ValidationError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start >= end {
                return Err(ValidationError::WindowOrder { start, end });
            }
        }
        Ok(Self { start, end })
    }

    pub const fn unset() -> Self {
        Self {
            start: None,
            end: None,
        }
    }
}

/// Outcome counters written back to a package after each run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSummary {
    pub processed: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub allocated: usize,
    pub unallocated: usize,
    /// Course id -> preference rank -> number of students satisfied at that rank.
    pub rank_histogram: BTreeMap<CourseId, BTreeMap<usize, u32>>,
}

/// Optional-course offerings available to a cohort for a given academic year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoursePackage {
    pub id: PackageId,
    pub target_year: AcademicYear,
    pub courses: Vec<Course>,
    #[serde(default)]
    pub window: EnrollmentWindow,
    #[serde(default)]
    pub summary: PackageSummary,
}

impl CoursePackage {
    pub fn course(&self, id: &CourseId) -> Option<&Course> {
        self.courses.iter().find(|course| &course.id == id)
    }

    pub fn contains_course(&self, id: &CourseId) -> bool {
        self.course(id).is_some()
    }

    /// Students take part in a package only when their own year is its target year.
    pub fn admits(&self, profile: &StudentAcademicProfile) -> bool {
        profile.year == self.target_year
    }
}

/// Grade recorded for a student in a given study year and calendar cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub study_year: AcademicYear,
    pub cycle: AcademicCycle,
    pub grade: f64,
}

/// Grade data needed to derive a priority score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAcademicProfile {
    pub student_id: StudentId,
    pub year: AcademicYear,
    pub first_semester_average: Option<f64>,
    pub general_average: Option<f64>,
    #[serde(default)]
    pub grade_history: Vec<GradeRecord>,
}

/// Ranked course choices of one student for one package. Index 0 is the favourite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentPreferenceRecord {
    pub student_id: StudentId,
    pub package_id: PackageId,
    pub courses: Vec<CourseId>,
}

/// Allocation state of a student for a package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    #[default]
    Pending,
    Allocated,
    Unallocated,
}

impl AllocationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AllocationStatus::Pending => "pending",
            AllocationStatus::Allocated => "allocated",
            AllocationStatus::Unallocated => "unallocated",
        }
    }
}

/// Enrollment record of a student in a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEnrollment {
    pub course_id: Option<CourseId>,
    pub status: AllocationStatus,
}

/// Raw preference data as stored by the surrounding application.
///
/// Several legacy layouts coexist; [`crate::workflows::allocation::PreferenceResolver`]
/// turns them into one ranked list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPreferenceData {
    #[serde(default)]
    pub by_package: BTreeMap<PackageId, Vec<CourseId>>,
    #[serde(default)]
    pub chosen_package: Option<PackageId>,
    #[serde(default)]
    pub chosen_courses: Vec<CourseId>,
    #[serde(default)]
    pub legacy_list: Vec<CourseId>,
    /// Package the flat legacy list was recorded for, when the export kept it.
    #[serde(default)]
    pub legacy_package: Option<PackageId>,
}

impl RawPreferenceData {
    /// Package the legacy list belongs to: its recorded owner, else the chosen package.
    ///
    /// `None` leaves the list tied to the student's cohort package.
    pub fn legacy_owner(&self) -> Option<&PackageId> {
        self.legacy_package.as_ref().or(self.chosen_package.as_ref())
    }
}

/// Everything the store keeps about a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub profile: StudentAcademicProfile,
    #[serde(default)]
    pub preferences: RawPreferenceData,
    #[serde(default)]
    pub enrollments: BTreeMap<PackageId, PackageEnrollment>,
}

impl StudentRecord {
    pub fn new(profile: StudentAcademicProfile) -> Self {
        Self {
            profile,
            preferences: RawPreferenceData::default(),
            enrollments: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &StudentId {
        &self.profile.student_id
    }

    pub fn enrollment(&self, package_id: &PackageId) -> Option<&PackageEnrollment> {
        self.enrollments.get(package_id)
    }
}

/// Input rejected before any mutation takes place.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("window start {start} must be before end {end}")]
    WindowOrder {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("course {course_id} does not belong to package {package_id}")]
    UnknownCourse {
        package_id: PackageId,
        course_id: CourseId,
    },
    #[error("course {course_id} is listed more than once for package {package_id}")]
    DuplicateCourse {
        package_id: PackageId,
        course_id: CourseId,
    },
    #[error("student {student_id} (year {year}) is not in the cohort of package {package_id}")]
    OutsideCohort {
        package_id: PackageId,
        student_id: StudentId,
        year: AcademicYear,
    },
}
