//! CSV roster import.
//!
//! A roster directory holds `packages.csv`, `courses.csv` and `students.csv`, plus the optional
//! `grades.csv` and `preferences.csv`. Preference rows keep the legacy layout they were exported
//! in so the resolver sees the same shapes the source system stores.

mod normalizer;
mod parser;

use crate::workflows::allocation::{
    AcademicCycle, AcademicYear, Course, CourseId, CoursePackage, EnrollmentWindow,
    GradeRecord, InMemoryAllocationStore, PackageId, PackageSummary, StudentAcademicProfile,
    StudentId, StudentRecord, ValidationError,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use normalizer::{normalize_id, parse_decimal, split_course_list};
use parser::{CourseRow, GradeRow, PackageRow, PreferenceRow, StudentRow};

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Invalid {
        file: &'static str,
        line: usize,
        message: String,
    },
    Window {
        package_id: PackageId,
        source: ValidationError,
    },
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read roster: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid roster CSV data: {}", err),
            RosterImportError::Invalid {
                file,
                line,
                message,
            } => write!(f, "{}:{}: {}", file, line, message),
            RosterImportError::Window { package_id, source } => write!(
                f,
                "package {} has an invalid enrollment window: {}",
                package_id, source
            ),
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
            RosterImportError::Window { source, .. } => Some(source),
            RosterImportError::Invalid { .. } => None,
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RosterImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Packages and student records read from a roster.
#[derive(Debug, Clone, Default)]
pub struct RosterSnapshot {
    pub packages: Vec<CoursePackage>,
    pub students: Vec<StudentRecord>,
}

impl RosterSnapshot {
    pub fn into_store(self) -> InMemoryAllocationStore {
        InMemoryAllocationStore::with_records(self.packages, self.students)
    }
}

/// Raw roster files. Optional files may be absent.
pub struct RosterSources<R> {
    pub packages: R,
    pub courses: R,
    pub students: R,
    pub grades: Option<R>,
    pub preferences: Option<R>,
}

pub struct RosterImporter;

impl RosterImporter {
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<RosterSnapshot, RosterImportError> {
        let dir = dir.as_ref();
        let optional = |name: &str| -> Result<Option<File>, RosterImportError> {
            let path = dir.join(name);
            if path.exists() {
                Ok(Some(File::open(path)?))
            } else {
                Ok(None)
            }
        };

        Self::from_sources(RosterSources {
            packages: File::open(dir.join("packages.csv"))?,
            courses: File::open(dir.join("courses.csv"))?,
            students: File::open(dir.join("students.csv"))?,
            grades: optional("grades.csv")?,
            preferences: optional("preferences.csv")?,
        })
    }

    pub fn from_sources<R: Read>(
        sources: RosterSources<R>,
    ) -> Result<RosterSnapshot, RosterImportError> {
        let mut packages = read_packages(sources.packages)?;
        attach_courses(&mut packages, sources.courses)?;

        let mut students = read_students(sources.students)?;
        if let Some(grades) = sources.grades {
            attach_grades(&mut students, grades)?;
        }
        if let Some(preferences) = sources.preferences {
            attach_preferences(&mut students, &packages, preferences)?;
        }

        Ok(RosterSnapshot {
            packages: packages.into_values().collect(),
            students: students.into_values().collect(),
        })
    }
}

fn invalid(file: &'static str, line: usize, message: impl Into<String>) -> RosterImportError {
    RosterImportError::Invalid {
        file,
        line,
        message: message.into(),
    }
}

fn parse_year(
    file: &'static str,
    line: usize,
    raw: &str,
) -> Result<AcademicYear, RosterImportError> {
    AcademicYear::parse(raw)
        .ok_or_else(|| invalid(file, line, format!("unknown academic year '{raw}'")))
}

fn read_packages<R: Read>(
    reader: R,
) -> Result<BTreeMap<PackageId, CoursePackage>, RosterImportError> {
    const FILE: &str = "packages.csv";
    let mut packages = BTreeMap::new();

    for (line, row) in parser::parse_rows::<_, PackageRow>(reader)? {
        let package_id = PackageId(normalize_id(&row.package_id));
        let target_year = parse_year(FILE, line, &row.target_year)?;
        let start = parse_bound(FILE, line, row.window_start.as_deref())?;
        let end = parse_bound(FILE, line, row.window_end.as_deref())?;
        let window = EnrollmentWindow::new(start, end).map_err(|source| {
            RosterImportError::Window {
                package_id: package_id.clone(),
                source,
            }
        })?;

        if packages.contains_key(&package_id) {
            return Err(invalid(FILE, line, format!("duplicate package {package_id}")));
        }
        packages.insert(
            package_id.clone(),
            CoursePackage {
                id: package_id,
                target_year,
                courses: Vec::new(),
                window,
                summary: PackageSummary::default(),
            },
        );
    }

    Ok(packages)
}

fn parse_bound(
    file: &'static str,
    line: usize,
    raw: Option<&str>,
) -> Result<Option<DateTime<Utc>>, RosterImportError> {
    match raw {
        None => Ok(None),
        Some(value) => parser::parse_timestamp(value)
            .map(Some)
            .ok_or_else(|| invalid(file, line, format!("unreadable timestamp '{value}'"))),
    }
}

fn attach_courses<R: Read>(
    packages: &mut BTreeMap<PackageId, CoursePackage>,
    reader: R,
) -> Result<(), RosterImportError> {
    const FILE: &str = "courses.csv";

    for (line, row) in parser::parse_rows::<_, CourseRow>(reader)? {
        let package_id = PackageId(normalize_id(&row.package_id));
        let package = packages
            .get_mut(&package_id)
            .ok_or_else(|| invalid(FILE, line, format!("unknown package {package_id}")))?;

        let capacity = match row.capacity.as_deref() {
            None => None,
            Some(raw) => Some(raw.trim().parse::<u32>().map_err(|_| {
                invalid(
                    FILE,
                    line,
                    format!("capacity must be a non-negative integer, got '{raw}'"),
                )
            })?),
        };

        let course_id = CourseId(normalize_id(&row.course_id));
        if package.contains_course(&course_id) {
            return Err(invalid(
                FILE,
                line,
                format!("duplicate course {course_id} in package {package_id}"),
            ));
        }

        let name = if row.name.trim().is_empty() {
            course_id.0.clone()
        } else {
            row.name.trim().to_string()
        };
        package.courses.push(Course {
            id: course_id,
            name,
            capacity,
            enrolled: Vec::new(),
        });
    }

    Ok(())
}

fn read_students<R: Read>(
    reader: R,
) -> Result<BTreeMap<StudentId, StudentRecord>, RosterImportError> {
    const FILE: &str = "students.csv";
    let mut students = BTreeMap::new();

    for (line, row) in parser::parse_rows::<_, StudentRow>(reader)? {
        let student_id = StudentId(normalize_id(&row.student_id));
        if students.contains_key(&student_id) {
            return Err(invalid(FILE, line, format!("duplicate student {student_id}")));
        }

        let profile = StudentAcademicProfile {
            student_id: student_id.clone(),
            year: parse_year(FILE, line, &row.year)?,
            first_semester_average: row
                .first_semester_average
                .as_deref()
                .and_then(parse_decimal),
            general_average: row.general_average.as_deref().and_then(parse_decimal),
            grade_history: Vec::new(),
        };
        students.insert(student_id, StudentRecord::new(profile));
    }

    Ok(students)
}

fn attach_grades<R: Read>(
    students: &mut BTreeMap<StudentId, StudentRecord>,
    reader: R,
) -> Result<(), RosterImportError> {
    const FILE: &str = "grades.csv";

    for (line, row) in parser::parse_rows::<_, GradeRow>(reader)? {
        let student_id = StudentId(normalize_id(&row.student_id));
        let study_year = parse_year(FILE, line, &row.study_year)?;
        let cycle = AcademicCycle::parse(&row.cycle)
            .ok_or_else(|| invalid(FILE, line, format!("unknown cycle '{}'", row.cycle)))?;
        let grade = parse_decimal(&row.grade)
            .ok_or_else(|| invalid(FILE, line, format!("unreadable grade '{}'", row.grade)))?;

        let student = students
            .get_mut(&student_id)
            .ok_or_else(|| invalid(FILE, line, format!("unknown student {student_id}")))?;
        student.profile.grade_history.push(GradeRecord {
            study_year,
            cycle,
            grade,
        });
    }

    Ok(())
}

fn attach_preferences<R: Read>(
    students: &mut BTreeMap<StudentId, StudentRecord>,
    packages: &BTreeMap<PackageId, CoursePackage>,
    reader: R,
) -> Result<(), RosterImportError> {
    const FILE: &str = "preferences.csv";

    for (line, row) in parser::parse_rows::<_, PreferenceRow>(reader)? {
        let student_id = StudentId(normalize_id(&row.student_id));
        let student = students
            .get_mut(&student_id)
            .ok_or_else(|| invalid(FILE, line, format!("unknown student {student_id}")))?;

        let package_id = row.package_id.as_deref().map(normalize_id).map(PackageId);
        if let Some(package_id) = &package_id {
            if !packages.contains_key(package_id) {
                return Err(invalid(FILE, line, format!("unknown package {package_id}")));
            }
        }

        // Course ids are kept verbatim; membership is checked at allocation time.
        let courses: Vec<CourseId> = split_course_list(&row.courses)
            .into_iter()
            .map(CourseId)
            .collect();

        let layout = row
            .layout
            .as_deref()
            .map(|value| value.trim().to_ascii_lowercase());
        let preferences = &mut student.preferences;
        match (layout.as_deref(), package_id) {
            (Some("legacy"), owner) | (None, owner @ None) => {
                preferences.legacy_list = courses;
                preferences.legacy_package = owner;
            }
            (Some("chosen"), Some(package_id)) => {
                preferences.chosen_package = Some(package_id);
                preferences.chosen_courses = courses;
            }
            (None | Some("per_package"), Some(package_id)) => {
                preferences.by_package.insert(package_id, courses);
            }
            (Some(other), _) => {
                return Err(invalid(
                    FILE,
                    line,
                    format!("layout '{other}' needs a package id or is unknown"),
                ));
            }
        }
    }

    Ok(())
}
