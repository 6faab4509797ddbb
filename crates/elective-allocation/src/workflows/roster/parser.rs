use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::io::Read;

/// Deserializes every row of a roster file, pairing it with its 1-based line number.
pub(crate) fn parse_rows<R, T>(reader: R) -> Result<Vec<(usize, T)>, csv::Error>
where
    R: Read,
    T: DeserializeOwned,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();

    for (index, record) in csv_reader.deserialize::<T>().enumerate() {
        // Header occupies line 1.
        rows.push((index + 2, record?));
    }

    Ok(rows)
}

#[derive(Debug, Deserialize)]
pub(crate) struct PackageRow {
    #[serde(rename = "Package ID")]
    pub(crate) package_id: String,
    #[serde(rename = "Target Year")]
    pub(crate) target_year: String,
    #[serde(
        rename = "Window Start",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) window_start: Option<String>,
    #[serde(
        rename = "Window End",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) window_end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CourseRow {
    #[serde(rename = "Package ID")]
    pub(crate) package_id: String,
    #[serde(rename = "Course ID")]
    pub(crate) course_id: String,
    #[serde(rename = "Name", default)]
    pub(crate) name: String,
    #[serde(rename = "Capacity", default, deserialize_with = "empty_string_as_none")]
    pub(crate) capacity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StudentRow {
    #[serde(rename = "Student ID")]
    pub(crate) student_id: String,
    #[serde(rename = "Year")]
    pub(crate) year: String,
    #[serde(
        rename = "First Semester Average",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) first_semester_average: Option<String>,
    #[serde(
        rename = "General Average",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub(crate) general_average: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GradeRow {
    #[serde(rename = "Student ID")]
    pub(crate) student_id: String,
    #[serde(rename = "Study Year")]
    pub(crate) study_year: String,
    #[serde(rename = "Cycle")]
    pub(crate) cycle: String,
    #[serde(rename = "Grade")]
    pub(crate) grade: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PreferenceRow {
    #[serde(rename = "Student ID")]
    pub(crate) student_id: String,
    #[serde(rename = "Package ID", default, deserialize_with = "empty_string_as_none")]
    pub(crate) package_id: Option<String>,
    /// `per_package` (default), `chosen` or `legacy`.
    #[serde(rename = "Layout", default, deserialize_with = "empty_string_as_none")]
    pub(crate) layout: Option<String>,
    #[serde(rename = "Courses", default)]
    pub(crate) courses: String,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// Accepts RFC 3339 timestamps or plain dates (midnight UTC).
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }

    None
}
