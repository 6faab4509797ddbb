use chrono::{DateTime, Utc};
use elective_allocation::error::AppError;
use elective_allocation::workflows::allocation::InMemoryAllocationStore;
use elective_allocation::workflows::roster::{RosterImporter, RosterSnapshot, RosterSources};
use metrics_exporter_prometheus::PrometheusHandle;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const SAMPLE_PACKAGE: &str = "cs-2025-iii";

const SAMPLE_PACKAGES: &str = "Package ID,Target Year,Window Start,Window End\n\
cs-2025-iii,III,2025-09-15T08:00:00Z,2025-09-26T20:00:00Z\n";

const SAMPLE_COURSES: &str = "Package ID,Course ID,Name,Capacity\n\
cs-2025-iii,ml,Machine Learning,2\n\
cs-2025-iii,cloud,Cloud Computing,1\n\
cs-2025-iii,gfx,Computer Graphics,1\n\
cs-2025-iii,law,IT Law,\n";

const SAMPLE_STUDENTS: &str = "Student ID,Year,First Semester Average,General Average\n\
st-101,III,,8.10\n\
st-102,III,,9.40\n\
st-103,III,,7.25\n\
st-104,III,,8.80\n\
st-105,III,,\n\
st-106,III,,6.90\n";

const SAMPLE_GRADES: &str = "Student ID,Study Year,Cycle,Grade\n\
st-101,II,2025-2026,9.70\n\
st-101,II,2025-2026,9.30\n\
st-103,II,2025-2026,8.00\n\
st-104,II,2024-2025,10\n";

const SAMPLE_PREFERENCES: &str = "Student ID,Package ID,Layout,Courses\n\
st-101,cs-2025-iii,,ml;cloud;gfx\n\
st-102,cs-2025-iii,chosen,cloud;ml\n\
st-103,,legacy,ml|gfx\n\
st-104,cs-2025-iii,,cloud;gfx\n\
st-105,cs-2025-iii,,ml\n\
st-106,cs-2025-iii,,law;quantum\n";

/// Small roster used when no data directory is configured.
pub(crate) fn sample_roster() -> Result<RosterSnapshot, AppError> {
    let snapshot = RosterImporter::from_sources(RosterSources {
        packages: Cursor::new(SAMPLE_PACKAGES),
        courses: Cursor::new(SAMPLE_COURSES),
        students: Cursor::new(SAMPLE_STUDENTS),
        grades: Some(Cursor::new(SAMPLE_GRADES)),
        preferences: Some(Cursor::new(SAMPLE_PREFERENCES)),
    })?;
    Ok(snapshot)
}

pub(crate) fn load_store(data_dir: Option<&Path>) -> Result<InMemoryAllocationStore, AppError> {
    let snapshot = match data_dir {
        Some(dir) => RosterImporter::from_dir(dir)?,
        None => sample_roster()?,
    };
    Ok(snapshot.into_store())
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_roster_has_one_package_and_six_students() {
        let snapshot = sample_roster().expect("sample roster imports");
        assert_eq!(snapshot.packages.len(), 1);
        assert_eq!(snapshot.packages[0].id.0, SAMPLE_PACKAGE);
        assert_eq!(snapshot.students.len(), 6);
    }

    #[test]
    fn parse_timestamp_normalizes_offsets() {
        let parsed = parse_timestamp("2025-09-20T10:00:00+02:00").expect("parses");
        assert_eq!(parsed.to_rfc3339(), "2025-09-20T08:00:00+00:00");
        assert!(parse_timestamp("2025-09-20").is_err());
    }
}
