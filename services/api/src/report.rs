use crate::infra::{load_store, parse_timestamp};
use chrono::{DateTime, Utc};
use clap::Args;
use elective_allocation::config::AppConfig;
use elective_allocation::error::AppError;
use elective_allocation::workflows::allocation::{
    AllocationReport, AllocationService, AllocationWarning, PackageId, WindowStatusView,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct AllocateArgs {
    /// Package to allocate
    #[arg(long)]
    pub(crate) package: String,
    /// Roster directory (defaults to the built-in sample roster)
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
    /// Print the report as JSON instead of text
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct WindowArgs {
    /// Package whose window should be shown
    #[arg(long)]
    pub(crate) package: String,
    /// Roster directory (defaults to the built-in sample roster)
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
    /// Evaluation instant (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) now: Option<DateTime<Utc>>,
}

pub(crate) fn run_allocate(args: AllocateArgs) -> Result<(), AppError> {
    let AllocateArgs {
        package,
        data_dir,
        json,
    } = args;

    let config = AppConfig::load()?;
    let store = load_store(data_dir.or(config.allocation.data_dir.clone()).as_deref())?;
    let service = AllocationService::new(Arc::new(store), config.allocation.settings());

    let report = service.run_allocation(&PackageId(package), Utc::now())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render_allocation_report(&report);
    }
    Ok(())
}

pub(crate) fn run_window(args: WindowArgs) -> Result<(), AppError> {
    let WindowArgs {
        package,
        data_dir,
        now,
    } = args;

    let config = AppConfig::load()?;
    let store = load_store(data_dir.or(config.allocation.data_dir.clone()).as_deref())?;
    let service = AllocationService::new(Arc::new(store), config.allocation.settings());

    let view = service.window_status(&PackageId(package), now.unwrap_or_else(Utc::now))?;
    for line in window_lines(&view) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn render_allocation_report(report: &AllocationReport) {
    for line in allocation_lines(report) {
        println!("{line}");
    }
}

pub(crate) fn allocation_lines(report: &AllocationReport) -> Vec<String> {
    let mut lines = vec![
        format!("Allocation report for package {}", report.package_id),
        format!(
            "Run at {} (rerun policy: {:?})",
            report.run_at.to_rfc3339(),
            report.rerun_policy
        ),
        format!(
            "Allocated: {}, unallocated: {}, excluded: {}, skipped preferences: {}",
            report.allocated, report.unallocated, report.excluded, report.skipped_preferences
        ),
    ];

    lines.push(String::new());
    lines.push("Assignments".to_string());
    if report.assignments.is_empty() {
        lines.push("- none".to_string());
    }
    for assignment in &report.assignments {
        lines.push(format!(
            "- {} -> {} (choice #{})",
            assignment.student_id,
            assignment.course_id,
            assignment.rank + 1
        ));
    }

    if !report.unallocated_students.is_empty() {
        lines.push(String::new());
        lines.push("Unallocated students".to_string());
        for student_id in &report.unallocated_students {
            lines.push(format!("- {student_id}"));
        }
    }

    lines.push(String::new());
    lines.push("Remaining seats".to_string());
    for (course_id, seats) in &report.remaining_capacity {
        lines.push(format!("- {course_id}: {seats}"));
    }

    if !report.warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings".to_string());
        for warning in &report.warnings {
            match warning {
                AllocationWarning::EmptyInput { package_id } => lines.push(format!(
                    "- no student had preferences for {package_id}; every seat stays open"
                )),
            }
        }
    }

    lines
}

pub(crate) fn window_lines(view: &WindowStatusView) -> Vec<String> {
    let bound = |value: Option<DateTime<Utc>>| {
        value
            .map(|instant| instant.to_rfc3339())
            .unwrap_or_else(|| "unset".to_string())
    };

    vec![
        format!("Enrollment window for package {}", view.package_id),
        format!("Start: {}", bound(view.start)),
        format!("End: {}", bound(view.end)),
        format!(
            "Status at {}: {}",
            view.evaluated_at.to_rfc3339(),
            view.status
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{load_store, SAMPLE_PACKAGE};
    use chrono::TimeZone;
    use elective_allocation::workflows::allocation::{AllocationSettings, InMemoryAllocationStore};

    fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, month, day, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn sample_service() -> AllocationService<InMemoryAllocationStore> {
        let store = load_store(None).expect("sample roster loads");
        AllocationService::new(Arc::new(store), AllocationSettings::default())
    }

    #[test]
    fn sample_roster_allocation_renders_assignments_and_leftovers() {
        let report = sample_service()
            .run_allocation(&PackageId::from(SAMPLE_PACKAGE), at(10, 1, 9))
            .expect("allocation succeeds");

        assert_eq!(report.allocated, 4);
        assert_eq!(report.unallocated, 2);
        assert_eq!(report.skipped_preferences, 2);

        let lines = allocation_lines(&report);
        assert!(lines.contains(&"- st-101 -> ml (choice #1)".to_string()));
        assert!(lines.contains(&"- st-102 -> cloud (choice #1)".to_string()));
        assert!(lines.contains(&"- st-104 -> gfx (choice #2)".to_string()));
        assert!(lines.contains(&"- st-103 -> ml (choice #1)".to_string()));
        assert!(lines.contains(&"- st-105".to_string()));
        assert!(lines.contains(&"- ml: 0".to_string()));
        assert!(!lines.iter().any(|line| line == "Warnings"));
    }

    #[test]
    fn window_lines_show_bounds_and_status() {
        let view = sample_service()
            .window_status(&PackageId::from(SAMPLE_PACKAGE), at(9, 20, 12))
            .expect("window status");

        let lines = window_lines(&view);
        assert_eq!(lines[1], "Start: 2025-09-15T08:00:00+00:00");
        assert_eq!(lines[3], "Status at 2025-09-20T12:00:00+00:00: open");
    }
}
