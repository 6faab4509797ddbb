use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{EnrollmentWindow, PackageId};

/// Derived state of an enrollment window at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    NotYetOpen,
    Open,
    Closed,
}

impl WindowStatus {
    pub const fn label(self) -> &'static str {
        match self {
            WindowStatus::NotYetOpen => "not_yet_open",
            WindowStatus::Open => "open",
            WindowStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decides whether students may currently edit their preferences.
///
/// The gate only governs submissions. Administrators can trigger an allocation run at any time.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodGate;

impl PeriodGate {
    pub fn is_open(&self, window: &EnrollmentWindow, now: DateTime<Utc>) -> bool {
        self.status(window, now) == WindowStatus::Open
    }

    pub fn status(&self, window: &EnrollmentWindow, now: DateTime<Utc>) -> WindowStatus {
        match (window.start, window.end) {
            (Some(start), Some(_)) if now < start => WindowStatus::NotYetOpen,
            (Some(_), Some(end)) if now <= end => WindowStatus::Open,
            _ => WindowStatus::Closed,
        }
    }
}

/// Window bounds plus their derived status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowStatusView {
    pub package_id: PackageId,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: WindowStatus,
    pub evaluated_at: DateTime<Utc>,
}
