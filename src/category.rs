use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::AnalyticsError;
use crate::models::AttendanceStatistics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Good,
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Good => "good",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    /// Severity for a category label. Labels outside the known set are `Good`.
    #[cfg(test)]
    pub fn for_label(label: &str) -> Severity {
        label
            .parse::<AttendanceCategory>()
            .map(|category| category.severity())
            .unwrap_or(Severity::Good)
    }

    pub fn needs_follow_up(&self) -> bool {
        matches!(self, Severity::Warning | Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attendance categories in rule-chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceCategory {
    #[serde(rename = "over_15_absences")]
    Over15Absences,
    #[serde(rename = "over_5_absences")]
    Over5Absences,
    FrequentRestDayAbsence,
    ThreeAbsences,
    OneOrTwoLateArrivals,
    Good,
}

impl AttendanceCategory {
    pub const ALL: [AttendanceCategory; 6] = [
        AttendanceCategory::Over15Absences,
        AttendanceCategory::Over5Absences,
        AttendanceCategory::FrequentRestDayAbsence,
        AttendanceCategory::ThreeAbsences,
        AttendanceCategory::OneOrTwoLateArrivals,
        AttendanceCategory::Good,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AttendanceCategory::Over15Absences => "more than 15 absence days",
            AttendanceCategory::Over5Absences => "more than 5 absence days",
            AttendanceCategory::FrequentRestDayAbsence => "frequent rest-day absence",
            AttendanceCategory::ThreeAbsences => "3 absence days",
            AttendanceCategory::OneOrTwoLateArrivals => "1-2 late arrivals",
            AttendanceCategory::Good => "good attendance",
        }
    }

    /// Machine-friendly name, as used on the command line and in JSON.
    pub fn key(&self) -> &'static str {
        match self {
            AttendanceCategory::Over15Absences => "over_15_absences",
            AttendanceCategory::Over5Absences => "over_5_absences",
            AttendanceCategory::FrequentRestDayAbsence => "frequent_rest_day_absence",
            AttendanceCategory::ThreeAbsences => "three_absences",
            AttendanceCategory::OneOrTwoLateArrivals => "one_or_two_late_arrivals",
            AttendanceCategory::Good => "good",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AttendanceCategory::Over15Absences => Severity::Critical,
            AttendanceCategory::Over5Absences
            | AttendanceCategory::FrequentRestDayAbsence
            | AttendanceCategory::ThreeAbsences => Severity::Warning,
            AttendanceCategory::OneOrTwoLateArrivals => Severity::Info,
            AttendanceCategory::Good => Severity::Good,
        }
    }
}

impl fmt::Display for AttendanceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AttendanceCategory {
    type Err = AnalyticsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        AttendanceCategory::ALL
            .into_iter()
            .find(|category| category.label() == value || category.key() == value)
            .ok_or_else(|| {
                let message = format!("unknown category `{value}`");
                AnalyticsError::invalid("attendance_category", message)
            })
    }
}

/// First matching rule wins. The order is a tie-break policy: heavier absence
/// counts shadow the rest-day and lateness rules.
pub fn classify(stats: &AttendanceStatistics, config: &EngineConfig) -> AttendanceCategory {
    if stats.absent_days > 15 {
        return AttendanceCategory::Over15Absences;
    }

    if stats.absent_days > 5 {
        return AttendanceCategory::Over5Absences;
    }

    if stats.friday_absences >= config.frequent_rest_day_threshold {
        return AttendanceCategory::FrequentRestDayAbsence;
    }

    if stats.absent_days == 3 {
        return AttendanceCategory::ThreeAbsences;
    }

    if (1..=2).contains(&stats.late_days) {
        return AttendanceCategory::OneOrTwoLateArrivals;
    }

    AttendanceCategory::Good
}

pub fn has_frequent_rest_day_absences(stats: &AttendanceStatistics, threshold: u32) -> bool {
    stats.friday_absences >= threshold
}
