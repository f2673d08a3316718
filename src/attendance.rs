use chrono::{Datelike, NaiveDate, Weekday};
use tracing::debug;

use crate::models::{AttendanceRecord, AttendanceStatistics, AttendanceStatus};

/// Inclusive date range over which attendance is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Fills in whichever bound the caller left out. The start falls back to the
    /// beginning of the semester `today` belongs to, the end to `today`.
    pub fn resolve(start: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate) -> Self {
        Self::new(
            start.unwrap_or_else(|| semester_start(today)),
            end.unwrap_or(today),
        )
    }

    pub fn current_semester(today: NaiveDate) -> Self {
        Self::resolve(None, None, today)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

/// September 1st from September onward, February 1st before that.
///
/// In January this yields a start later than `today`, so the default window is
/// empty until February.
pub fn semester_start(today: NaiveDate) -> NaiveDate {
    let month = if today.month0() >= 8 { 9 } else { 2 };
    NaiveDate::from_ymd_opt(today.year(), month, 1).unwrap_or(today)
}

/// Folds a student's attendance records into aggregate counts.
///
/// `records` must be in ascending date order for `consecutive_absences` to mean
/// a run of days. Duplicate dates are counted as separate observations.
pub fn compute_statistics(
    records: &[AttendanceRecord],
    rest_day: Weekday,
) -> AttendanceStatistics {
    let mut stats = AttendanceStatistics {
        total_days: records.len() as u32,
        ..AttendanceStatistics::default()
    };

    let mut current_run = 0u32;

    for record in records {
        match record.status {
            AttendanceStatus::Present => {
                stats.present_days += 1;
                current_run = 0;
            }
            AttendanceStatus::Absent => {
                stats.absent_days += 1;
                current_run += 1;
                stats.consecutive_absences = stats.consecutive_absences.max(current_run);
                if record.date.weekday() == rest_day {
                    stats.friday_absences += 1;
                }
            }
            AttendanceStatus::Late => {
                stats.late_days += 1;
                current_run = 0;
            }
            AttendanceStatus::Excused => {
                stats.excused_days += 1;
                current_run = 0;
            }
        }
    }

    let attended = stats.present_days + stats.late_days;
    stats.attendance_rate = attendance_rate(attended, stats.total_days);

    debug!(
        total = stats.total_days,
        absent = stats.absent_days,
        rate = stats.attendance_rate,
        "attendance statistics computed"
    );

    stats
}

/// Percentage of attended days, rounded to two decimals. Zero when nothing was recorded.
pub fn attendance_rate(attended: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }

    let rate = attended as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}
