use std::collections::HashMap;
use std::fmt::Write;

use crate::analytics::StudentProfile;
use crate::attendance::DateWindow;
use crate::category::AttendanceCategory;
use crate::models::StudentLevel;

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCount {
    pub category: AttendanceCategory,
    pub count: usize,
}

/// Category counts in rule-chain order, skipping categories nobody is in.
pub fn summarize_by_category(profiles: &[StudentProfile]) -> Vec<CategoryCount> {
    let mut counts: HashMap<AttendanceCategory, usize> = HashMap::new();
    for profile in profiles {
        *counts.entry(profile.attendance.category).or_insert(0) += 1;
    }

    AttendanceCategory::ALL
        .into_iter()
        .filter_map(|category| {
            counts
                .get(&category)
                .map(|count| CategoryCount { category, count: *count })
        })
        .collect()
}

pub fn count_levels(profiles: &[StudentProfile]) -> [(StudentLevel, usize); 3] {
    let mut levels = [
        (StudentLevel::High, 0),
        (StudentLevel::Medium, 0),
        (StudentLevel::SpecialNeeds, 0),
    ];
    for profile in profiles {
        if let Some(entry) = levels.iter_mut().find(|(level, _)| *level == profile.level) {
            entry.1 += 1;
        }
    }
    levels
}

fn display_name(profile: &StudentProfile) -> String {
    profile
        .full_name
        .clone()
        .unwrap_or_else(|| profile.student_id.to_string())
}

/// Markdown report for one class. `profiles` are expected in standings order.
pub fn build_report(class_label: &str, window: DateWindow, profiles: &[StudentProfile]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Class Analytics Report");
    let _ = writeln!(
        output,
        "Generated for {} (attendance from {} to {})",
        class_label, window.start, window.end
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Attendance Categories");

    let summaries = summarize_by_category(profiles);
    if summaries.is_empty() {
        let _ = writeln!(output, "No students enrolled in this class.");
    } else {
        for summary in &summaries {
            let _ = writeln!(
                output,
                "- {} ({}): {} students",
                summary.category,
                summary.category.severity(),
                summary.count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Levels");
    if profiles.is_empty() {
        let _ = writeln!(output, "No students enrolled in this class.");
    } else {
        for (level, count) in count_levels(profiles) {
            let _ = writeln!(output, "- {}: {}", level, count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Standings");
    if profiles.is_empty() {
        let _ = writeln!(output, "No standings for this class.");
    } else {
        let _ = writeln!(output, "| Rank | Student | Average | Status | Level | Attendance |");
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for profile in profiles {
            let _ = writeln!(
                output,
                "| {} | {} | {:.2} | {} | {} | {:.2}% |",
                profile.class_rank,
                display_name(profile),
                profile.academic_average,
                profile.academic_status,
                profile.level,
                profile.attendance.statistics.attendance_rate
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Attendance Follow-up");

    let mut follow_up: Vec<&StudentProfile> = profiles
        .iter()
        .filter(|profile| profile.attendance.severity.needs_follow_up())
        .collect();
    follow_up.sort_by(|a, b| {
        b.attendance
            .severity
            .cmp(&a.attendance.severity)
            .then(b.attendance.statistics.absent_days.cmp(&a.attendance.statistics.absent_days))
    });

    if follow_up.is_empty() {
        let _ = writeln!(output, "No students need attendance follow-up.");
    } else {
        for profile in follow_up {
            let stats = &profile.attendance.statistics;
            let _ = writeln!(
                output,
                "- {}: {} [{}], {} absences ({} on rest day, longest run {})",
                display_name(profile),
                profile.attendance.category,
                profile.attendance.severity,
                stats.absent_days,
                stats.friday_absences,
                stats.consecutive_absences
            );
        }
    }

    output
}
