use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{GradeRecord, StudentCategory, StudentLevel};

pub const HIGH_LEVEL_THRESHOLD: f64 = 80.0;
pub const MEDIUM_LEVEL_THRESHOLD: f64 = 60.0;

/// Positive diagnostic and formative scores across all records. Each field is
/// its own observation, so one record can contribute two.
pub fn score_observations(grades: &[GradeRecord]) -> Vec<f64> {
    grades
        .iter()
        .flat_map(|grade| [grade.diagnostic_test, grade.formative_test])
        .flatten()
        .filter(|score| *score > 0.0)
        .collect()
}

/// Proficiency level for a student.
///
/// The special-needs category flag short-circuits scoring. Otherwise the mean
/// of all observations decides, and a low mean also lands in `SpecialNeeds`.
/// Those are two separate paths to the same label.
pub fn classify_level(category: StudentCategory, grades: &[GradeRecord]) -> StudentLevel {
    if category.is_special_needs() {
        return StudentLevel::SpecialNeeds;
    }

    level_from_scores(grades)
}

/// Score-based level, ignoring the category flag.
pub fn level_from_scores(grades: &[GradeRecord]) -> StudentLevel {
    let observations = score_observations(grades);
    if observations.is_empty() {
        return StudentLevel::Medium;
    }

    let mean = observations.iter().sum::<f64>() / observations.len() as f64;
    debug!(mean, observations = observations.len(), "level score mean");

    level_for_mean(mean)
}

pub fn level_for_mean(mean: f64) -> StudentLevel {
    if mean >= HIGH_LEVEL_THRESHOLD {
        StudentLevel::High
    } else if mean >= MEDIUM_LEVEL_THRESHOLD {
        StudentLevel::Medium
    } else {
        StudentLevel::SpecialNeeds
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcademicStatus {
    Excellent,
    NeedsSupport,
    AtRisk,
}

impl AcademicStatus {
    pub fn from_average(overall_average: f64) -> Self {
        if overall_average >= 85.0 {
            AcademicStatus::Excellent
        } else if overall_average >= 70.0 {
            AcademicStatus::NeedsSupport
        } else {
            AcademicStatus::AtRisk
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AcademicStatus::Excellent => "excellent",
            AcademicStatus::NeedsSupport => "needs_support",
            AcademicStatus::AtRisk => "at_risk",
        }
    }
}

impl fmt::Display for AcademicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
