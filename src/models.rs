use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AnalyticsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = AnalyticsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            "excused" => Ok(AttendanceStatus::Excused),
            other => Err(AnalyticsError::invalid(
                "status",
                format!("unknown attendance status `{other}`"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// One grade row per (student, subject, semester, academic year).
/// A `None` or zero score means the score has not been recorded yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub semester: i32,
    pub academic_year: String,
    pub diagnostic_test: Option<f64>,
    pub formative_test: Option<f64>,
    pub final_test: Option<f64>,
    pub semester_grade: Option<f64>,
    pub homework: Option<f64>,
    pub participation: Option<f64>,
    pub midterm: Option<f64>,
    pub final_exam: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentCategory {
    #[default]
    Regular,
    /// The designated special-needs category.
    PeopleOfDetermination,
    DecreeHolders,
    ChildrenOfCitizenMothers,
}

impl StudentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentCategory::Regular => "regular",
            StudentCategory::PeopleOfDetermination => "people_of_determination",
            StudentCategory::DecreeHolders => "decree_holders",
            StudentCategory::ChildrenOfCitizenMothers => "children_of_citizen_mothers",
        }
    }

    pub fn is_special_needs(&self) -> bool {
        matches!(self, StudentCategory::PeopleOfDetermination)
    }
}

impl FromStr for StudentCategory {
    type Err = AnalyticsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "" | "regular" => Ok(StudentCategory::Regular),
            "people_of_determination" => Ok(StudentCategory::PeopleOfDetermination),
            "decree_holders" => Ok(StudentCategory::DecreeHolders),
            "children_of_citizen_mothers" => Ok(StudentCategory::ChildrenOfCitizenMothers),
            other => Err(AnalyticsError::invalid(
                "student_category",
                format!("unknown student category `{other}`"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentLevel {
    High,
    #[default]
    Medium,
    SpecialNeeds,
}

impl StudentLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentLevel::High => "high",
            StudentLevel::Medium => "medium",
            StudentLevel::SpecialNeeds => "special_needs",
        }
    }
}

impl fmt::Display for StudentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudentLevel {
    type Err = AnalyticsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "high" => Ok(StudentLevel::High),
            "medium" => Ok(StudentLevel::Medium),
            "special_needs" => Ok(StudentLevel::SpecialNeeds),
            other => Err(AnalyticsError::invalid(
                "student_level",
                format!("unknown student level `{other}`"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: Uuid,
    pub full_name: String,
    pub class_id: Option<Uuid>,
    pub category: StudentCategory,
    /// Cached classification, written back by the caller.
    pub level: StudentLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceStatistics {
    pub total_days: u32,
    pub present_days: u32,
    pub absent_days: u32,
    pub late_days: u32,
    pub excused_days: u32,
    /// Absences that fell on the configured weekly rest day.
    pub friday_absences: u32,
    /// Longest run of consecutive absent records, in date order.
    pub consecutive_absences: u32,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassStanding {
    pub student_id: Uuid,
    pub average: f64,
    pub rank: u32,
}
