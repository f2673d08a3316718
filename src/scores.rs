use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;
use crate::models::GradeRecord;

/// Every score field a grade row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    Homework,
    Participation,
    Midterm,
    Final,
    DiagnosticTest,
    FormativeTest,
    FinalTest,
    SemesterGrade,
}

impl ScoreKind {
    pub const ALL: [ScoreKind; 8] = [
        ScoreKind::Homework,
        ScoreKind::Participation,
        ScoreKind::Midterm,
        ScoreKind::Final,
        ScoreKind::DiagnosticTest,
        ScoreKind::FormativeTest,
        ScoreKind::FinalTest,
        ScoreKind::SemesterGrade,
    ];

    /// Column holding this score in `school_analytics.grades`.
    pub fn column(&self) -> &'static str {
        match self {
            ScoreKind::Homework => "homework",
            ScoreKind::Participation => "participation",
            ScoreKind::Midterm => "midterm",
            ScoreKind::Final => "final_exam",
            ScoreKind::DiagnosticTest => "diagnostic_test",
            ScoreKind::FormativeTest => "formative_test",
            ScoreKind::FinalTest => "final_test",
            ScoreKind::SemesterGrade => "semester_grade",
        }
    }

    pub fn field<'a>(&self, grade: &'a mut GradeRecord) -> &'a mut Option<f64> {
        match self {
            ScoreKind::Homework => &mut grade.homework,
            ScoreKind::Participation => &mut grade.participation,
            ScoreKind::Midterm => &mut grade.midterm,
            ScoreKind::Final => &mut grade.final_exam,
            ScoreKind::DiagnosticTest => &mut grade.diagnostic_test,
            ScoreKind::FormativeTest => &mut grade.formative_test,
            ScoreKind::FinalTest => &mut grade.final_test,
            ScoreKind::SemesterGrade => &mut grade.semester_grade,
        }
    }

    pub fn get(&self, grade: &GradeRecord) -> Option<f64> {
        match self {
            ScoreKind::Homework => grade.homework,
            ScoreKind::Participation => grade.participation,
            ScoreKind::Midterm => grade.midterm,
            ScoreKind::Final => grade.final_exam,
            ScoreKind::DiagnosticTest => grade.diagnostic_test,
            ScoreKind::FormativeTest => grade.formative_test,
            ScoreKind::FinalTest => grade.final_test,
            ScoreKind::SemesterGrade => grade.semester_grade,
        }
    }

    /// Scores are finite and non-negative.
    pub fn validate(&self, score: f64) -> Result<(), AnalyticsError> {
        if !score.is_finite() || score < 0.0 {
            return Err(AnalyticsError::invalid(
                self.column(),
                format!("score must be a non-negative number, got {score}"),
            ));
        }
        Ok(())
    }

    pub fn set(&self, grade: &mut GradeRecord, score: f64) -> Result<(), AnalyticsError> {
        self.validate(score)?;
        *self.field(grade) = Some(score);
        Ok(())
    }
}

/// Checks every recorded score on a grade row. Unrecorded scores pass.
pub fn validate_scores(grade: &GradeRecord) -> Result<(), AnalyticsError> {
    for kind in ScoreKind::ALL {
        if let Some(score) = kind.get(grade) {
            kind.validate(score)?;
        }
    }
    Ok(())
}
