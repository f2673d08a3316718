use anyhow::Context;
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::attendance::DateWindow;
use crate::error::AnalyticsError;
use crate::models::{
    AttendanceRecord, AttendanceStatus, GradeRecord, StudentCategory, StudentLevel, StudentRecord,
};
use crate::scores::{validate_scores, ScoreKind};
use crate::store::StudentRecords;

const GRADE_COLUMNS: &str = "student_id, subject_id, semester, academic_year, \
     diagnostic_test, formative_test, final_test, semester_grade, \
     homework, participation, midterm, final_exam";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed [`StudentRecords`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn student_from_row(row: &PgRow) -> Result<StudentRecord, AnalyticsError> {
    let category: String = row.try_get("student_category")?;
    let level: String = row.try_get("student_level")?;

    Ok(StudentRecord {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        class_id: row.try_get("class_id")?,
        category: category.parse()?,
        level: level.parse()?,
    })
}

fn grade_from_row(row: &PgRow) -> Result<GradeRecord, AnalyticsError> {
    Ok(GradeRecord {
        student_id: row.try_get("student_id")?,
        subject_id: row.try_get("subject_id")?,
        semester: row.try_get("semester")?,
        academic_year: row.try_get("academic_year")?,
        diagnostic_test: row.try_get("diagnostic_test")?,
        formative_test: row.try_get("formative_test")?,
        final_test: row.try_get("final_test")?,
        semester_grade: row.try_get("semester_grade")?,
        homework: row.try_get("homework")?,
        participation: row.try_get("participation")?,
        midterm: row.try_get("midterm")?,
        final_exam: row.try_get("final_exam")?,
    })
}

#[async_trait]
impl StudentRecords for PgStore {
    async fn fetch_student(
        &self,
        student_id: Uuid,
    ) -> Result<Option<StudentRecord>, AnalyticsError> {
        let row = sqlx::query(
            "SELECT id, full_name, class_id, student_category, student_level \
             FROM school_analytics.students WHERE id = $1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(student_from_row).transpose()
    }

    async fn fetch_attendance_records(
        &self,
        student_id: Uuid,
        window: DateWindow,
    ) -> Result<Vec<AttendanceRecord>, AnalyticsError> {
        let rows = sqlx::query(
            "SELECT student_id, date, status FROM school_analytics.attendance \
             WHERE student_id = $1 AND date BETWEEN $2 AND $3 \
             ORDER BY date ASC",
        )
        .bind(student_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.try_get("status")?;
            records.push(AttendanceRecord {
                student_id: row.try_get("student_id")?,
                date: row.try_get("date")?,
                status: status.parse()?,
            });
        }

        Ok(records)
    }

    async fn fetch_student_grades(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<GradeRecord>, AnalyticsError> {
        let query =
            format!("SELECT {GRADE_COLUMNS} FROM school_analytics.grades WHERE student_id = $1");
        let rows = sqlx::query(&query)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(grade_from_row).collect()
    }

    async fn fetch_class_roster(&self, class_id: Uuid) -> Result<Vec<Uuid>, AnalyticsError> {
        let rows = sqlx::query(
            "SELECT id FROM school_analytics.students WHERE class_id = $1 ORDER BY id",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("id").map_err(AnalyticsError::from))
            .collect()
    }

    async fn fetch_class_grades(&self, class_id: Uuid) -> Result<Vec<GradeRecord>, AnalyticsError> {
        let query = format!(
            "SELECT {} FROM school_analytics.grades g \
             JOIN school_analytics.students s ON s.id = g.student_id \
             WHERE s.class_id = $1",
            GRADE_COLUMNS
                .split(", ")
                .map(|column| format!("g.{}", column.trim()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let rows = sqlx::query(&query).bind(class_id).fetch_all(&self.pool).await?;

        rows.iter().map(grade_from_row).collect()
    }

    async fn persist_student_level(
        &self,
        student_id: Uuid,
        level: StudentLevel,
    ) -> Result<(), AnalyticsError> {
        let result = sqlx::query(
            "UPDATE school_analytics.students SET student_level = $2 WHERE id = $1",
        )
        .bind(student_id)
        .bind(level.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AnalyticsError::UnknownStudent(student_id));
        }

        Ok(())
    }
}

/// Upsert statement that sets a single score column on the grade row keyed by
/// (student, subject, semester, academic year).
pub fn grade_upsert_sql(kind: ScoreKind) -> String {
    let column = kind.column();
    format!(
        "INSERT INTO school_analytics.grades \
         (id, student_id, subject_id, semester, academic_year, {column}) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (student_id, subject_id, semester, academic_year) \
         DO UPDATE SET {column} = EXCLUDED.{column}"
    )
}

#[derive(Debug, Clone)]
pub struct GradeEntry {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub semester: i32,
    pub academic_year: String,
    pub kind: ScoreKind,
    pub score: f64,
}

pub async fn record_grade(pool: &PgPool, entry: &GradeEntry) -> Result<(), AnalyticsError> {
    let mut scratch = GradeRecord::default();
    entry.kind.set(&mut scratch, entry.score)?;

    let exists = sqlx::query("SELECT 1 FROM school_analytics.students WHERE id = $1")
        .bind(entry.student_id)
        .fetch_optional(pool)
        .await?
        .is_some();
    if !exists {
        return Err(AnalyticsError::UnknownStudent(entry.student_id));
    }

    sqlx::query(&grade_upsert_sql(entry.kind))
        .bind(Uuid::new_v4())
        .bind(entry.student_id)
        .bind(entry.subject_id)
        .bind(entry.semester)
        .bind(&entry.academic_year)
        .bind(entry.kind.get(&scratch))
        .execute(pool)
        .await?;

    info!(
        student_id = %entry.student_id,
        column = entry.kind.column(),
        score = entry.score,
        "grade recorded"
    );
    Ok(())
}

async fn upsert_student(
    pool: &PgPool,
    id: Uuid,
    full_name: &str,
    class_id: Option<Uuid>,
    category: StudentCategory,
) -> Result<(), AnalyticsError> {
    sqlx::query(
        r#"
        INSERT INTO school_analytics.students (id, full_name, class_id, student_category)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            class_id = EXCLUDED.class_id,
            student_category = EXCLUDED.student_category
        "#,
    )
    .bind(id)
    .bind(full_name)
    .bind(class_id)
    .bind(category.as_str())
    .execute(pool)
    .await?;

    Ok(())
}

async fn upsert_attendance(
    pool: &PgPool,
    record: &AttendanceRecord,
) -> Result<bool, AnalyticsError> {
    let result = sqlx::query(
        r#"
        INSERT INTO school_analytics.attendance (id, student_id, date, status)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (student_id, date) DO UPDATE SET status = EXCLUDED.status
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(record.student_id)
    .bind(record.date)
    .bind(record.status.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn upsert_grade(pool: &PgPool, grade: &GradeRecord) -> Result<bool, AnalyticsError> {
    let result = sqlx::query(
        r#"
        INSERT INTO school_analytics.grades
        (id, student_id, subject_id, semester, academic_year,
         diagnostic_test, formative_test, final_test, semester_grade,
         homework, participation, midterm, final_exam)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (student_id, subject_id, semester, academic_year) DO UPDATE
        SET diagnostic_test = EXCLUDED.diagnostic_test,
            formative_test = EXCLUDED.formative_test,
            final_test = EXCLUDED.final_test,
            semester_grade = EXCLUDED.semester_grade,
            homework = EXCLUDED.homework,
            participation = EXCLUDED.participation,
            midterm = EXCLUDED.midterm,
            final_exam = EXCLUDED.final_exam
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(grade.student_id)
    .bind(grade.subject_id)
    .bind(grade.semester)
    .bind(&grade.academic_year)
    .bind(grade.diagnostic_test)
    .bind(grade.formative_test)
    .bind(grade.final_test)
    .bind(grade.semester_grade)
    .bind(grade.homework)
    .bind(grade.participation)
    .bind(grade.midterm)
    .bind(grade.final_exam)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Class used by the seed data.
pub const SEED_CLASS_ID: &str = "6f1c2d1e-0b7a-4c52-9f0e-6a3b1e8d2c41";

/// Status a seeded student gets on `day`. Each profile exercises a different
/// attendance category.
fn seed_status(profile: usize, day: NaiveDate, index: usize) -> AttendanceStatus {
    match profile {
        0 => match index {
            4 | 11 => AttendanceStatus::Late,
            _ => AttendanceStatus::Present,
        },
        1 if day.weekday() == Weekday::Fri => AttendanceStatus::Absent,
        2 if index % 3 == 0 => AttendanceStatus::Absent,
        2 if index % 7 == 1 => AttendanceStatus::Excused,
        _ => AttendanceStatus::Present,
    }
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let class_id = Uuid::parse_str(SEED_CLASS_ID)?;
    let subject_id = Uuid::parse_str("a2b4c6d8-1e3f-4a5b-8c7d-9e0f1a2b3c4d")?;
    let students = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Avery Lee",
            StudentCategory::Regular,
            (92.0, 88.0, [18.0, 19.0, 45.0, 90.0]),
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Jules Moreno",
            StudentCategory::DecreeHolders,
            (70.0, 64.0, [14.0, 12.0, 35.0, 70.0]),
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Kiara Patel",
            StudentCategory::PeopleOfDetermination,
            (55.0, 61.0, [10.0, 15.0, 28.0, 52.0]),
        ),
    ];

    let first_day = NaiveDate::from_ymd_opt(2026, 9, 1).context("invalid date")?;
    let school_days: Vec<NaiveDate> = (0..45)
        .map(|offset| first_day + Duration::days(offset))
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .collect();

    for (profile, student) in students.into_iter().enumerate() {
        let (id, name, category, (diagnostic, formative, ranked)) = student;
        upsert_student(pool, id, name, Some(class_id), category).await?;

        for (index, day) in school_days.iter().enumerate() {
            let record = AttendanceRecord {
                student_id: id,
                date: *day,
                status: seed_status(profile, *day, index),
            };
            upsert_attendance(pool, &record).await?;
        }

        let grade = GradeRecord {
            student_id: id,
            subject_id,
            semester: 1,
            academic_year: "2026-2027".to_string(),
            diagnostic_test: Some(diagnostic),
            formative_test: Some(formative),
            homework: Some(ranked[0]),
            participation: Some(ranked[1]),
            midterm: Some(ranked[2]),
            final_exam: Some(ranked[3]),
            ..GradeRecord::default()
        };
        upsert_grade(pool, &grade).await?;
    }

    info!(days = school_days.len(), "seed data written");
    Ok(())
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub students: usize,
    pub attendance: usize,
    pub grades: usize,
    pub skipped: usize,
}

pub async fn import_students(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> Result<usize, AnalyticsError> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        id: Uuid,
        full_name: String,
        class_id: Option<Uuid>,
        student_category: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let category = row
            .student_category
            .as_deref()
            .unwrap_or_default()
            .parse::<StudentCategory>()?;
        upsert_student(pool, row.id, &row.full_name, row.class_id, category).await?;
        imported += 1;
    }

    Ok(imported)
}

/// Rows for unknown students or with an unknown status are skipped and counted.
pub async fn import_attendance(
    pool: &PgPool,
    csv_path: &std::path::Path,
    summary: &mut ImportSummary,
) -> Result<(), AnalyticsError> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_id: Uuid,
        date: NaiveDate,
        status: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let status = match row.status.parse::<AttendanceStatus>() {
            Ok(status) => status,
            Err(err) => {
                warn!(line = line + 2, %err, "skipping attendance row");
                summary.skipped += 1;
                continue;
            }
        };

        let record = AttendanceRecord {
            student_id: row.student_id,
            date: row.date,
            status,
        };

        match upsert_attendance(pool, &record).await {
            Ok(true) => summary.attendance += 1,
            Ok(false) => {}
            Err(AnalyticsError::Storage(sqlx::Error::Database(err)))
                if err.is_foreign_key_violation() =>
            {
                warn!(
                    line = line + 2,
                    student_id = %row.student_id,
                    "skipping attendance for unknown student"
                );
                summary.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

/// Decodes grade rows, skipping and counting rows with an invalid score.
pub fn read_grade_rows<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    summary: &mut ImportSummary,
) -> Result<Vec<GradeRecord>, AnalyticsError> {
    let mut grades = Vec::new();

    for (line, result) in reader.deserialize::<GradeRecord>().enumerate() {
        let grade = result?;
        if let Err(err) = validate_scores(&grade) {
            warn!(line = line + 2, %err, "skipping grade row");
            summary.skipped += 1;
            continue;
        }
        grades.push(grade);
    }

    Ok(grades)
}

pub async fn import_grades(
    pool: &PgPool,
    csv_path: &std::path::Path,
    summary: &mut ImportSummary,
) -> Result<(), AnalyticsError> {
    let grades = read_grade_rows(csv::Reader::from_path(csv_path)?, summary)?;

    for grade in &grades {
        match upsert_grade(pool, grade).await {
            Ok(true) => summary.grades += 1,
            Ok(false) => {}
            Err(AnalyticsError::Storage(sqlx::Error::Database(err)))
                if err.is_foreign_key_violation() =>
            {
                warn!(student_id = %grade.student_id, "skipping grade for unknown student");
                summary.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_upsert_targets_only_the_requested_column() {
        let sql = grade_upsert_sql(ScoreKind::FormativeTest);
        assert!(sql.contains("academic_year, formative_test)"));
        assert!(sql.contains("DO UPDATE SET formative_test = EXCLUDED.formative_test"));
        assert!(!sql.contains("homework"));

        let final_exam = grade_upsert_sql(ScoreKind::Final);
        assert!(final_exam.contains("SET final_exam = EXCLUDED.final_exam"));
    }

    #[test]
    fn seed_profiles_cover_distinct_patterns() {
        let friday = NaiveDate::from_ymd_opt(2026, 9, 4).unwrap();
        let monday = NaiveDate::from_ymd_opt(2026, 9, 7).unwrap();

        assert_eq!(seed_status(0, friday, 4), AttendanceStatus::Late);
        assert_eq!(seed_status(0, monday, 5), AttendanceStatus::Present);
        assert_eq!(seed_status(1, friday, 3), AttendanceStatus::Absent);
        assert_eq!(seed_status(1, monday, 4), AttendanceStatus::Present);
        assert_eq!(seed_status(2, monday, 6), AttendanceStatus::Absent);
        assert_eq!(seed_status(2, monday, 8), AttendanceStatus::Excused);
    }

    #[test]
    fn grade_import_skips_rows_with_invalid_scores() {
        let data = "\
student_id,subject_id,semester,academic_year,diagnostic_test,formative_test,final_test,semester_grade,homework,participation,midterm,final_exam
3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2,a2b4c6d8-1e3f-4a5b-8c7d-9e0f1a2b3c4d,1,2026-2027,90,85,,,18,19,45,90
0c22f1f1-9184-4fd4-9b21-28c68a6a89dc,a2b4c6d8-1e3f-4a5b-8c7d-9e0f1a2b3c4d,1,2026-2027,70,64,,,NaN,12,35,70
d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2,a2b4c6d8-1e3f-4a5b-8c7d-9e0f1a2b3c4d,1,2026-2027,55,-1,,,10,15,28,52
";
        let mut summary = ImportSummary::default();
        let reader = csv::Reader::from_reader(data.as_bytes());
        let grades = read_grade_rows(reader, &mut summary).unwrap();

        assert_eq!(grades.len(), 1);
        assert_eq!(grades[0].homework, Some(18.0));
        assert_eq!(grades[0].final_test, None);
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn grade_columns_prefix_cleanly() {
        let prefixed: Vec<String> = GRADE_COLUMNS
            .split(", ")
            .map(|column| format!("g.{}", column.trim()))
            .collect();
        assert_eq!(prefixed.len(), 12);
        assert!(prefixed.iter().all(|column| !column.contains(' ')));
    }
}
