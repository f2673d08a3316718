use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::attendance::{self, DateWindow};
use crate::category::{self, AttendanceCategory, Severity};
use crate::config::EngineConfig;
use crate::error::AnalyticsError;
use crate::level::{self, AcademicStatus};
use crate::models::{
    AttendanceStatistics, ClassStanding, StudentCategory, StudentLevel, StudentRecord,
};
use crate::rank;
use crate::store::StudentRecords;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub student_id: Uuid,
    pub statistics: AttendanceStatistics,
    pub category: AttendanceCategory,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentProfile {
    pub student_id: Uuid,
    pub full_name: Option<String>,
    pub class_id: Option<Uuid>,
    pub category: StudentCategory,
    pub cached_level: Option<StudentLevel>,
    pub level: StudentLevel,
    pub class_rank: u32,
    pub academic_average: f64,
    pub academic_status: AcademicStatus,
    pub attendance: AttendanceSummary,
}

impl StudentProfile {
    /// True when the stored level is missing or differs from the computed one.
    pub fn level_is_stale(&self) -> bool {
        self.cached_level != Some(self.level)
    }
}

/// Fetches records through a [`StudentRecords`] store and runs the pure
/// calculators over them. Holds no state between calls.
pub struct AnalyticsEngine<S> {
    store: S,
    config: EngineConfig,
}

impl<S: StudentRecords> AnalyticsEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn attendance_statistics(
        &self,
        student_id: Uuid,
        window: DateWindow,
    ) -> Result<AttendanceStatistics, AnalyticsError> {
        if window.is_empty() {
            debug!(
                %student_id,
                start = %window.start,
                end = %window.end,
                "empty attendance window"
            );
            return Ok(AttendanceStatistics::default());
        }

        let records = self.store.fetch_attendance_records(student_id, window).await?;
        Ok(attendance::compute_statistics(&records, self.config.rest_day))
    }

    pub async fn attendance_summary(
        &self,
        student_id: Uuid,
        window: DateWindow,
    ) -> Result<AttendanceSummary, AnalyticsError> {
        let statistics = self.attendance_statistics(student_id, window).await?;
        let category = category::classify(&statistics, &self.config);

        Ok(AttendanceSummary {
            student_id,
            severity: category.severity(),
            category,
            statistics,
        })
    }

    pub async fn has_frequent_rest_day_absences(
        &self,
        student_id: Uuid,
        window: DateWindow,
        threshold: Option<u32>,
    ) -> Result<bool, AnalyticsError> {
        let statistics = self.attendance_statistics(student_id, window).await?;
        let threshold = threshold.unwrap_or(self.config.frequent_rest_day_threshold);
        Ok(category::has_frequent_rest_day_absences(&statistics, threshold))
    }

    /// Summaries of the given students whose attendance falls in `wanted`.
    pub async fn students_by_category(
        &self,
        wanted: AttendanceCategory,
        student_ids: &[Uuid],
        window: DateWindow,
    ) -> Result<Vec<AttendanceSummary>, AnalyticsError> {
        let mut matches = Vec::new();

        for student_id in student_ids {
            let summary = self.attendance_summary(*student_id, window).await?;
            if summary.category == wanted {
                matches.push(summary);
            }
        }

        debug!(
            category = %wanted,
            checked = student_ids.len(),
            matched = matches.len(),
            "category filter"
        );
        Ok(matches)
    }

    /// Computes the level only; persisting it is up to the caller.
    pub async fn student_level(&self, student_id: Uuid) -> Result<StudentLevel, AnalyticsError> {
        let category = self
            .store
            .fetch_student(student_id)
            .await?
            .map(|student| student.category)
            .unwrap_or_default();

        if category.is_special_needs() {
            return Ok(StudentLevel::SpecialNeeds);
        }

        let grades = self.store.fetch_student_grades(student_id).await?;
        Ok(level::level_from_scores(&grades))
    }

    pub async fn class_standings(
        &self,
        class_id: Uuid,
    ) -> Result<Vec<ClassStanding>, AnalyticsError> {
        let roster = self.store.fetch_class_roster(class_id).await?;
        if roster.is_empty() {
            return Ok(Vec::new());
        }

        let grades = self.store.fetch_class_grades(class_id).await?;
        Ok(rank::class_standings(&roster, &grades))
    }

    /// 1-based rank inside the class, 0 without a class or when the student is
    /// not enrolled in it.
    pub async fn class_rank(
        &self,
        student_id: Uuid,
        class_id: Option<Uuid>,
    ) -> Result<u32, AnalyticsError> {
        let Some(class_id) = class_id else {
            return Ok(0);
        };

        let roster = self.store.fetch_class_roster(class_id).await?;
        if !roster.contains(&student_id) {
            return Ok(0);
        }

        let grades = self.store.fetch_class_grades(class_id).await?;
        Ok(rank::class_rank(student_id, &roster, &grades))
    }

    pub async fn student_profile(
        &self,
        student_id: Uuid,
        window: DateWindow,
    ) -> Result<StudentProfile, AnalyticsError> {
        let student = self.store.fetch_student(student_id).await?;
        let class_id = student.as_ref().and_then(|s| s.class_id);
        let class_rank = self.class_rank(student_id, class_id).await?;

        self.profile_with_rank(student_id, student, class_rank, window).await
    }

    async fn profile_with_rank(
        &self,
        student_id: Uuid,
        student: Option<StudentRecord>,
        class_rank: u32,
        window: DateWindow,
    ) -> Result<StudentProfile, AnalyticsError> {
        let category = student.as_ref().map(|s| s.category).unwrap_or_default();
        let grades = self.store.fetch_student_grades(student_id).await?;
        let level = level::classify_level(category, &grades);
        let academic_average = rank::student_average(&grades);

        Ok(StudentProfile {
            student_id,
            full_name: student.as_ref().map(|s| s.full_name.clone()),
            class_id: student.as_ref().and_then(|s| s.class_id),
            category,
            cached_level: student.as_ref().map(|s| s.level),
            level,
            class_rank,
            academic_average,
            academic_status: AcademicStatus::from_average(academic_average),
            attendance: self.attendance_summary(student_id, window).await?,
        })
    }

    /// Profiles for every student enrolled in the class, in standings order.
    /// Ranks come from the same standings that fix the order.
    pub async fn class_profiles(
        &self,
        class_id: Uuid,
        window: DateWindow,
    ) -> Result<Vec<StudentProfile>, AnalyticsError> {
        let standings = self.class_standings(class_id).await?;
        let mut profiles = Vec::with_capacity(standings.len());

        for standing in &standings {
            let student = self.store.fetch_student(standing.student_id).await?;
            let profile = self
                .profile_with_rank(standing.student_id, student, standing.rank, window)
                .await?;
            profiles.push(profile);
        }

        Ok(profiles)
    }

    /// Writes `level` back when the stored one differs. Returns whether a
    /// write happened. Students with no stored record are never written.
    pub async fn write_back_level(
        &self,
        student_id: Uuid,
        cached_level: Option<StudentLevel>,
        level: StudentLevel,
    ) -> Result<bool, AnalyticsError> {
        match cached_level {
            Some(cached) if cached != level => {}
            _ => return Ok(false),
        }

        self.store.persist_student_level(student_id, level).await?;

        info!(
            %student_id,
            from = ?cached_level,
            to = %level,
            "student level updated"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging;
    use crate::models::{AttendanceRecord, AttendanceStatus, GradeRecord};
    use crate::store::memory::MemoryStore;
    use chrono::{Duration, NaiveDate, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2026, 10, 16)
    }

    fn student(
        class_id: Option<Uuid>,
        category: StudentCategory,
        level: StudentLevel,
    ) -> StudentRecord {
        StudentRecord {
            id: Uuid::new_v4(),
            full_name: "Avery Lee".to_string(),
            class_id,
            category,
            level,
        }
    }

    fn ranked_grade(student_id: Uuid, percent: f64) -> GradeRecord {
        let quarter = percent * 2.0 / 4.0;
        GradeRecord {
            student_id,
            homework: Some(quarter),
            participation: Some(quarter),
            midterm: Some(quarter),
            final_exam: Some(quarter),
            ..GradeRecord::default()
        }
    }

    fn absences(student_id: Uuid, start: NaiveDate, days: i64) -> Vec<AttendanceRecord> {
        (0..days)
            .map(|offset| AttendanceRecord {
                student_id,
                date: start + Duration::days(offset),
                status: AttendanceStatus::Absent,
            })
            .collect()
    }

    fn engine(store: MemoryStore) -> AnalyticsEngine<MemoryStore> {
        logging::init_test();
        AnalyticsEngine::new(store, EngineConfig::default())
    }

    #[tokio::test]
    async fn unknown_student_gets_defaults_everywhere() {
        let engine = engine(MemoryStore::default());
        let ghost = Uuid::new_v4();
        let window = DateWindow::current_semester(today());

        let summary = engine.attendance_summary(ghost, window).await.unwrap();
        assert_eq!(summary.statistics, AttendanceStatistics::default());
        assert_eq!(summary.category, AttendanceCategory::Good);
        assert_eq!(summary.severity, Severity::Good);

        assert_eq!(engine.student_level(ghost).await.unwrap(), StudentLevel::Medium);
        assert_eq!(engine.class_rank(ghost, None).await.unwrap(), 0);
        assert_eq!(engine.class_rank(ghost, Some(Uuid::new_v4())).await.unwrap(), 0);

        let profile = engine.student_profile(ghost, window).await.unwrap();
        assert_eq!(profile.cached_level, None);
        assert!(profile.level_is_stale());
        assert!(!engine
            .write_back_level(ghost, profile.cached_level, profile.level)
            .await
            .unwrap());
        assert!(engine.store().persisted().is_empty());
    }

    #[tokio::test]
    async fn statistics_only_cover_the_requested_window() {
        let avery = student(None, StudentCategory::Regular, StudentLevel::Medium);
        let mut attendance = absences(avery.id, date(2026, 8, 20), 5);
        attendance.extend(absences(avery.id, date(2026, 9, 7), 3));
        let id = avery.id;
        let engine = engine(MemoryStore {
            students: vec![avery],
            attendance,
            ..MemoryStore::default()
        });

        let semester = engine
            .attendance_summary(id, DateWindow::current_semester(today()))
            .await
            .unwrap();
        assert_eq!(semester.statistics.absent_days, 3);
        assert_eq!(semester.category, AttendanceCategory::ThreeAbsences);

        let summer = DateWindow::new(date(2026, 8, 1), date(2026, 9, 30));
        let wide = engine.attendance_statistics(id, summer).await.unwrap();
        assert_eq!(wide.absent_days, 8);
        // Runs follow recorded days; a stretch with no records does not end one.
        assert_eq!(wide.consecutive_absences, 8);

        let january = DateWindow::current_semester(date(2026, 1, 10));
        let empty = engine.attendance_statistics(id, january).await.unwrap();
        assert_eq!(empty, AttendanceStatistics::default());
    }

    #[tokio::test]
    async fn filters_students_by_category_and_rest_day() {
        let steady = student(None, StudentCategory::Regular, StudentLevel::Medium);
        let fridays = student(None, StudentCategory::Regular, StudentLevel::Medium);
        let rest_days = [date(2026, 9, 4), date(2026, 9, 11), date(2026, 9, 18)];
        let attendance: Vec<AttendanceRecord> = rest_days
            .into_iter()
            .map(|day| AttendanceRecord {
                student_id: fridays.id,
                date: day,
                status: AttendanceStatus::Absent,
            })
            .collect();
        let ids = vec![steady.id, fridays.id];
        let (steady_id, fridays_id) = (steady.id, fridays.id);
        let engine = engine(MemoryStore {
            students: vec![steady, fridays],
            attendance,
            ..MemoryStore::default()
        });
        let window = DateWindow::current_semester(today());

        let matched = engine
            .students_by_category(AttendanceCategory::FrequentRestDayAbsence, &ids, window)
            .await
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].student_id, fridays_id);
        assert_eq!(matched[0].severity, Severity::Warning);

        let frequent = engine.has_frequent_rest_day_absences(fridays_id, window, None);
        assert!(frequent.await.unwrap());
        let above_threshold = engine.has_frequent_rest_day_absences(fridays_id, window, Some(4));
        assert!(!above_threshold.await.unwrap());
        let steady = engine.has_frequent_rest_day_absences(steady_id, window, None);
        assert!(!steady.await.unwrap());

        let saturdays = EngineConfig::new(Weekday::Sat, 3);
        let saturday_engine = AnalyticsEngine::new(engine.store, saturdays);
        let shifted = saturday_engine.attendance_summary(fridays_id, window).await.unwrap();
        assert_eq!(shifted.statistics.friday_absences, 0);
        assert_eq!(shifted.category, AttendanceCategory::ThreeAbsences);
    }

    #[tokio::test]
    async fn special_needs_flag_short_circuits_level() {
        let flagged = student(None, StudentCategory::PeopleOfDetermination, StudentLevel::Medium);
        let grades = vec![GradeRecord {
            student_id: flagged.id,
            diagnostic_test: Some(95.0),
            formative_test: Some(99.0),
            ..GradeRecord::default()
        }];
        let id = flagged.id;
        let engine = engine(MemoryStore {
            students: vec![flagged],
            grades,
            ..MemoryStore::default()
        });

        assert_eq!(engine.student_level(id).await.unwrap(), StudentLevel::SpecialNeeds);
    }

    #[tokio::test]
    async fn high_scores_produce_high_level_and_stale_cache_is_written_back() {
        let avery = student(None, StudentCategory::Regular, StudentLevel::Medium);
        let grades = vec![GradeRecord {
            student_id: avery.id,
            diagnostic_test: Some(90.0),
            formative_test: Some(85.0),
            ..GradeRecord::default()
        }];
        let id = avery.id;
        let engine = engine(MemoryStore {
            students: vec![avery],
            grades,
            ..MemoryStore::default()
        });

        assert_eq!(engine.student_level(id).await.unwrap(), StudentLevel::High);

        let profile = engine
            .student_profile(id, DateWindow::current_semester(today()))
            .await
            .unwrap();
        assert!(profile.level_is_stale());
        assert!(engine
            .write_back_level(id, profile.cached_level, profile.level)
            .await
            .unwrap());
        assert_eq!(engine.store().persisted(), vec![(id, StudentLevel::High)]);
    }

    #[tokio::test]
    async fn up_to_date_level_is_not_rewritten() {
        let avery = student(None, StudentCategory::Regular, StudentLevel::Medium);
        let id = avery.id;
        let engine = engine(MemoryStore {
            students: vec![avery],
            ..MemoryStore::default()
        });

        let profile = engine
            .student_profile(id, DateWindow::current_semester(today()))
            .await
            .unwrap();
        assert_eq!(profile.level, StudentLevel::Medium);
        assert!(!engine
            .write_back_level(id, profile.cached_level, profile.level)
            .await
            .unwrap());
        assert!(engine.store().persisted().is_empty());
    }

    #[tokio::test]
    async fn ranks_within_the_class_cohort() {
        let class_id = Uuid::new_v4();
        let low = student(Some(class_id), StudentCategory::Regular, StudentLevel::Medium);
        let top = student(Some(class_id), StudentCategory::Regular, StudentLevel::Medium);
        let middle = student(Some(class_id), StudentCategory::Regular, StudentLevel::Medium);
        let other_class = Some(Uuid::new_v4());
        let elsewhere = student(other_class, StudentCategory::Regular, StudentLevel::Medium);
        let grades = vec![
            ranked_grade(low.id, 40.0),
            ranked_grade(top.id, 90.0),
            ranked_grade(middle.id, 70.0),
            ranked_grade(elsewhere.id, 100.0),
        ];
        let (low_id, top_id, middle_id, elsewhere_id) = (low.id, top.id, middle.id, elsewhere.id);
        let engine = engine(MemoryStore {
            students: vec![low, top, middle, elsewhere],
            grades,
            ..MemoryStore::default()
        });

        assert_eq!(engine.class_rank(middle_id, Some(class_id)).await.unwrap(), 2);
        assert_eq!(engine.class_rank(top_id, Some(class_id)).await.unwrap(), 1);
        assert_eq!(engine.class_rank(low_id, Some(class_id)).await.unwrap(), 3);
        assert_eq!(engine.class_rank(elsewhere_id, Some(class_id)).await.unwrap(), 0);

        let profiles = engine
            .class_profiles(class_id, DateWindow::current_semester(today()))
            .await
            .unwrap();
        let order: Vec<Uuid> = profiles.iter().map(|p| p.student_id).collect();
        assert_eq!(order, vec![top_id, middle_id, low_id]);
        assert_eq!(profiles[0].academic_status, AcademicStatus::Excellent);
        assert_eq!(profiles[1].academic_status, AcademicStatus::NeedsSupport);
        assert_eq!(profiles[2].class_rank, 3);
    }

    #[tokio::test]
    async fn class_profiles_take_ranks_from_one_standings_pass() {
        let class_id = Uuid::new_v4();
        let roster: Vec<StudentRecord> = (0..4)
            .map(|_| student(Some(class_id), StudentCategory::Regular, StudentLevel::Medium))
            .collect();
        // Two students tie on 75% to exercise the id tie-break.
        let grades = vec![
            ranked_grade(roster[0].id, 75.0),
            ranked_grade(roster[1].id, 95.0),
            ranked_grade(roster[2].id, 75.0),
            ranked_grade(roster[3].id, 50.0),
        ];
        let engine = engine(MemoryStore {
            students: roster,
            grades,
            ..MemoryStore::default()
        });

        let standings = engine.class_standings(class_id).await.unwrap();
        let before = engine.store().roster_fetch_count();
        let profiles = engine
            .class_profiles(class_id, DateWindow::current_semester(today()))
            .await
            .unwrap();
        assert_eq!(engine.store().roster_fetch_count() - before, 1);

        assert_eq!(profiles.len(), standings.len());
        for (profile, standing) in profiles.iter().zip(&standings) {
            assert_eq!(profile.student_id, standing.student_id);
            assert_eq!(profile.class_rank, standing.rank);
        }
        let ranks: Vec<u32> = profiles.iter().map(|p| p.class_rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }
}
