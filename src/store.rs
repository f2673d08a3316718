use async_trait::async_trait;
use uuid::Uuid;

use crate::attendance::DateWindow;
use crate::error::AnalyticsError;
use crate::models::{AttendanceRecord, GradeRecord, StudentLevel, StudentRecord};

/// Read access the analytics engine needs from storage, plus the level
/// write-back callers trigger when a cached level goes stale.
#[async_trait]
pub trait StudentRecords: Send + Sync {
    async fn fetch_student(
        &self,
        student_id: Uuid,
    ) -> Result<Option<StudentRecord>, AnalyticsError>;

    /// Records inside `window` (inclusive), ascending by date.
    async fn fetch_attendance_records(
        &self,
        student_id: Uuid,
        window: DateWindow,
    ) -> Result<Vec<AttendanceRecord>, AnalyticsError>;

    async fn fetch_student_grades(
        &self,
        student_id: Uuid,
    ) -> Result<Vec<GradeRecord>, AnalyticsError>;

    /// Ids of every student enrolled in the class.
    async fn fetch_class_roster(&self, class_id: Uuid) -> Result<Vec<Uuid>, AnalyticsError>;

    /// Grade records of every student enrolled in the class.
    async fn fetch_class_grades(&self, class_id: Uuid) -> Result<Vec<GradeRecord>, AnalyticsError>;

    async fn persist_student_level(
        &self,
        student_id: Uuid,
        level: StudentLevel,
    ) -> Result<(), AnalyticsError>;
}

#[cfg(test)]
pub mod memory {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// In-memory store for engine tests.
    #[derive(Default)]
    pub struct MemoryStore {
        pub students: Vec<StudentRecord>,
        pub attendance: Vec<AttendanceRecord>,
        pub grades: Vec<GradeRecord>,
        pub persisted_levels: Mutex<Vec<(Uuid, StudentLevel)>>,
        pub roster_fetches: AtomicUsize,
    }

    impl MemoryStore {
        pub fn persisted(&self) -> Vec<(Uuid, StudentLevel)> {
            self.persisted_levels
                .lock()
                .map(|levels| levels.clone())
                .unwrap_or_default()
        }

        pub fn roster_fetch_count(&self) -> usize {
            self.roster_fetches.load(Ordering::SeqCst)
        }

        fn roster(&self, class_id: Uuid) -> Vec<Uuid> {
            self.students
                .iter()
                .filter(|s| s.class_id == Some(class_id))
                .map(|s| s.id)
                .collect()
        }
    }

    #[async_trait]
    impl StudentRecords for MemoryStore {
        async fn fetch_student(
            &self,
            student_id: Uuid,
        ) -> Result<Option<StudentRecord>, AnalyticsError> {
            Ok(self.students.iter().find(|s| s.id == student_id).cloned())
        }

        async fn fetch_attendance_records(
            &self,
            student_id: Uuid,
            window: DateWindow,
        ) -> Result<Vec<AttendanceRecord>, AnalyticsError> {
            let mut records: Vec<AttendanceRecord> = self
                .attendance
                .iter()
                .filter(|r| r.student_id == student_id && window.contains(r.date))
                .cloned()
                .collect();
            records.sort_by_key(|r| r.date);
            Ok(records)
        }

        async fn fetch_student_grades(
            &self,
            student_id: Uuid,
        ) -> Result<Vec<GradeRecord>, AnalyticsError> {
            Ok(self
                .grades
                .iter()
                .filter(|g| g.student_id == student_id)
                .cloned()
                .collect())
        }

        async fn fetch_class_roster(&self, class_id: Uuid) -> Result<Vec<Uuid>, AnalyticsError> {
            self.roster_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.roster(class_id))
        }

        async fn fetch_class_grades(
            &self,
            class_id: Uuid,
        ) -> Result<Vec<GradeRecord>, AnalyticsError> {
            let roster = self.roster(class_id);
            Ok(self
                .grades
                .iter()
                .filter(|g| roster.contains(&g.student_id))
                .cloned()
                .collect())
        }

        async fn persist_student_level(
            &self,
            student_id: Uuid,
            level: StudentLevel,
        ) -> Result<(), AnalyticsError> {
            if let Ok(mut levels) = self.persisted_levels.lock() {
                levels.push((student_id, level));
            }
            Ok(())
        }
    }
}
