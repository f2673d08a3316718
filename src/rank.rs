use std::cmp::Ordering;
use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{ClassStanding, GradeRecord};

/// Homework, participation, midterm and final together are out of 200 points.
pub const RANK_SCALE_POINTS: f64 = 200.0;

pub fn record_percentage(grade: &GradeRecord) -> f64 {
    let total = [grade.homework, grade.participation, grade.midterm, grade.final_exam]
        .into_iter()
        .map(|score| score.unwrap_or(0.0))
        .sum::<f64>();

    total / RANK_SCALE_POINTS * 100.0
}

/// Mean of the per-record percentages; zero for a student with no records.
pub fn student_average<'a>(grades: impl IntoIterator<Item = &'a GradeRecord>) -> f64 {
    let (sum, count) = grades
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), grade| (sum + record_percentage(grade), count + 1));

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Standings for every student on the roster, best average first.
///
/// Grades of students outside the roster are ignored. Equal averages are
/// ordered by student id so repeated runs agree.
pub fn class_standings(roster: &[Uuid], grades: &[GradeRecord]) -> Vec<ClassStanding> {
    let mut by_student: HashMap<Uuid, Vec<&GradeRecord>> = HashMap::new();
    for grade in grades {
        by_student.entry(grade.student_id).or_default().push(grade);
    }

    let mut averages: Vec<(Uuid, f64)> = roster
        .iter()
        .map(|student_id| {
            let average = by_student
                .get(student_id)
                .map(|records| student_average(records.iter().copied()))
                .unwrap_or(0.0);
            (*student_id, average)
        })
        .collect();

    averages.sort_by(|a, b| match b.1.total_cmp(&a.1) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });

    averages
        .into_iter()
        .enumerate()
        .map(|(index, (student_id, average))| ClassStanding {
            student_id,
            average,
            rank: index as u32 + 1,
        })
        .collect()
}

/// 1-based position of `student_id` in the class standings, or 0 when the
/// student is not on the roster.
pub fn class_rank(student_id: Uuid, roster: &[Uuid], grades: &[GradeRecord]) -> u32 {
    class_standings(roster, grades)
        .into_iter()
        .find(|standing| standing.student_id == student_id)
        .map(|standing| standing.rank)
        .unwrap_or(0)
}
