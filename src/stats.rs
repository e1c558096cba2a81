//! Derived statistics over repository record sets.
//!
//! Everything here is a pure function recomputed per call. Record slices are
//! consumed in fetch order: attendance arrives sorted by date descending and
//! performance by recorded_at descending. That ordering is a precondition,
//! not re-verified here.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::model::{AttendanceRecord, AttendanceStatus, DayOfWeek, TimetableEntry};

/// 1-decimal rounding, half-up for the non-negative values used here:
/// `Int(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub total_days: usize,
    pub present_days: usize,
    pub absent_days: usize,
    pub late_days: usize,
    pub excused_days: usize,
    pub attendance_rate: f64,
}

pub fn attendance_stats(records: &[AttendanceRecord]) -> AttendanceStats {
    let mut present_days = 0usize;
    let mut absent_days = 0usize;
    let mut late_days = 0usize;
    let mut excused_days = 0usize;

    for r in records {
        match r.status {
            AttendanceStatus::Present => present_days += 1,
            AttendanceStatus::Absent => absent_days += 1,
            AttendanceStatus::Late => late_days += 1,
            AttendanceStatus::Excused => excused_days += 1,
        }
    }

    let total_days = records.len();
    let attendance_rate = if total_days > 0 {
        round_off_1_decimal(100.0 * (present_days + late_days) as f64 / total_days as f64)
    } else {
        0.0
    };

    AttendanceStats {
        total_days,
        present_days,
        absent_days,
        late_days,
        excused_days,
        attendance_rate,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStat {
    pub subject: String,
    pub count: usize,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
    pub average_score: f64,
    pub total_records: usize,
    pub recent_grade: String,
    pub subject_stats: Vec<SubjectStat>,
}

/// A percentage per record (score / max_score * 100), averaged overall and
/// per subject. `recent_grade` is the grade of the first record, which is the
/// latest one under the fetch-order precondition.
pub fn performance_stats(records: &[crate::model::PerformanceRecord]) -> PerformanceStats {
    if records.is_empty() {
        return PerformanceStats {
            average_score: 0.0,
            total_records: 0,
            recent_grade: "N/A".to_string(),
            subject_stats: Vec::new(),
        };
    }

    let mut total = 0.0f64;
    let mut by_subject: HashMap<String, (f64, usize)> = HashMap::new();
    for r in records {
        let percent = if r.max_score > 0.0 {
            100.0 * r.score / r.max_score
        } else {
            0.0
        };
        total += percent;
        let entry = by_subject.entry(r.subject.clone()).or_insert((0.0, 0));
        entry.0 += percent;
        entry.1 += 1;
    }

    let mut subject_stats: Vec<SubjectStat> = by_subject
        .into_iter()
        .map(|(subject, (sum, count))| SubjectStat {
            subject,
            count,
            average: round_off_1_decimal(sum / count as f64),
        })
        .collect();
    subject_stats.sort_by(|a, b| a.subject.cmp(&b.subject));

    PerformanceStats {
        average_score: round_off_1_decimal(total / records.len() as f64),
        total_records: records.len(),
        recent_grade: records[0].grade.clone(),
        subject_stats,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyAttendanceDay {
    pub date: String,
    pub day: DayOfWeek,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
}

/// Buckets records into the 7 calendar days of the Monday-started week
/// containing `anchor`. Days without records keep all-zero counts; the series
/// is always exactly 7 entries.
pub fn weekly_attendance_series(
    records: &[AttendanceRecord],
    anchor: NaiveDate,
) -> Vec<WeeklyAttendanceDay> {
    let monday = anchor - Duration::days(anchor.weekday().num_days_from_monday() as i64);

    let mut by_date: HashMap<String, (usize, usize, usize, usize)> = HashMap::new();
    for r in records {
        let entry = by_date.entry(r.date.clone()).or_insert((0, 0, 0, 0));
        match r.status {
            AttendanceStatus::Present => entry.0 += 1,
            AttendanceStatus::Absent => entry.1 += 1,
            AttendanceStatus::Late => entry.2 += 1,
            AttendanceStatus::Excused => entry.3 += 1,
        }
    }

    const DAYS: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    (0..7)
        .map(|i| {
            let date = monday + Duration::days(i);
            let key = date.format("%Y-%m-%d").to_string();
            let (present, absent, late, excused) =
                by_date.get(&key).copied().unwrap_or((0, 0, 0, 0));
            WeeklyAttendanceDay {
                date: key,
                day: DAYS[i as usize],
                present,
                absent,
                late,
                excused,
            }
        })
        .collect()
}

/// Cached-list filter backing the "today's classes" view.
pub fn entries_for_day<'a>(records: &'a [TimetableEntry], day: DayOfWeek) -> Vec<&'a TimetableEntry> {
    records.iter().filter(|e| e.day == day).collect()
}
