//! Keyword-matched responder: a deterministic local stand-in for a hosted
//! language model, answering from the caller's own scoped aggregates.

use crate::stats::{AttendanceStats, PerformanceStats};

#[derive(Debug, Clone)]
pub struct AssistantContext {
    pub attendance: AttendanceStats,
    pub performance: PerformanceStats,
    pub student_count: i64,
    pub class_count: i64,
}

pub fn respond(prompt: &str, ctx: &AssistantContext) -> String {
    let lower = prompt.to_lowercase();

    if lower.contains("attendance") {
        let a = &ctx.attendance;
        return format!(
            "Attendance analysis: {} recorded day(s) in scope, rate {}% \
             ({} present, {} late, {} absent, {} excused). \
             Students with repeated absences may need early follow-up.",
            a.total_days, a.attendance_rate, a.present_days, a.late_days, a.absent_days,
            a.excused_days
        );
    }

    if lower.contains("performance") || lower.contains("grade") {
        let p = &ctx.performance;
        let strongest = p
            .subject_stats
            .iter()
            .max_by(|a, b| a.average.partial_cmp(&b.average).unwrap_or(std::cmp::Ordering::Equal))
            .map(|s| format!("{} ({}%)", s.subject, s.average))
            .unwrap_or_else(|| "no subject data yet".to_string());
        return format!(
            "Performance insights: average score {}% across {} record(s); \
             most recent grade {}. Strongest subject: {}.",
            p.average_score, p.total_records, p.recent_grade, strongest
        );
    }

    if lower.contains("timetable") || lower.contains("schedule") {
        return "Schedule analysis: timetable entries are validated against \
                overlaps per person and day. Ask for a specific day to see \
                its classes, or add entries from the timetable view."
            .to_string();
    }

    if lower.contains("student") || lower.contains("class") {
        return format!(
            "Overview: {} student(s) across {} class(es) currently visible to \
             you. Class rosters and per-student records are available from \
             the students view.",
            ctx.student_count, ctx.class_count
        );
    }

    if lower.contains("help") || lower.contains("support") {
        return "I can summarize attendance patterns, performance trends, \
                timetables, and roster counts from the records you are \
                allowed to see. Ask about attendance, performance, schedules, \
                students, or classes."
            .to_string();
    }

    format!(
        "Query received: \"{}\". I can report on attendance trends, academic \
         performance, schedules, and roster counts. Try asking about a \
         specific area for a detailed summary.",
        prompt
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{AttendanceStats, PerformanceStats};

    fn ctx() -> AssistantContext {
        AssistantContext {
            attendance: AttendanceStats {
                total_days: 5,
                present_days: 3,
                absent_days: 1,
                late_days: 1,
                excused_days: 0,
                attendance_rate: 80.0,
            },
            performance: PerformanceStats {
                average_score: 85.0,
                total_records: 2,
                recent_grade: "A".to_string(),
                subject_stats: Vec::new(),
            },
            student_count: 12,
            class_count: 2,
        }
    }

    #[test]
    fn attendance_branch_reports_live_rate() {
        let out = respond("How is attendance this term?", &ctx());
        assert!(out.contains("80%"));
        assert!(out.contains("3 present"));
    }

    #[test]
    fn performance_branch_reports_average() {
        let out = respond("show grade summary", &ctx());
        assert!(out.contains("85%"));
        assert!(out.contains("A"));
    }

    #[test]
    fn unmatched_prompt_echoes_query() {
        let out = respond("what is the cafeteria menu", &ctx());
        assert!(out.contains("cafeteria"));
    }
}
