mod test_support;

use serde_json::json;
use test_support::{request_ok, sign_up, spawn_sidecar, temp_dir};

#[test]
fn weekly_series_buckets_the_anchored_week_only() {
    let workspace = temp_dir("edumanager-weekly-series");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = sign_up(
        &mut stdin,
        &mut reader,
        "2",
        "self@school.test",
        "password1",
        "Self Marker",
        "student",
    );

    // 2025-09-01 is a Monday. One record lands outside the week.
    for (i, (date, status)) in [
        ("2025-09-01", "present"),
        ("2025-09-02", "present"),
        ("2025-09-03", "late"),
        ("2025-09-04", "absent"),
        ("2025-09-05", "excused"),
        ("2025-09-10", "present"),
    ]
    .iter()
    .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("m{}", i),
            "attendance.mark",
            json!({ "date": date, "status": status }),
        );
    }

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "attendance.weeklySeries",
        json!({ "anchorDate": "2025-09-03" }),
    );
    let series = result
        .get("series")
        .and_then(|v| v.as_array())
        .expect("series array");
    assert_eq!(series.len(), 7);

    assert_eq!(series[0].get("date").and_then(|v| v.as_str()), Some("2025-09-01"));
    assert_eq!(series[0].get("day").and_then(|v| v.as_str()), Some("Monday"));
    assert_eq!(series[0].get("present").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(series[2].get("late").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(series[3].get("absent").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(series[4].get("excused").and_then(|v| v.as_i64()), Some(1));

    // Weekend buckets exist with all-zero counts.
    for day in &series[5..] {
        let sum = ["present", "absent", "late", "excused"]
            .iter()
            .map(|k| day.get(*k).and_then(|v| v.as_i64()).unwrap_or(0))
            .sum::<i64>();
        assert_eq!(sum, 0);
    }

    // The 2025-09-10 record belongs to the next week.
    let total: i64 = series
        .iter()
        .flat_map(|d| {
            ["present", "absent", "late", "excused"]
                .iter()
                .map(|k| d.get(*k).and_then(|v| v.as_i64()).unwrap_or(0))
                .collect::<Vec<_>>()
        })
        .sum();
    assert_eq!(total, 5);

    // An empty week still yields exactly 7 buckets.
    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "attendance.weeklySeries",
        json!({ "anchorDate": "2026-02-18" }),
    );
    let empty_series = empty
        .get("series")
        .and_then(|v| v.as_array())
        .expect("series array");
    assert_eq!(empty_series.len(), 7);
}

#[test]
fn attendance_stats_round_to_one_decimal() {
    let workspace = temp_dir("edumanager-attendance-stats");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = sign_up(
        &mut stdin,
        &mut reader,
        "2",
        "stats@school.test",
        "password1",
        "Stats Student",
        "student",
    );

    // Empty cache first: rate must be 0, not a division error.
    let empty = request_ok(&mut stdin, &mut reader, "3", "attendance.stats", json!({}));
    assert_eq!(
        empty
            .get("stats")
            .and_then(|s| s.get("attendanceRate"))
            .and_then(|v| v.as_f64()),
        Some(0.0)
    );

    for (i, (date, status)) in [
        ("2025-09-01", "present"),
        ("2025-09-02", "present"),
        ("2025-09-03", "present"),
        ("2025-09-04", "late"),
        ("2025-09-05", "absent"),
    ]
    .iter()
    .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("m{}", i),
            "attendance.mark",
            json!({ "date": date, "status": status }),
        );
    }

    // (3 present + 1 late) / 5 = 80.0
    let stats = request_ok(&mut stdin, &mut reader, "9", "attendance.stats", json!({}));
    let s = stats.get("stats").expect("stats object");
    assert_eq!(s.get("totalDays").and_then(|v| v.as_i64()), Some(5));
    assert_eq!(s.get("presentDays").and_then(|v| v.as_i64()), Some(3));
    assert_eq!(s.get("lateDays").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(s.get("attendanceRate").and_then(|v| v.as_f64()), Some(80.0));
}
