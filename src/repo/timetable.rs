use chrono::NaiveTime;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use super::{CacheState, RepoCache, StoreError};
use crate::model::{DayOfWeek, TimetableEntry};
use crate::policy::{self, Caller, Entity, RowFilter};

const SELECT_COLS: &str = "SELECT
       id, user_id, subject, subject_id, day, start_time, end_time, location, class_id, created_at
     FROM timetable";

// Monday-first ordering; plain text sort would put Friday before Monday.
const DAY_ORDER: &str = "CASE day
       WHEN 'Monday' THEN 0 WHEN 'Tuesday' THEN 1 WHEN 'Wednesday' THEN 2
       WHEN 'Thursday' THEN 3 WHEN 'Friday' THEN 4 WHEN 'Saturday' THEN 5
       ELSE 6 END";

#[derive(Debug, Default)]
pub struct TimetableRepo {
    cache: RepoCache<TimetableEntry>,
}

#[derive(Debug, Clone)]
pub struct NewTimetableEntry {
    pub user_id: String,
    pub subject: String,
    pub subject_id: Option<String>,
    pub day: DayOfWeek,
    pub start_time: String,
    pub end_time: String,
    pub location: String,
    pub class_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TimetableEntryPatch {
    pub subject: Option<String>,
    pub subject_id: Option<Option<String>>,
    pub day: Option<DayOfWeek>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
    pub class_id: Option<Option<String>>,
}

impl TimetableEntryPatch {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none()
            && self.subject_id.is_none()
            && self.day.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.location.is_none()
            && self.class_id.is_none()
    }
}

impl TimetableRepo {
    pub fn records(&self) -> &[TimetableEntry] {
        self.cache.records()
    }

    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    pub fn reset(&mut self) {
        self.cache.reset();
    }

    pub fn fetch(
        &mut self,
        conn: &Connection,
        caller: &Caller,
    ) -> Result<&[TimetableEntry], StoreError> {
        self.cache.begin_fetch();
        match fetch_rows(conn, caller) {
            Ok(rows) => {
                self.cache.replace(rows);
                Ok(self.cache.records())
            }
            Err(e) => {
                self.cache.fail_fetch();
                Err(e)
            }
        }
    }

    pub fn create(
        &mut self,
        conn: &Connection,
        caller: &Caller,
        new: NewTimetableEntry,
    ) -> Result<TimetableEntry, StoreError> {
        policy::can_edit_timetable(caller, &new.user_id)?;

        let subject = new.subject.trim().to_string();
        if subject.is_empty() {
            return Err(StoreError::validation("subject must not be empty"));
        }
        let start = normalize_time(&new.start_time)?;
        let end = normalize_time(&new.end_time)?;
        if start >= end {
            return Err(StoreError::validation(
                "startTime must be before endTime",
            ));
        }
        check_overlap(conn, &new.user_id, new.day, &start, &end, None)?;

        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO timetable(
               id, user_id, subject, subject_id, day, start_time, end_time,
               location, class_id, created_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
            (
                &id,
                &new.user_id,
                &subject,
                new.subject_id.as_deref(),
                new.day.as_str(),
                &start,
                &end,
                &new.location,
                new.class_id.as_deref(),
            ),
        )
        .map_err(StoreError::insert)?;

        let row = select_one(conn, &id)?.ok_or_else(|| StoreError::not_found("timetable entry"))?;
        self.cache.append(row.clone());
        Ok(row)
    }

    pub fn update(
        &mut self,
        conn: &Connection,
        caller: &Caller,
        id: &str,
        patch: TimetableEntryPatch,
    ) -> Result<TimetableEntry, StoreError> {
        if patch.is_empty() {
            return Err(StoreError::new(
                "bad_params",
                "patch must set at least one field",
            ));
        }
        let existing =
            select_one(conn, id)?.ok_or_else(|| StoreError::not_found("timetable entry"))?;
        policy::can_edit_timetable(caller, &existing.user_id)?;

        // Merge, then re-validate the full interval.
        let day = patch.day.unwrap_or(existing.day);
        let start = normalize_time(patch.start_time.as_deref().unwrap_or(&existing.start_time))?;
        let end = normalize_time(patch.end_time.as_deref().unwrap_or(&existing.end_time))?;
        if start >= end {
            return Err(StoreError::validation(
                "startTime must be before endTime",
            ));
        }
        check_overlap(conn, &existing.user_id, day, &start, &end, Some(id))?;

        let mut sets: Vec<&'static str> = vec!["day = ?", "start_time = ?", "end_time = ?"];
        let mut binds: Vec<Value> = vec![
            Value::Text(day.as_str().to_string()),
            Value::Text(start),
            Value::Text(end),
        ];
        if let Some(v) = &patch.subject {
            sets.push("subject = ?");
            binds.push(Value::Text(v.clone()));
        }
        if let Some(v) = &patch.subject_id {
            sets.push("subject_id = ?");
            binds.push(match v {
                Some(s) => Value::Text(s.clone()),
                None => Value::Null,
            });
        }
        if let Some(v) = &patch.location {
            sets.push("location = ?");
            binds.push(Value::Text(v.clone()));
        }
        if let Some(v) = &patch.class_id {
            sets.push("class_id = ?");
            binds.push(match v {
                Some(s) => Value::Text(s.clone()),
                None => Value::Null,
            });
        }
        binds.push(Value::Text(id.to_string()));

        let sql = format!("UPDATE timetable SET {} WHERE id = ?", sets.join(", "));
        let changed = conn
            .execute(&sql, params_from_iter(binds))
            .map_err(StoreError::update)?;
        if changed == 0 {
            return Err(StoreError::not_found("timetable entry"));
        }

        let row = select_one(conn, id)?.ok_or_else(|| StoreError::not_found("timetable entry"))?;
        self.cache.patch_where(|r| r.id == id, row.clone());
        Ok(row)
    }

    pub fn delete(&mut self, conn: &Connection, caller: &Caller, id: &str) -> Result<(), StoreError> {
        let existing =
            select_one(conn, id)?.ok_or_else(|| StoreError::not_found("timetable entry"))?;
        policy::can_edit_timetable(caller, &existing.user_id)?;

        let changed = conn
            .execute("DELETE FROM timetable WHERE id = ?", [id])
            .map_err(StoreError::delete)?;
        if changed == 0 {
            return Err(StoreError::not_found("timetable entry"));
        }
        self.cache.remove_where(|r| r.id == id);
        Ok(())
    }
}

/// Accepts HH:MM or HH:MM:SS and stores zero-padded HH:MM so the text
/// ordering matches the clock ordering.
fn normalize_time(raw: &str) -> Result<String, StoreError> {
    let t = raw.trim();
    let parsed = NaiveTime::parse_from_str(t, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M:%S"))
        .map_err(|_| StoreError::validation("times must be HH:MM"))?;
    Ok(parsed.format("%H:%M").to_string())
}

fn check_overlap(
    conn: &Connection,
    user_id: &str,
    day: DayOfWeek,
    start: &str,
    end: &str,
    exclude_id: Option<&str>,
) -> Result<(), StoreError> {
    let mut sql = "SELECT COUNT(*) FROM timetable
         WHERE user_id = ? AND day = ? AND NOT (end_time <= ? OR start_time >= ?)"
        .to_string();
    let mut binds: Vec<Value> = vec![
        Value::Text(user_id.to_string()),
        Value::Text(day.as_str().to_string()),
        Value::Text(start.to_string()),
        Value::Text(end.to_string()),
    ];
    if let Some(id) = exclude_id {
        sql.push_str(" AND id != ?");
        binds.push(Value::Text(id.to_string()));
    }
    let count: i64 = conn
        .query_row(&sql, params_from_iter(binds), |r| r.get(0))
        .map_err(StoreError::query)?;
    if count > 0 {
        return Err(StoreError::new(
            "schedule_conflict",
            "entry overlaps an existing entry for that day",
        ));
    }
    Ok(())
}

fn fetch_rows(conn: &Connection, caller: &Caller) -> Result<Vec<TimetableEntry>, StoreError> {
    let filter = policy::row_filter(conn, Entity::Timetable, caller)?;

    let (where_clause, binds): (String, Vec<Value>) = match filter {
        RowFilter::All => (String::new(), Vec::new()),
        RowFilter::OwnRows => (
            " WHERE user_id = ?".to_string(),
            vec![Value::Text(caller.user_id.clone())],
        ),
        RowFilter::ClassSet(ids) => {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = std::iter::repeat("?")
                .take(ids.len())
                .collect::<Vec<_>>()
                .join(",");
            (
                format!(" WHERE class_id IN ({})", placeholders),
                ids.into_iter().map(Value::Text).collect(),
            )
        }
    };

    let sql = format!(
        "{}{} ORDER BY {}, start_time",
        SELECT_COLS, where_clause, DAY_ORDER
    );
    let mut stmt = conn.prepare(&sql).map_err(StoreError::query)?;
    stmt.query_map(params_from_iter(binds), map_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)
}

fn select_one(conn: &Connection, id: &str) -> Result<Option<TimetableEntry>, StoreError> {
    let sql = format!("{} WHERE id = ?", SELECT_COLS);
    conn.query_row(&sql, [id], map_row)
        .optional()
        .map_err(StoreError::query)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TimetableEntry> {
    let day: String = row.get(4)?;
    Ok(TimetableEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        subject: row.get(2)?,
        subject_id: row.get(3)?,
        day: DayOfWeek::parse(&day).unwrap_or(DayOfWeek::Monday),
        start_time: row.get(5)?,
        end_time: row.get(6)?,
        location: row.get(7)?,
        class_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}
