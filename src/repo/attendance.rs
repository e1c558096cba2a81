use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use super::{CacheState, RepoCache, StoreError};
use crate::model::{AttendanceRecord, AttendanceStatus, Role};
use crate::policy::{self, Caller, Entity, RowFilter};

const SELECT_COLS: &str = "SELECT
       id, user_id, date, status, remarks, recorded_by, class_id, created_at
     FROM attendance";

#[derive(Debug, Default)]
pub struct AttendanceRepo {
    cache: RepoCache<AttendanceRecord>,
}

impl AttendanceRepo {
    pub fn records(&self) -> &[AttendanceRecord] {
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
    ) -> Result<&[AttendanceRecord], StoreError> {
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

    /// Upsert keyed on (user_id, date): marking the same day twice replaces
    /// the earlier record, it never duplicates it.
    pub fn mark_one(
        &mut self,
        conn: &Connection,
        caller: &Caller,
        student_user_id: &str,
        date: &str,
        status: AttendanceStatus,
        remarks: Option<&str>,
    ) -> Result<AttendanceRecord, StoreError> {
        policy::can_mark_attendance(conn, caller, student_user_id)?;
        let date = normalize_date(date)?;

        // Stamp the student's current class so class-scoped fetches see the row.
        let class_id: Option<String> = conn
            .query_row(
                "SELECT class_id FROM students WHERE user_id = ?",
                [student_user_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(StoreError::query)?
            .flatten();

        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO attendance(
               id, user_id, date, status, remarks, recorded_by, class_id, created_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))
             ON CONFLICT(user_id, date) DO UPDATE SET
               status = excluded.status,
               remarks = excluded.remarks,
               recorded_by = excluded.recorded_by,
               class_id = excluded.class_id",
            (
                &id,
                student_user_id,
                &date,
                status.as_str(),
                remarks.unwrap_or(""),
                &caller.user_id,
                class_id.as_deref(),
            ),
        )
        .map_err(StoreError::update)?;

        let row = select_by_user_date(conn, student_user_id, &date)?
            .ok_or_else(|| StoreError::not_found("attendance record"))?;
        let replaced = self.cache.patch_where(
            |r| r.user_id == row.user_id && r.date == row.date,
            row.clone(),
        );
        if !replaced {
            self.cache.prepend(row.clone());
        }
        Ok(row)
    }

    /// One server-side unit of work for a whole class. All-or-nothing: an
    /// unknown student or a failed upsert rolls the entire batch back. The
    /// bulk path bypasses cache patching, so it re-fetches on success.
    pub fn mark_bulk(
        &mut self,
        conn: &Connection,
        caller: &Caller,
        class_id: &str,
        date: &str,
        status_by_student: &[(String, AttendanceStatus)],
    ) -> Result<usize, StoreError> {
        match caller.role {
            Role::Admin => {}
            Role::Teacher => {
                let owns: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM classes WHERE id = ? AND teacher_id = ?",
                        (class_id, &caller.user_id),
                        |r| r.get(0),
                    )
                    .optional()
                    .map_err(StoreError::query)?;
                if owns.is_none() {
                    return Err(StoreError::forbidden("not your class"));
                }
            }
            Role::Student => {
                return Err(StoreError::forbidden(
                    "students cannot bulk-mark attendance",
                ))
            }
        }
        let date = normalize_date(date)?;

        let tx = conn.unchecked_transaction().map_err(StoreError::tx)?;
        for (student_user_id, status) in status_by_student {
            let enrolled: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM students WHERE user_id = ? AND class_id = ?",
                    (student_user_id, class_id),
                    |r| r.get(0),
                )
                .optional()
                .map_err(StoreError::query)?;
            if enrolled.is_none() {
                // Drops the transaction, rolling back every earlier upsert.
                return Err(StoreError::not_found("student").with_details(
                    serde_json::json!({ "studentUserId": student_user_id }),
                ));
            }

            let id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO attendance(
                   id, user_id, date, status, remarks, recorded_by, class_id, created_at
                 ) VALUES(?, ?, ?, ?, '', ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))
                 ON CONFLICT(user_id, date) DO UPDATE SET
                   status = excluded.status,
                   recorded_by = excluded.recorded_by,
                   class_id = excluded.class_id",
                (&id, student_user_id, &date, status.as_str(), &caller.user_id, class_id),
            )
            .map_err(StoreError::update)?;
        }
        tx.commit()
            .map_err(|e| StoreError::new("db_commit_failed", e.to_string()))?;

        self.fetch(conn, caller)?;
        Ok(status_by_student.len())
    }

    /// O(n) scan of the cached list.
    pub fn todays_attendance_for(&self, date: &str) -> Vec<&AttendanceRecord> {
        self.cache
            .records()
            .iter()
            .filter(|r| r.date == date)
            .collect()
    }
}

fn normalize_date(raw: &str) -> Result<String, StoreError> {
    let t = raw.trim();
    let parsed = NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .map_err(|_| StoreError::validation("date must be YYYY-MM-DD"))?;
    Ok(parsed.format("%Y-%m-%d").to_string())
}

fn fetch_rows(conn: &Connection, caller: &Caller) -> Result<Vec<AttendanceRecord>, StoreError> {
    let filter = policy::row_filter(conn, Entity::Attendance, caller)?;

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
        "{}{} ORDER BY date DESC, rowid DESC",
        SELECT_COLS, where_clause
    );
    let mut stmt = conn.prepare(&sql).map_err(StoreError::query)?;
    stmt.query_map(params_from_iter(binds), map_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)
}

fn select_by_user_date(
    conn: &Connection,
    user_id: &str,
    date: &str,
) -> Result<Option<AttendanceRecord>, StoreError> {
    let sql = format!("{} WHERE user_id = ? AND date = ?", SELECT_COLS);
    conn.query_row(&sql, (user_id, date), map_row)
        .optional()
        .map_err(StoreError::query)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let status: String = row.get(3)?;
    Ok(AttendanceRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        status: AttendanceStatus::parse(&status).unwrap_or(AttendanceStatus::Absent),
        remarks: row.get(4)?,
        recorded_by: row.get(5)?,
        class_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}
