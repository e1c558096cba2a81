use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use super::{RepoCache, StoreError};
use crate::model::PerformanceRecord;
use crate::policy::{self, Caller, Entity, RowFilter};

const SELECT_COLS: &str = "SELECT
       id, user_id, subject, subject_id, grade, score, max_score, remarks, recorded_by, recorded_at
     FROM performance";

#[derive(Debug, Default)]
pub struct PerformanceRepo {
    cache: RepoCache<PerformanceRecord>,
}

#[derive(Debug, Clone)]
pub struct NewPerformanceRecord {
    pub user_id: String,
    pub subject: String,
    pub subject_id: Option<String>,
    pub grade: String,
    pub score: f64,
    pub max_score: f64,
    pub remarks: String,
}

#[derive(Debug, Clone, Default)]
pub struct PerformancePatch {
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub score: Option<f64>,
    pub max_score: Option<f64>,
    pub remarks: Option<String>,
}

impl PerformancePatch {
    pub fn is_empty(&self) -> bool {
        self.subject.is_none()
            && self.grade.is_none()
            && self.score.is_none()
            && self.max_score.is_none()
            && self.remarks.is_none()
    }
}

fn check_scores(score: f64, max_score: f64) -> Result<(), StoreError> {
    if !max_score.is_finite() || max_score <= 0.0 {
        return Err(StoreError::validation("maxScore must be positive"));
    }
    if !score.is_finite() || score < 0.0 || score > max_score {
        return Err(StoreError::validation(
            "score must be between 0 and maxScore",
        ));
    }
    Ok(())
}

impl PerformanceRepo {
    pub fn records(&self) -> &[PerformanceRecord] {
        self.cache.records()
    }

    pub fn reset(&mut self) {
        self.cache.reset();
    }

    pub fn fetch(
        &mut self,
        conn: &Connection,
        caller: &Caller,
    ) -> Result<&[PerformanceRecord], StoreError> {
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
        new: NewPerformanceRecord,
    ) -> Result<PerformanceRecord, StoreError> {
        policy::can_record_performance(conn, caller, &new.user_id)?;

        let subject = new.subject.trim().to_string();
        if subject.is_empty() {
            return Err(StoreError::validation("subject must not be empty"));
        }
        check_scores(new.score, new.max_score)?;

        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO performance(
               id, user_id, subject, subject_id, grade, score, max_score,
               remarks, recorded_by, recorded_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
            (
                &id,
                &new.user_id,
                &subject,
                new.subject_id.as_deref(),
                &new.grade,
                new.score,
                new.max_score,
                &new.remarks,
                &caller.user_id,
            ),
        )
        .map_err(StoreError::insert)?;

        let row =
            select_one(conn, &id)?.ok_or_else(|| StoreError::not_found("performance record"))?;
        self.cache.prepend(row.clone());
        Ok(row)
    }

    pub fn update(
        &mut self,
        conn: &Connection,
        caller: &Caller,
        id: &str,
        patch: PerformancePatch,
    ) -> Result<PerformanceRecord, StoreError> {
        if patch.is_empty() {
            return Err(StoreError::new(
                "bad_params",
                "patch must set at least one field",
            ));
        }
        let existing =
            select_one(conn, id)?.ok_or_else(|| StoreError::not_found("performance record"))?;
        policy::can_record_performance(conn, caller, &existing.user_id)?;

        let score = patch.score.unwrap_or(existing.score);
        let max_score = patch.max_score.unwrap_or(existing.max_score);
        check_scores(score, max_score)?;

        let mut sets: Vec<&'static str> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();
        if let Some(v) = &patch.subject {
            sets.push("subject = ?");
            binds.push(Value::Text(v.clone()));
        }
        if let Some(v) = &patch.grade {
            sets.push("grade = ?");
            binds.push(Value::Text(v.clone()));
        }
        if let Some(v) = patch.score {
            sets.push("score = ?");
            binds.push(Value::Real(v));
        }
        if let Some(v) = patch.max_score {
            sets.push("max_score = ?");
            binds.push(Value::Real(v));
        }
        if let Some(v) = &patch.remarks {
            sets.push("remarks = ?");
            binds.push(Value::Text(v.clone()));
        }
        binds.push(Value::Text(id.to_string()));

        let sql = format!("UPDATE performance SET {} WHERE id = ?", sets.join(", "));
        let changed = conn
            .execute(&sql, params_from_iter(binds))
            .map_err(StoreError::update)?;
        if changed == 0 {
            return Err(StoreError::not_found("performance record"));
        }

        let row =
            select_one(conn, id)?.ok_or_else(|| StoreError::not_found("performance record"))?;
        self.cache.patch_where(|r| r.id == id, row.clone());
        Ok(row)
    }

    pub fn delete(&mut self, conn: &Connection, caller: &Caller, id: &str) -> Result<(), StoreError> {
        let existing =
            select_one(conn, id)?.ok_or_else(|| StoreError::not_found("performance record"))?;
        policy::can_record_performance(conn, caller, &existing.user_id)?;

        let changed = conn
            .execute("DELETE FROM performance WHERE id = ?", [id])
            .map_err(StoreError::delete)?;
        if changed == 0 {
            return Err(StoreError::not_found("performance record"));
        }
        self.cache.remove_where(|r| r.id == id);
        Ok(())
    }
}

fn fetch_rows(conn: &Connection, caller: &Caller) -> Result<Vec<PerformanceRecord>, StoreError> {
    let filter = policy::row_filter(conn, Entity::Performance, caller)?;

    // Performance rows carry no class link; class scoping goes through the
    // student roster.
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
                format!(
                    " WHERE user_id IN (SELECT user_id FROM students WHERE class_id IN ({}))",
                    placeholders
                ),
                ids.into_iter().map(Value::Text).collect(),
            )
        }
    };

    let sql = format!(
        "{}{} ORDER BY recorded_at DESC, rowid DESC",
        SELECT_COLS, where_clause
    );
    let mut stmt = conn.prepare(&sql).map_err(StoreError::query)?;
    stmt.query_map(params_from_iter(binds), map_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)
}

fn select_one(conn: &Connection, id: &str) -> Result<Option<PerformanceRecord>, StoreError> {
    let sql = format!("{} WHERE id = ?", SELECT_COLS);
    conn.query_row(&sql, [id], map_row)
        .optional()
        .map_err(StoreError::query)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PerformanceRecord> {
    Ok(PerformanceRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        subject: row.get(2)?,
        subject_id: row.get(3)?,
        grade: row.get(4)?,
        score: row.get(5)?,
        max_score: row.get(6)?,
        remarks: row.get(7)?,
        recorded_by: row.get(8)?,
        recorded_at: row.get(9)?,
    })
}
