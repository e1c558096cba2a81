use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use super::{RepoCache, StoreError};
use crate::model::Subject;
use crate::policy::{self, Caller, Entity, RowFilter};

#[derive(Debug, Default)]
pub struct SubjectRepo {
    cache: RepoCache<Subject>,
}

#[derive(Debug, Clone)]
pub struct NewSubject {
    pub name: String,
    pub code: String,
    pub description: String,
    pub grade_levels: Vec<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct SubjectPatch {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub grade_levels: Option<Vec<i64>>,
}

impl SubjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.code.is_none()
            && self.description.is_none()
            && self.grade_levels.is_none()
    }
}

impl SubjectRepo {
    pub fn reset(&mut self) {
        self.cache.reset();
    }

    pub fn fetch(&mut self, conn: &Connection, caller: &Caller) -> Result<&[Subject], StoreError> {
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
        new: NewSubject,
    ) -> Result<Subject, StoreError> {
        policy::require_admin(caller)?;
        let name = new.name.trim().to_string();
        let code = new.code.trim().to_string();
        if name.is_empty() || code.is_empty() {
            return Err(StoreError::validation("name/code must not be empty"));
        }

        let id = Uuid::new_v4().to_string();
        let grade_levels =
            serde_json::to_string(&new.grade_levels).unwrap_or_else(|_| "[]".to_string());
        conn.execute(
            "INSERT INTO subjects(id, name, code, description, grade_levels, created_at)
             VALUES(?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
            (&id, &name, &code, &new.description, &grade_levels),
        )
        .map_err(StoreError::insert)?;

        let row = select_one(conn, &id)?.ok_or_else(|| StoreError::not_found("subject"))?;
        self.cache.append(row.clone());
        Ok(row)
    }

    pub fn update(
        &mut self,
        conn: &Connection,
        caller: &Caller,
        id: &str,
        patch: SubjectPatch,
    ) -> Result<Subject, StoreError> {
        policy::require_admin(caller)?;
        if patch.is_empty() {
            return Err(StoreError::new(
                "bad_params",
                "patch must set at least one field",
            ));
        }

        let mut sets: Vec<&'static str> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();
        if let Some(v) = &patch.name {
            sets.push("name = ?");
            binds.push(Value::Text(v.clone()));
        }
        if let Some(v) = &patch.code {
            sets.push("code = ?");
            binds.push(Value::Text(v.clone()));
        }
        if let Some(v) = &patch.description {
            sets.push("description = ?");
            binds.push(Value::Text(v.clone()));
        }
        if let Some(v) = &patch.grade_levels {
            sets.push("grade_levels = ?");
            binds.push(Value::Text(
                serde_json::to_string(v).unwrap_or_else(|_| "[]".to_string()),
            ));
        }
        binds.push(Value::Text(id.to_string()));

        let sql = format!("UPDATE subjects SET {} WHERE id = ?", sets.join(", "));
        let changed = conn
            .execute(&sql, params_from_iter(binds))
            .map_err(StoreError::update)?;
        if changed == 0 {
            return Err(StoreError::not_found("subject"));
        }

        let row = select_one(conn, id)?.ok_or_else(|| StoreError::not_found("subject"))?;
        self.cache.patch_where(|r| r.id == id, row.clone());
        Ok(row)
    }

    pub fn delete(&mut self, conn: &Connection, caller: &Caller, id: &str) -> Result<(), StoreError> {
        policy::require_admin(caller)?;

        let tx = conn.unchecked_transaction().map_err(StoreError::tx)?;
        // Subject links are weak references; detach before removing.
        tx.execute(
            "UPDATE timetable SET subject_id = NULL WHERE subject_id = ?",
            [id],
        )
        .map_err(StoreError::update)?;
        tx.execute(
            "UPDATE performance SET subject_id = NULL WHERE subject_id = ?",
            [id],
        )
        .map_err(StoreError::update)?;
        let changed = tx
            .execute("DELETE FROM subjects WHERE id = ?", [id])
            .map_err(StoreError::delete)?;
        if changed == 0 {
            return Err(StoreError::not_found("subject"));
        }
        tx.commit()
            .map_err(|e| StoreError::new("db_commit_failed", e.to_string()))?;

        self.cache.remove_where(|r| r.id == id);
        Ok(())
    }
}

fn fetch_rows(conn: &Connection, caller: &Caller) -> Result<Vec<Subject>, StoreError> {
    // Subjects carry no ownership column; anything narrower than the full
    // table resolves to nothing.
    match policy::row_filter(conn, Entity::Subjects, caller)? {
        RowFilter::All => {}
        RowFilter::OwnRows | RowFilter::ClassSet(_) => return Ok(Vec::new()),
    }

    let mut stmt = conn
        .prepare(
            "SELECT id, name, code, description, grade_levels, created_at
             FROM subjects
             ORDER BY name",
        )
        .map_err(StoreError::query)?;
    stmt.query_map([], map_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)
}

fn select_one(conn: &Connection, id: &str) -> Result<Option<Subject>, StoreError> {
    conn.query_row(
        "SELECT id, name, code, description, grade_levels, created_at
         FROM subjects WHERE id = ?",
        [id],
        map_row,
    )
    .optional()
    .map_err(StoreError::query)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subject> {
    let grade_levels: String = row.get(4)?;
    Ok(Subject {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        description: row.get(3)?,
        grade_levels: serde_json::from_str(&grade_levels).unwrap_or_default(),
        created_at: row.get(5)?,
    })
}
