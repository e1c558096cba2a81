use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use super::{RepoCache, StoreError};
use crate::model::{Class, ClassWithDetails, Role, User};
use crate::policy::{self, Caller, Entity, RowFilter};

// Counts via correlated subquery to avoid double-counting from joins.
const SELECT_COLS: &str = "SELECT
       c.id, c.name, c.grade_level, c.academic_year, c.teacher_id, c.max_students, c.created_at,
       u.id, u.full_name, u.email, u.role, u.phone, u.address, u.date_of_birth, u.created_at,
       (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id) AS student_count
     FROM classes c
     LEFT JOIN users u ON u.id = c.teacher_id";

#[derive(Debug, Default)]
pub struct ClassRepo {
    cache: RepoCache<ClassWithDetails>,
}

#[derive(Debug, Clone)]
pub struct NewClass {
    pub name: String,
    pub grade_level: i64,
    pub academic_year: String,
    pub teacher_id: Option<String>,
    pub max_students: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ClassPatch {
    pub name: Option<String>,
    pub grade_level: Option<i64>,
    pub academic_year: Option<String>,
    pub teacher_id: Option<Option<String>>,
    pub max_students: Option<i64>,
}

impl ClassPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.grade_level.is_none()
            && self.academic_year.is_none()
            && self.teacher_id.is_none()
            && self.max_students.is_none()
    }
}

impl ClassRepo {
    pub fn records(&self) -> &[ClassWithDetails] {
        self.cache.records()
    }

    pub fn reset(&mut self) {
        self.cache.reset();
    }

    pub fn fetch(
        &mut self,
        conn: &Connection,
        caller: &Caller,
    ) -> Result<&[ClassWithDetails], StoreError> {
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
        new: NewClass,
    ) -> Result<ClassWithDetails, StoreError> {
        policy::require_admin(caller)?;

        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(StoreError::validation("name must not be empty"));
        }
        if !(6..=12).contains(&new.grade_level) {
            return Err(StoreError::validation("gradeLevel must be between 6 and 12"));
        }
        if new.max_students <= 0 {
            return Err(StoreError::validation("maxStudents must be positive"));
        }
        if let Some(teacher_id) = new.teacher_id.as_deref() {
            check_teacher(conn, teacher_id)?;
        }

        let class_id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO classes(
               id, name, grade_level, academic_year, teacher_id, max_students, created_at
             ) VALUES(?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
            (
                &class_id,
                &name,
                new.grade_level,
                &new.academic_year,
                new.teacher_id.as_deref(),
                new.max_students,
            ),
        )
        .map_err(StoreError::insert)?;

        let row = select_one(conn, &class_id)?.ok_or_else(|| StoreError::not_found("class"))?;
        self.cache.append(row.clone());
        Ok(row)
    }

    pub fn update(
        &mut self,
        conn: &Connection,
        caller: &Caller,
        id: &str,
        patch: ClassPatch,
    ) -> Result<ClassWithDetails, StoreError> {
        policy::require_admin(caller)?;
        if patch.is_empty() {
            return Err(StoreError::new(
                "bad_params",
                "patch must set at least one field",
            ));
        }
        if let Some(level) = patch.grade_level {
            if !(6..=12).contains(&level) {
                return Err(StoreError::validation("gradeLevel must be between 6 and 12"));
            }
        }
        if let Some(max) = patch.max_students {
            if max <= 0 {
                return Err(StoreError::validation("maxStudents must be positive"));
            }
        }
        if let Some(Some(teacher_id)) = patch.teacher_id.as_ref() {
            check_teacher(conn, teacher_id)?;
        }

        let mut sets: Vec<&'static str> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();
        if let Some(v) = &patch.name {
            sets.push("name = ?");
            binds.push(Value::Text(v.clone()));
        }
        if let Some(v) = patch.grade_level {
            sets.push("grade_level = ?");
            binds.push(Value::Integer(v));
        }
        if let Some(v) = &patch.academic_year {
            sets.push("academic_year = ?");
            binds.push(Value::Text(v.clone()));
        }
        if let Some(v) = &patch.teacher_id {
            sets.push("teacher_id = ?");
            binds.push(match v {
                Some(s) => Value::Text(s.clone()),
                None => Value::Null,
            });
        }
        if let Some(v) = patch.max_students {
            sets.push("max_students = ?");
            binds.push(Value::Integer(v));
        }
        binds.push(Value::Text(id.to_string()));

        let sql = format!("UPDATE classes SET {} WHERE id = ?", sets.join(", "));
        let changed = conn
            .execute(&sql, params_from_iter(binds))
            .map_err(StoreError::update)?;
        if changed == 0 {
            return Err(StoreError::not_found("class"));
        }

        let row = select_one(conn, id)?.ok_or_else(|| StoreError::not_found("class"))?;
        self.cache.patch_where(|r| r.class.id == id, row.clone());
        Ok(row)
    }

    /// Clears weak references from dependent rows, then removes the class.
    pub fn delete(&mut self, conn: &Connection, caller: &Caller, id: &str) -> Result<(), StoreError> {
        policy::require_admin(caller)?;

        let exists: Option<i64> = conn
            .query_row("SELECT 1 FROM classes WHERE id = ?", [id], |r| r.get(0))
            .optional()
            .map_err(StoreError::query)?;
        if exists.is_none() {
            return Err(StoreError::not_found("class"));
        }

        let tx = conn.unchecked_transaction().map_err(StoreError::tx)?;
        tx.execute(
            "UPDATE students SET class_id = NULL WHERE class_id = ?",
            [id],
        )
        .map_err(StoreError::update)?;
        tx.execute(
            "UPDATE timetable SET class_id = NULL WHERE class_id = ?",
            [id],
        )
        .map_err(StoreError::update)?;
        tx.execute(
            "UPDATE attendance SET class_id = NULL WHERE class_id = ?",
            [id],
        )
        .map_err(StoreError::update)?;
        tx.execute("DELETE FROM classes WHERE id = ?", [id])
            .map_err(StoreError::delete)?;
        tx.commit()
            .map_err(|e| StoreError::new("db_commit_failed", e.to_string()))?;

        self.cache.remove_where(|r| r.class.id == id);
        Ok(())
    }
}

fn fetch_rows(conn: &Connection, caller: &Caller) -> Result<Vec<ClassWithDetails>, StoreError> {
    // The policy currently grants every role the full table; narrower filters
    // translate the same way as everywhere else.
    let (where_clause, binds): (String, Vec<Value>) =
        match policy::row_filter(conn, Entity::Classes, caller)? {
            RowFilter::All => (String::new(), Vec::new()),
            RowFilter::OwnRows => (
                " WHERE c.teacher_id = ?".to_string(),
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
                    format!(" WHERE c.id IN ({})", placeholders),
                    ids.into_iter().map(Value::Text).collect(),
                )
            }
        };

    let sql = format!(
        "{}{} ORDER BY c.grade_level, c.name",
        SELECT_COLS, where_clause
    );
    let mut stmt = conn.prepare(&sql).map_err(StoreError::query)?;
    stmt.query_map(params_from_iter(binds), map_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)
}

fn check_teacher(conn: &Connection, teacher_id: &str) -> Result<(), StoreError> {
    let role: Option<String> = conn
        .query_row("SELECT role FROM users WHERE id = ?", [teacher_id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(StoreError::query)?;
    match role.as_deref() {
        None => Err(StoreError::not_found("teacher")),
        Some("teacher") | Some("admin") => Ok(()),
        Some(_) => Err(StoreError::validation("teacherId must refer to a teacher")),
    }
}

fn select_one(conn: &Connection, id: &str) -> Result<Option<ClassWithDetails>, StoreError> {
    let sql = format!("{} WHERE c.id = ?", SELECT_COLS);
    conn.query_row(&sql, [id], map_row)
        .optional()
        .map_err(StoreError::query)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClassWithDetails> {
    let class = Class {
        id: row.get(0)?,
        name: row.get(1)?,
        grade_level: row.get(2)?,
        academic_year: row.get(3)?,
        teacher_id: row.get(4)?,
        max_students: row.get(5)?,
        created_at: row.get(6)?,
    };

    let teacher = match row.get::<_, Option<String>>(7)? {
        Some(user_id) => {
            let role: String = row.get(10)?;
            Some(User {
                id: user_id,
                full_name: row.get(8)?,
                email: row.get(9)?,
                role: Role::parse(&role).unwrap_or(Role::Teacher),
                phone: row.get(11)?,
                address: row.get(12)?,
                date_of_birth: row.get(13)?,
                created_at: row.get(14)?,
            })
        }
        None => None,
    };

    Ok(ClassWithDetails {
        class,
        teacher,
        student_count: row.get(15)?,
    })
}
