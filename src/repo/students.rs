use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use super::{RepoCache, StoreError};
use crate::auth;
use crate::model::{Class, Role, Student, StudentStatus, StudentWithDetails, User};
use crate::policy::{self, Caller, Entity, RowFilter};

/// Enrollment creates the account with this fixed temporary credential; the
/// student is expected to change it on first sign-in.
const TEMP_STUDENT_PASSWORD: &str = "temp123456";

const SELECT_COLS: &str = "SELECT
       s.id, s.user_id, s.student_id, s.class_id, s.parent_name, s.parent_email,
       s.parent_phone, s.enrollment_date, s.status, s.created_at,
       u.id, u.full_name, u.email, u.role, u.phone, u.address, u.date_of_birth, u.created_at,
       c.id, c.name, c.grade_level, c.academic_year, c.teacher_id, c.max_students, c.created_at
     FROM students s
     LEFT JOIN users u ON u.id = s.user_id
     LEFT JOIN classes c ON c.id = s.class_id";

#[derive(Debug, Default)]
pub struct StudentRepo {
    cache: RepoCache<StudentWithDetails>,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub full_name: String,
    pub email: String,
    pub student_id: String,
    pub class_id: Option<String>,
    pub parent_name: String,
    pub parent_email: Option<String>,
    pub parent_phone: Option<String>,
    pub enrollment_date: String,
}

/// Partial update; the outer Option marks presence, the inner one nullability.
#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub student_id: Option<String>,
    pub class_id: Option<Option<String>>,
    pub parent_name: Option<String>,
    pub parent_email: Option<Option<String>>,
    pub parent_phone: Option<Option<String>>,
    pub enrollment_date: Option<String>,
    pub status: Option<StudentStatus>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self.student_id.is_none()
            && self.class_id.is_none()
            && self.parent_name.is_none()
            && self.parent_email.is_none()
            && self.parent_phone.is_none()
            && self.enrollment_date.is_none()
            && self.status.is_none()
    }
}

impl StudentRepo {
    pub fn records(&self) -> &[StudentWithDetails] {
        self.cache.records()
    }

    pub fn reset(&mut self) {
        self.cache.reset();
    }

    pub fn fetch(
        &mut self,
        conn: &Connection,
        caller: &Caller,
    ) -> Result<&[StudentWithDetails], StoreError> {
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

    /// Admin-only two-step flow: the underlying user account first, then the
    /// student row, in one transaction.
    pub fn create(
        &mut self,
        conn: &Connection,
        caller: &Caller,
        new: NewStudent,
    ) -> Result<StudentWithDetails, StoreError> {
        policy::require_admin(caller)?;

        let email = new.email.trim().to_string();
        let full_name = new.full_name.trim().to_string();
        if email.is_empty() || full_name.is_empty() {
            return Err(StoreError::validation("fullName/email must not be empty"));
        }

        let email_taken: Option<i64> = conn
            .query_row("SELECT 1 FROM users WHERE email = ?", [&email], |r| {
                r.get(0)
            })
            .optional()
            .map_err(StoreError::query)?;
        if email_taken.is_some() {
            return Err(StoreError::new("email_taken", "email is already registered"));
        }

        let code_taken: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM students WHERE student_id = ?",
                [&new.student_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(StoreError::query)?;
        if code_taken.is_some() {
            return Err(StoreError::new(
                "student_code_taken",
                "student code is already in use",
            ));
        }

        if let Some(class_id) = new.class_id.as_deref() {
            let exists: Option<i64> = conn
                .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
                    r.get(0)
                })
                .optional()
                .map_err(StoreError::query)?;
            if exists.is_none() {
                return Err(StoreError::not_found("class"));
            }
        }

        let tx = conn.unchecked_transaction().map_err(StoreError::tx)?;

        let user_id = Uuid::new_v4().to_string();
        let salt = Uuid::new_v4().to_string();
        let hash = auth::hash_password(&salt, TEMP_STUDENT_PASSWORD);
        tx.execute(
            "INSERT INTO users(
               id, full_name, email, role, password_hash, password_salt, created_at
             ) VALUES(?, ?, ?, 'student', ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
            (&user_id, &full_name, &email, &hash, &salt),
        )
        .map_err(StoreError::insert)?;

        let student_row_id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO students(
               id, user_id, student_id, class_id, parent_name, parent_email,
               parent_phone, enrollment_date, status, created_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, 'active', strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
            (
                &student_row_id,
                &user_id,
                &new.student_id,
                new.class_id.as_deref(),
                &new.parent_name,
                new.parent_email.as_deref(),
                new.parent_phone.as_deref(),
                &new.enrollment_date,
            ),
        )
        .map_err(StoreError::insert)?;

        tx.commit()
            .map_err(|e| StoreError::new("db_commit_failed", e.to_string()))?;

        let row = select_one(conn, &student_row_id)?
            .ok_or_else(|| StoreError::not_found("student"))?;
        self.cache.prepend(row.clone());
        Ok(row)
    }

    pub fn update(
        &mut self,
        conn: &Connection,
        caller: &Caller,
        id: &str,
        patch: StudentPatch,
    ) -> Result<StudentWithDetails, StoreError> {
        policy::require_admin(caller)?;
        if patch.is_empty() {
            return Err(StoreError::new(
                "bad_params",
                "patch must set at least one field",
            ));
        }

        if let Some(Some(class_id)) = patch.class_id.as_ref() {
            let exists: Option<i64> = conn
                .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
                    r.get(0)
                })
                .optional()
                .map_err(StoreError::query)?;
            if exists.is_none() {
                return Err(StoreError::not_found("class"));
            }
        }

        let mut sets: Vec<&'static str> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();
        if let Some(v) = &patch.student_id {
            sets.push("student_id = ?");
            binds.push(Value::Text(v.clone()));
        }
        if let Some(v) = &patch.class_id {
            sets.push("class_id = ?");
            binds.push(match v {
                Some(s) => Value::Text(s.clone()),
                None => Value::Null,
            });
        }
        if let Some(v) = &patch.parent_name {
            sets.push("parent_name = ?");
            binds.push(Value::Text(v.clone()));
        }
        if let Some(v) = &patch.parent_email {
            sets.push("parent_email = ?");
            binds.push(match v {
                Some(s) => Value::Text(s.clone()),
                None => Value::Null,
            });
        }
        if let Some(v) = &patch.parent_phone {
            sets.push("parent_phone = ?");
            binds.push(match v {
                Some(s) => Value::Text(s.clone()),
                None => Value::Null,
            });
        }
        if let Some(v) = &patch.enrollment_date {
            sets.push("enrollment_date = ?");
            binds.push(Value::Text(v.clone()));
        }
        if let Some(v) = &patch.status {
            sets.push("status = ?");
            binds.push(Value::Text(v.as_str().to_string()));
        }
        binds.push(Value::Text(id.to_string()));

        let sql = format!("UPDATE students SET {} WHERE id = ?", sets.join(", "));
        let changed = conn
            .execute(&sql, params_from_iter(binds))
            .map_err(StoreError::update)?;
        if changed == 0 {
            return Err(StoreError::not_found("student"));
        }

        let row = select_one(conn, id)?.ok_or_else(|| StoreError::not_found("student"))?;
        self.cache.patch_where(|r| r.student.id == id, row.clone());
        Ok(row)
    }

    pub fn delete(&mut self, conn: &Connection, caller: &Caller, id: &str) -> Result<(), StoreError> {
        policy::require_admin(caller)?;
        let changed = conn
            .execute("DELETE FROM students WHERE id = ?", [id])
            .map_err(StoreError::delete)?;
        if changed == 0 {
            return Err(StoreError::not_found("student"));
        }
        self.cache.remove_where(|r| r.student.id == id);
        Ok(())
    }
}

fn fetch_rows(conn: &Connection, caller: &Caller) -> Result<Vec<StudentWithDetails>, StoreError> {
    let filter = policy::row_filter(conn, Entity::Students, caller)?;

    let (where_clause, binds): (String, Vec<Value>) = match filter {
        RowFilter::All => (String::new(), Vec::new()),
        RowFilter::OwnRows => (
            " WHERE s.user_id = ?".to_string(),
            vec![Value::Text(caller.user_id.clone())],
        ),
        RowFilter::ClassSet(ids) => {
            if ids.is_empty() {
                // Valid empty roster; never issue an unbounded query.
                return Ok(Vec::new());
            }
            let placeholders = std::iter::repeat("?")
                .take(ids.len())
                .collect::<Vec<_>>()
                .join(",");
            (
                format!(" WHERE s.class_id IN ({})", placeholders),
                ids.into_iter().map(Value::Text).collect(),
            )
        }
    };

    let sql = format!(
        "{}{} ORDER BY s.created_at DESC, s.rowid DESC",
        SELECT_COLS, where_clause
    );
    let mut stmt = conn.prepare(&sql).map_err(StoreError::query)?;
    stmt.query_map(params_from_iter(binds), map_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)
}

fn select_one(conn: &Connection, id: &str) -> Result<Option<StudentWithDetails>, StoreError> {
    let sql = format!("{} WHERE s.id = ?", SELECT_COLS);
    conn.query_row(&sql, [id], map_row)
        .optional()
        .map_err(StoreError::query)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StudentWithDetails> {
    let status: String = row.get(8)?;
    let student = Student {
        id: row.get(0)?,
        user_id: row.get(1)?,
        student_id: row.get(2)?,
        class_id: row.get(3)?,
        parent_name: row.get(4)?,
        parent_email: row.get(5)?,
        parent_phone: row.get(6)?,
        enrollment_date: row.get(7)?,
        status: StudentStatus::parse(&status).unwrap_or(StudentStatus::Active),
        created_at: row.get(9)?,
    };

    let user = match row.get::<_, Option<String>>(10)? {
        Some(user_id) => {
            let role: String = row.get(13)?;
            Some(User {
                id: user_id,
                full_name: row.get(11)?,
                email: row.get(12)?,
                role: Role::parse(&role).unwrap_or(Role::Student),
                phone: row.get(14)?,
                address: row.get(15)?,
                date_of_birth: row.get(16)?,
                created_at: row.get(17)?,
            })
        }
        None => None,
    };

    let class = match row.get::<_, Option<String>>(18)? {
        Some(class_id) => Some(Class {
            id: class_id,
            name: row.get(19)?,
            grade_level: row.get(20)?,
            academic_year: row.get(21)?,
            teacher_id: row.get(22)?,
            max_students: row.get(23)?,
            created_at: row.get(24)?,
        }),
        None => None,
    };

    Ok(StudentWithDetails {
        student,
        user,
        class,
    })
}
