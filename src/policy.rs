//! Row-access policy shared by every repository.
//!
//! One declarative table maps (entity, role) to the row filter a fetch must
//! apply; write gates live beside it so the rules cannot drift between
//! entities. Callers are identified by an explicit capability token rather
//! than ambient session state.

use rusqlite::Connection;

use crate::model::Role;
use crate::repo::StoreError;

/// Capability token for one request: who is asking, and as what.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Students,
    Classes,
    Subjects,
    Timetable,
    Attendance,
    Performance,
    Settings,
    AssistantLogs,
}

/// What a fetch is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    All,
    /// Rows whose user_id is the caller's.
    OwnRows,
    /// Rows whose class_id is one of the caller's assigned classes. An empty
    /// set is a valid state (teacher with no classes) and must short-circuit
    /// to an empty result without querying the entity table.
    ClassSet(Vec<String>),
}

pub fn row_filter(
    conn: &Connection,
    entity: Entity,
    caller: &Caller,
) -> Result<RowFilter, StoreError> {
    match (entity, caller.role) {
        // Reference data every role may browse.
        (Entity::Classes | Entity::Subjects, _) => Ok(RowFilter::All),
        // Strictly per-user rows, admin included.
        (Entity::Settings | Entity::AssistantLogs, _) => Ok(RowFilter::OwnRows),
        (_, Role::Admin) => Ok(RowFilter::All),
        (_, Role::Student) => Ok(RowFilter::OwnRows),
        (_, Role::Teacher) => Ok(RowFilter::ClassSet(teacher_class_ids(
            conn,
            &caller.user_id,
        )?)),
    }
}

/// Resolves the classes assigned to a teacher before any entity query runs.
pub fn teacher_class_ids(conn: &Connection, user_id: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT id FROM classes WHERE teacher_id = ? ORDER BY id")
        .map_err(StoreError::query)?;
    stmt.query_map([user_id], |r| r.get::<_, String>(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)
}

pub fn require_admin(caller: &Caller) -> Result<(), StoreError> {
    if caller.role == Role::Admin {
        Ok(())
    } else {
        Err(StoreError::forbidden("admin role required"))
    }
}

/// Attendance write gate: admins mark anyone, students mark only themselves,
/// teachers mark students enrolled in one of their classes.
pub fn can_mark_attendance(
    conn: &Connection,
    caller: &Caller,
    student_user_id: &str,
) -> Result<(), StoreError> {
    match caller.role {
        Role::Admin => Ok(()),
        Role::Student => {
            if caller.user_id == student_user_id {
                Ok(())
            } else {
                Err(StoreError::forbidden(
                    "students may only mark their own attendance",
                ))
            }
        }
        Role::Teacher => {
            if teacher_owns_student(conn, &caller.user_id, student_user_id)? {
                Ok(())
            } else {
                Err(StoreError::forbidden(
                    "student is not in one of your classes",
                ))
            }
        }
    }
}

/// Performance write gate: admins record for anyone, teachers only for
/// students of their classes.
pub fn can_record_performance(
    conn: &Connection,
    caller: &Caller,
    student_user_id: &str,
) -> Result<(), StoreError> {
    match caller.role {
        Role::Admin => Ok(()),
        Role::Teacher => {
            if teacher_owns_student(conn, &caller.user_id, student_user_id)? {
                Ok(())
            } else {
                Err(StoreError::forbidden(
                    "student is not in one of your classes",
                ))
            }
        }
        Role::Student => Err(StoreError::forbidden(
            "students cannot record performance entries",
        )),
    }
}

/// Timetable entries belong to their owner; admins may edit any.
pub fn can_edit_timetable(caller: &Caller, owner_user_id: &str) -> Result<(), StoreError> {
    if caller.role == Role::Admin || caller.user_id == owner_user_id {
        Ok(())
    } else {
        Err(StoreError::forbidden("not the owner of this entry"))
    }
}

fn teacher_owns_student(
    conn: &Connection,
    teacher_user_id: &str,
    student_user_id: &str,
) -> Result<bool, StoreError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*)
             FROM students s
             JOIN classes c ON c.id = s.class_id
             WHERE s.user_id = ? AND c.teacher_id = ?",
            (student_user_id, teacher_user_id),
            |r| r.get(0),
        )
        .map_err(StoreError::query)?;
    Ok(count > 0)
}
