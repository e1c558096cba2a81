use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "edumanager.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL,
            phone TEXT,
            address TEXT,
            date_of_birth TEXT,
            password_hash TEXT NOT NULL,
            password_salt TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            grade_level INTEGER NOT NULL,
            academic_year TEXT NOT NULL,
            teacher_id TEXT,
            max_students INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(teacher_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_teacher ON classes(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            student_id TEXT NOT NULL UNIQUE,
            class_id TEXT,
            parent_name TEXT NOT NULL,
            parent_email TEXT,
            parent_phone TEXT,
            enrollment_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_user ON students(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT NOT NULL,
            description TEXT NOT NULL,
            grade_levels TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            subject_id TEXT,
            day TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            location TEXT NOT NULL,
            class_id TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id),
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    // Older workspaces predate subject links on timetable rows.
    ensure_timetable_subject_id(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_user ON timetable(user_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_timetable_class ON timetable(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            remarks TEXT NOT NULL DEFAULT '',
            recorded_by TEXT,
            class_id TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(user_id, date),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    ensure_attendance_class_id(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_user ON attendance(user_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_class ON attendance(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS performance(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            subject_id TEXT,
            grade TEXT NOT NULL,
            score REAL NOT NULL,
            max_score REAL NOT NULL,
            remarks TEXT NOT NULL DEFAULT '',
            recorded_by TEXT,
            recorded_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_performance_user ON performance(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assistant_logs(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            prompt TEXT NOT NULL,
            response TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assistant_logs_user ON assistant_logs(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS user_settings(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            theme TEXT NOT NULL DEFAULT 'system',
            notifications_enabled INTEGER NOT NULL DEFAULT 1,
            language TEXT NOT NULL DEFAULT 'en',
            updated_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;

    // v0 workspaces stored the follow-the-OS theme as 'auto'.
    migrate_settings_theme(&conn)?;

    Ok(conn)
}

fn ensure_timetable_subject_id(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "timetable", "subject_id")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE timetable ADD COLUMN subject_id TEXT", [])?;
    Ok(())
}

fn ensure_attendance_class_id(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "attendance", "class_id")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE attendance ADD COLUMN class_id TEXT", [])?;
    Ok(())
}

fn migrate_settings_theme(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE user_settings SET theme = 'system' WHERE theme = 'auto'",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
