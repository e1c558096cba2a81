use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::model::{Role, User};
use crate::repo::StoreError;

const SELECT_COLS: &str = "SELECT
       id, full_name, email, role, phone, address, date_of_birth, created_at
     FROM users";

pub fn hash_password(salt: &str, password: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", salt, password).as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[derive(Debug, Clone)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
}

pub fn sign_up(conn: &Connection, req: SignUp) -> Result<User, StoreError> {
    let email = req.email.trim().to_lowercase();
    let full_name = req.full_name.trim().to_string();
    if email.is_empty() || !email.contains('@') {
        return Err(StoreError::validation("email must be a valid address"));
    }
    if full_name.is_empty() {
        return Err(StoreError::validation("fullName must not be empty"));
    }
    if req.password.len() < 6 {
        return Err(StoreError::validation(
            "password must be at least 6 characters",
        ));
    }

    let taken: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE email = ?", [&email], |r| {
            r.get(0)
        })
        .optional()
        .map_err(StoreError::query)?;
    if taken.is_some() {
        return Err(StoreError::new("email_taken", "email is already registered"));
    }

    let id = Uuid::new_v4().to_string();
    let salt = Uuid::new_v4().to_string();
    let hash = hash_password(&salt, &req.password);
    conn.execute(
        "INSERT INTO users(
           id, full_name, email, role, phone, password_hash, password_salt, created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (
            &id,
            &full_name,
            &email,
            req.role.as_str(),
            req.phone.as_deref(),
            &hash,
            &salt,
        ),
    )
    .map_err(StoreError::insert)?;

    user_by_id(conn, &id)?.ok_or_else(|| StoreError::not_found("user"))
}

pub fn sign_in(conn: &Connection, email: &str, password: &str) -> Result<User, StoreError> {
    let email = email.trim().to_lowercase();
    let creds: Option<(String, String, String)> = conn
        .query_row(
            "SELECT id, password_hash, password_salt FROM users WHERE email = ?",
            [&email],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
        .map_err(StoreError::query)?;

    // One error for both unknown email and wrong password.
    let Some((id, hash, salt)) = creds else {
        return Err(StoreError::new(
            "invalid_credentials",
            "email or password is incorrect",
        ));
    };
    if hash_password(&salt, password) != hash {
        return Err(StoreError::new(
            "invalid_credentials",
            "email or password is incorrect",
        ));
    }

    user_by_id(conn, &id)?.ok_or_else(|| StoreError::not_found("user"))
}

pub fn user_by_id(conn: &Connection, id: &str) -> Result<Option<User>, StoreError> {
    let sql = format!("{} WHERE id = ?", SELECT_COLS);
    conn.query_row(&sql, [id], map_user)
        .optional()
        .map_err(StoreError::query)
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        role: Role::parse(&role).unwrap_or(Role::Student),
        phone: row.get(4)?,
        address: row.get(5)?,
        date_of_birth: row.get(6)?,
        created_at: row.get(7)?,
    })
}
