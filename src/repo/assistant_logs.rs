use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use super::{RepoCache, StoreError};
use crate::model::AssistantLog;
use crate::policy::{self, Caller, Entity, RowFilter};

const SELECT_COLS: &str = "SELECT id, user_id, prompt, response, created_at FROM assistant_logs";

/// Append-only log of (prompt, response) pairs, newest first, capped at the
/// most recent 50 for display.
#[derive(Debug, Default)]
pub struct AssistantLogRepo {
    cache: RepoCache<AssistantLog>,
}

impl AssistantLogRepo {
    pub fn reset(&mut self) {
        self.cache.reset();
    }

    pub fn fetch(
        &mut self,
        conn: &Connection,
        caller: &Caller,
    ) -> Result<&[AssistantLog], StoreError> {
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

    pub fn append(
        &mut self,
        conn: &Connection,
        caller: &Caller,
        prompt: &str,
        response: &str,
    ) -> Result<AssistantLog, StoreError> {
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO assistant_logs(id, user_id, prompt, response, created_at)
             VALUES(?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
            (&id, &caller.user_id, prompt, response),
        )
        .map_err(StoreError::insert)?;

        let sql = format!("{} WHERE id = ?", SELECT_COLS);
        let row = conn
            .query_row(&sql, [&id], map_row)
            .optional()
            .map_err(StoreError::query)?
            .ok_or_else(|| StoreError::not_found("assistant log"))?;
        self.cache.prepend(row.clone());
        Ok(row)
    }
}

fn fetch_rows(conn: &Connection, caller: &Caller) -> Result<Vec<AssistantLog>, StoreError> {
    let RowFilter::OwnRows = policy::row_filter(conn, Entity::AssistantLogs, caller)? else {
        return Err(StoreError::forbidden("assistant logs are scoped to the caller"));
    };
    let sql = format!(
        "{} WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 50",
        SELECT_COLS
    );
    let mut stmt = conn.prepare(&sql).map_err(StoreError::query)?;
    stmt.query_map([&caller.user_id], map_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::query)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssistantLog> {
    Ok(AssistantLog {
        id: row.get(0)?,
        user_id: row.get(1)?,
        prompt: row.get(2)?,
        response: row.get(3)?,
        created_at: row.get(4)?,
    })
}
