use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use super::{RepoCache, StoreError};
use crate::model::{Theme, UserSettings};
use crate::policy::{self, Caller, Entity, RowFilter};

const SELECT_COLS: &str = "SELECT
       id, user_id, theme, notifications_enabled, language, updated_at
     FROM user_settings";

/// Settings are strictly per-user; the cache holds zero or one row.
#[derive(Debug, Default)]
pub struct SettingsRepo {
    cache: RepoCache<UserSettings>,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub theme: Option<Theme>,
    pub notifications_enabled: Option<bool>,
    pub language: Option<String>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.theme.is_none() && self.notifications_enabled.is_none() && self.language.is_none()
    }
}

impl SettingsRepo {
    pub fn current(&self) -> Option<&UserSettings> {
        self.cache.records().first()
    }

    pub fn reset(&mut self) {
        self.cache.reset();
    }

    /// A missing row is a valid state (settings have never been saved), not
    /// an error.
    pub fn fetch(
        &mut self,
        conn: &Connection,
        caller: &Caller,
    ) -> Result<Option<&UserSettings>, StoreError> {
        self.cache.begin_fetch();
        match fetch_row(conn, caller) {
            Ok(row) => {
                self.cache.replace(row.into_iter().collect());
                Ok(self.current())
            }
            Err(e) => {
                self.cache.fail_fetch();
                Err(e)
            }
        }
    }

    /// Read-merge-upsert keyed on user_id; every change rewrites updated_at.
    pub fn update(
        &mut self,
        conn: &Connection,
        caller: &Caller,
        patch: SettingsPatch,
    ) -> Result<UserSettings, StoreError> {
        if patch.is_empty() {
            return Err(StoreError::new(
                "bad_params",
                "patch must set at least one field",
            ));
        }

        let existing = fetch_row(conn, caller)?;

        let theme = patch
            .theme
            .or(existing.as_ref().map(|s| s.theme))
            .unwrap_or(Theme::System);
        let notifications_enabled = patch
            .notifications_enabled
            .or(existing.as_ref().map(|s| s.notifications_enabled))
            .unwrap_or(true);
        let language = patch
            .language
            .or(existing.as_ref().map(|s| s.language.clone()))
            .unwrap_or_else(|| "en".to_string());

        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO user_settings(
               id, user_id, theme, notifications_enabled, language, updated_at
             ) VALUES(?, ?, ?, ?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))
             ON CONFLICT(user_id) DO UPDATE SET
               theme = excluded.theme,
               notifications_enabled = excluded.notifications_enabled,
               language = excluded.language,
               updated_at = excluded.updated_at",
            (
                &id,
                &caller.user_id,
                theme.as_str(),
                notifications_enabled as i64,
                &language,
            ),
        )
        .map_err(StoreError::update)?;

        let row = fetch_row(conn, caller)?.ok_or_else(|| StoreError::not_found("settings"))?;
        self.cache.replace(vec![row.clone()]);
        Ok(row)
    }
}

fn fetch_row(conn: &Connection, caller: &Caller) -> Result<Option<UserSettings>, StoreError> {
    let RowFilter::OwnRows = policy::row_filter(conn, Entity::Settings, caller)? else {
        return Err(StoreError::forbidden("settings are scoped to the caller"));
    };
    let sql = format!("{} WHERE user_id = ?", SELECT_COLS);
    conn.query_row(&sql, [&caller.user_id], map_row)
        .optional()
        .map_err(StoreError::query)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserSettings> {
    let theme: String = row.get(2)?;
    Ok(UserSettings {
        id: row.get(0)?,
        user_id: row.get(1)?,
        theme: Theme::parse(&theme).unwrap_or(Theme::System),
        notifications_enabled: row.get::<_, i64>(3)? != 0,
        language: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
