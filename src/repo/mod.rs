use serde::Serialize;

mod assistant_logs;
mod attendance;
mod classes;
mod performance;
mod settings;
mod students;
mod subjects;
mod timetable;

pub use assistant_logs::AssistantLogRepo;
pub use attendance::AttendanceRepo;
pub use classes::{ClassPatch, ClassRepo, NewClass};
pub use performance::{NewPerformanceRecord, PerformancePatch, PerformanceRepo};
pub use settings::{SettingsPatch, SettingsRepo};
pub use students::{NewStudent, StudentPatch, StudentRepo};
pub use subjects::{NewSubject, SubjectPatch, SubjectRepo};
pub use timetable::{NewTimetableEntry, TimetableEntryPatch, TimetableRepo};

/// Error surfaced across the repository boundary. Repositories never panic;
/// every failure is returned as one of these and the cache is left at its
/// previous value.
#[derive(Debug, Clone, Serialize)]
pub struct StoreError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl StoreError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn query(e: rusqlite::Error) -> Self {
        Self::new("db_query_failed", e.to_string())
    }

    pub fn insert(e: rusqlite::Error) -> Self {
        Self::new("db_insert_failed", e.to_string())
    }

    pub fn update(e: rusqlite::Error) -> Self {
        Self::new("db_update_failed", e.to_string())
    }

    pub fn delete(e: rusqlite::Error) -> Self {
        Self::new("db_delete_failed", e.to_string())
    }

    pub fn tx(e: rusqlite::Error) -> Self {
        Self::new("db_tx_failed", e.to_string())
    }

    pub fn not_found(what: &str) -> Self {
        Self::new("not_found", format!("{} not found", what))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("forbidden", message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_failed", message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Idle,
    Loading,
    Ready,
    Error,
}

/// Per-repository read model: the last successfully fetched row set plus a
/// fetch state. Mutations patch it in place; a failed fetch keeps the stale
/// rows so callers render old data instead of an empty screen.
#[derive(Debug)]
pub struct RepoCache<T> {
    records: Vec<T>,
    state: CacheState,
}

impl<T> Default for RepoCache<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            state: CacheState::Idle,
        }
    }
}

impl<T> RepoCache<T> {
    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn begin_fetch(&mut self) {
        self.state = CacheState::Loading;
    }

    pub fn replace(&mut self, rows: Vec<T>) {
        self.records = rows;
        self.state = CacheState::Ready;
    }

    pub fn fail_fetch(&mut self) {
        self.state = CacheState::Error;
    }

    pub fn prepend(&mut self, row: T) {
        self.records.insert(0, row);
    }

    pub fn append(&mut self, row: T) {
        self.records.push(row);
    }

    /// Replaces the first row matching `pred`, preserving order. Returns
    /// false (cache untouched) when nothing matches.
    pub fn patch_where<F>(&mut self, pred: F, row: T) -> bool
    where
        F: Fn(&T) -> bool,
    {
        match self.records.iter().position(|r| pred(r)) {
            Some(i) => {
                self.records[i] = row;
                true
            }
            None => false,
        }
    }

    pub fn remove_where<F>(&mut self, pred: F)
    where
        F: Fn(&T) -> bool,
    {
        self.records.retain(|r| !pred(r));
    }

    pub fn reset(&mut self) {
        self.records.clear();
        self.state = CacheState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_fetch_keeps_previous_records() {
        let mut cache: RepoCache<i64> = RepoCache::default();
        cache.replace(vec![1, 2, 3]);
        cache.begin_fetch();
        cache.fail_fetch();
        assert_eq!(cache.state(), CacheState::Error);
        assert_eq!(cache.records(), &[1, 2, 3]);
    }

    #[test]
    fn patch_where_preserves_order_and_rejects_misses() {
        let mut cache: RepoCache<(i64, &'static str)> = RepoCache::default();
        cache.replace(vec![(1, "a"), (2, "b"), (3, "c")]);
        assert!(cache.patch_where(|r| r.0 == 2, (2, "bb")));
        assert_eq!(cache.records()[1], (2, "bb"));
        assert_eq!(cache.records()[0], (1, "a"));
        assert!(!cache.patch_where(|r| r.0 == 9, (9, "x")));
        assert_eq!(cache.records().len(), 3);
    }
}
