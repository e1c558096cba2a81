use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::model::User;
use crate::payments::PaymentGateway;
use crate::policy::Caller;
use crate::repo::{
    AssistantLogRepo, AttendanceRepo, ClassRepo, PerformanceRepo, SettingsRepo, StudentRepo,
    SubjectRepo, TimetableRepo,
};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Per-session read models, one per entity.
#[derive(Default)]
pub struct Repos {
    pub students: StudentRepo,
    pub classes: ClassRepo,
    pub subjects: SubjectRepo,
    pub timetable: TimetableRepo,
    pub attendance: AttendanceRepo,
    pub performance: PerformanceRepo,
    pub settings: SettingsRepo,
    pub assistant_logs: AssistantLogRepo,
}

impl Repos {
    pub fn reset(&mut self) {
        self.students.reset();
        self.classes.reset();
        self.subjects.reset();
        self.timetable.reset();
        self.attendance.reset();
        self.performance.reset();
        self.settings.reset();
        self.assistant_logs.reset();
    }
}

pub struct Session {
    pub profile: User,
}

impl Session {
    pub fn caller(&self) -> Caller {
        Caller {
            user_id: self.profile.id.clone(),
            role: self.profile.role,
        }
    }
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Option<Session>,
    pub repos: Repos,
    pub payments: PaymentGateway,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            session: None,
            repos: Repos::default(),
            payments: PaymentGateway::default(),
        }
    }

    pub fn caller(&self) -> Option<Caller> {
        self.session.as_ref().map(|s| s.caller())
    }
}
