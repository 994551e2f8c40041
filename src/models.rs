use crate::errors::JournalError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

const SUBJECT_ID_LEN: usize = 24;

/// Reference to the user whose activity is tracked: a 24 digit hex document id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    pub fn parse(raw: &str) -> Result<Self, JournalError> {
        let trimmed = raw.trim();
        if trimmed.len() != SUBJECT_ID_LEN || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(JournalError::InvalidSubject(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SubjectId {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SubjectId {
    type Error = JournalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SubjectId> for String {
    fn from(value: SubjectId) -> Self {
        value.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Login,
    Logout,
    TaskCreated,
    TaskDone,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Login,
        ActionKind::Logout,
        ActionKind::TaskCreated,
        ActionKind::TaskDone,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Login => "login",
            ActionKind::Logout => "logout",
            ActionKind::TaskCreated => "task_created",
            ActionKind::TaskDone => "task_done",
        }
    }
}

impl FromStr for ActionKind {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| JournalError::InvalidActionKind(s.to_string()))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the journal. Never mutated after it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub subject: SubjectId,
    pub action: ActionKind,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStat {
    pub month: u32,
    pub day: u32,
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    pub subject: String,
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub action: String,
    pub as_of: Option<DateTime<Utc>>,
}
