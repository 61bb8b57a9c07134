use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainId, DomainState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Error,
}

/// One-time message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            title: Some(title.into()),
            text: text.into(),
        }
    }

    pub fn error(title: Option<String>, text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            title,
            text: text.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.severity == Severity::Success
    }
}

/// One page of a listing plus the numbers a pager needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub page_count: u32,
    pub sort: String,
}

/// VNC console availability for a server-backed domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VncInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub connection: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestState {
    pub id: DomainId,
    pub name: String,
    pub state: DomainState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdated {
    pub id: DomainId,
    pub note: Option<String>,
}
