use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{ArticleId, ThreadId},
    error::ValidationErrors,
    model::{non_empty, parse_flag, parse_optional_id, Draft, Entity},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadState {
    #[default]
    Opened,
    Answered,
    Closed,
}

impl ThreadState {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadState::Opened => "opened",
            ThreadState::Answered => "answered",
            ThreadState::Closed => "closed",
        }
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreadState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opened" => Ok(ThreadState::Opened),
            "answered" => Ok(ThreadState::Answered),
            "closed" => Ok(ThreadState::Closed),
            other => Err(format!("unknown thread state \"{other}\"")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority \"{other}\"")),
        }
    }
}

/// A support ticket thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub subject: String,
    pub author_id: i64,
    pub responsible_id: Option<i64>,
    pub state: ThreadState,
    pub priority: Priority,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for Thread {
    type Draft = ThreadDraft;

    const KIND: &'static str = "thread";

    fn id(&self) -> i64 {
        self.id.0
    }

    fn display_name(&self) -> &str {
        &self.subject
    }

    fn to_draft(&self) -> ThreadDraft {
        ThreadDraft {
            subject: self.subject.clone(),
            author_id: Some(self.author_id),
            responsible_id: self.responsible_id,
            state: self.state,
            priority: self.priority,
            message: self.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadDraft {
    pub subject: String,
    pub author_id: Option<i64>,
    pub responsible_id: Option<i64>,
    pub state: ThreadState,
    pub priority: Priority,
    pub message: String,
}

impl Draft for ThreadDraft {
    const FIELDS: &'static [&'static str] = &[
        "subject",
        "author_id",
        "responsible_id",
        "state",
        "priority",
        "message",
    ];

    fn assign(&mut self, field: &str, value: &str) -> Result<(), String> {
        match field {
            "subject" => self.subject = value.to_string(),
            "author_id" => self.author_id = parse_optional_id(value)?,
            "responsible_id" => self.responsible_id = parse_optional_id(value)?,
            "state" => self.state = value.parse()?,
            "priority" => self.priority = value.parse()?,
            "message" => self.message = value.to_string(),
            _ => {}
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.subject.is_empty() {
            errors.add("subject", "Subject cannot be blank.");
        } else if self.subject.chars().count() > 255 {
            errors.add("subject", "Subject should contain at most 255 characters.");
        }
        if self.author_id.is_none() {
            errors.add("author_id", "Author cannot be blank.");
        }
        errors.into_result()
    }
}

/// A published help article. `texts` holds the rendered body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub name: String,
    pub is_published: bool,
    pub texts: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Article {
    type Draft = ArticleDraft;

    const KIND: &'static str = "article";

    fn id(&self) -> i64 {
        self.id.0
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn to_draft(&self) -> ArticleDraft {
        ArticleDraft {
            name: self.name.clone(),
            is_published: self.is_published,
            texts: self.texts.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub name: String,
    pub is_published: bool,
    pub texts: Option<String>,
}

impl Draft for ArticleDraft {
    const FIELDS: &'static [&'static str] = &["name", "is_published", "texts"];

    fn assign(&mut self, field: &str, value: &str) -> Result<(), String> {
        match field {
            "name" => self.name = value.to_string(),
            "is_published" => self.is_published = parse_flag(value)?,
            "texts" => self.texts = non_empty(value),
            _ => {}
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.is_empty() {
            errors.add("name", "Name cannot be blank.");
        } else if !self
            .name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            errors.add(
                "name",
                "Name may only contain letters, digits, dashes and underscores.",
            );
        }
        errors.into_result()
    }
}
