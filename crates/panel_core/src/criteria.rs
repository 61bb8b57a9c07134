use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use shared::{
    content::{Priority, ThreadState},
    domain::DomainState,
    model::{non_empty, parse_flag, parse_optional_id},
};
use storage::Query;

use crate::search::Criteria;

fn parse_optional<T: std::str::FromStr<Err = String>>(value: &str) -> Result<Option<T>, String> {
    if value.is_empty() {
        Ok(None)
    } else {
        value.parse().map(Some)
    }
}

fn parse_optional_flag(value: &str) -> Result<Option<bool>, String> {
    if value.is_empty() {
        Ok(None)
    } else {
        parse_flag(value).map(Some)
    }
}

/// Accepts RFC 3339 or a bare `YYYY-MM-DD`. A bare date means the start of
/// that day, or its last second when `end_of_day` is set.
fn parse_moment(value: &str, end_of_day: bool) -> Result<Option<DateTime<Utc>>, String> {
    if value.is_empty() {
        return Ok(None);
    }
    if let Ok(moment) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(moment.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("\"{value}\" is not a date"))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .unwrap_or_default();
    Ok(Some(date.and_time(time).and_utc()))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DomainSearch {
    pub name: Option<String>,
    pub state: Option<DomainState>,
    pub note: Option<String>,
    pub autorenewal: Option<bool>,
}

impl Criteria for DomainSearch {
    const SAFE_FIELDS: &'static [&'static str] = &["name", "state", "note", "autorenewal"];
    const SORTABLE: &'static [&'static str] = &["id", "name", "state", "expires", "created_at"];

    fn assign(&mut self, field: &str, value: &str) -> Result<(), String> {
        match field {
            "name" => self.name = non_empty(value),
            "state" => self.state = parse_optional(value)?,
            "note" => self.note = non_empty(value),
            "autorenewal" => self.autorenewal = parse_optional_flag(value)?,
            _ => {}
        }
        Ok(())
    }

    fn apply(&self, query: Query) -> Query {
        query
            .and_filter_like("name", self.name.as_deref())
            .and_filter_where("state", self.state.map(DomainState::as_str))
            .and_filter_like("note", self.note.as_deref())
            .and_filter_where("autorenewal", self.autorenewal)
    }
}

/// Ticket filters. `time_from` and `time_till` bound `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThreadSearch {
    pub subject: Option<String>,
    pub author_id: Option<i64>,
    pub responsible_id: Option<i64>,
    pub state: Option<ThreadState>,
    pub priority: Option<Priority>,
    pub time_from: Option<DateTime<Utc>>,
    pub time_till: Option<DateTime<Utc>>,
}

impl Criteria for ThreadSearch {
    const SAFE_FIELDS: &'static [&'static str] = &[
        "subject",
        "author_id",
        "responsible_id",
        "state",
        "priority",
        "time_from",
        "time_till",
    ];
    const SORTABLE: &'static [&'static str] = &["id", "subject", "state", "priority", "created_at"];

    fn assign(&mut self, field: &str, value: &str) -> Result<(), String> {
        match field {
            "subject" => self.subject = non_empty(value),
            "author_id" => self.author_id = parse_optional_id(value)?,
            "responsible_id" => self.responsible_id = parse_optional_id(value)?,
            "state" => self.state = parse_optional(value)?,
            "priority" => self.priority = parse_optional(value)?,
            "time_from" => self.time_from = parse_moment(value, false)?,
            "time_till" => self.time_till = parse_moment(value, true)?,
            _ => {}
        }
        Ok(())
    }

    fn apply(&self, query: Query) -> Query {
        query
            .and_filter_where("author_id", self.author_id)
            .and_filter_where("responsible_id", self.responsible_id)
            .and_filter_where("state", self.state.map(ThreadState::as_str))
            .and_filter_where("priority", self.priority.map(Priority::as_str))
            .and_filter_like("subject", self.subject.as_deref())
            .and_filter_gte("created_at", self.time_from)
            .and_filter_lte("created_at", self.time_till)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArticleSearch {
    pub name: Option<String>,
    pub is_published: Option<bool>,
}

impl Criteria for ArticleSearch {
    const SAFE_FIELDS: &'static [&'static str] = &["name", "is_published"];
    const SORTABLE: &'static [&'static str] = &["id", "name", "created_at"];

    fn assign(&mut self, field: &str, value: &str) -> Result<(), String> {
        match field {
            "name" => self.name = non_empty(value),
            "is_published" => self.is_published = parse_optional_flag(value)?,
            _ => {}
        }
        Ok(())
    }

    fn apply(&self, query: Query) -> Query {
        query
            .and_filter_like("name", self.name.as_deref())
            .and_filter_where("is_published", self.is_published)
    }
}
