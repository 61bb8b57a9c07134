use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{NotSupported, ValidationErrors},
    model::{non_empty, parse_flag, Draft, Entity, Operable},
};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(DomainId);
id_newtype!(ThreadId);
id_newtype!(ArticleId);
id_newtype!(FileId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainState {
    #[default]
    Ok,
    Pending,
    Locked,
    Deleted,
}

impl DomainState {
    pub fn as_str(self) -> &'static str {
        match self {
            DomainState::Ok => "ok",
            DomainState::Pending => "pending",
            DomainState::Locked => "locked",
            DomainState::Deleted => "deleted",
        }
    }
}

impl fmt::Display for DomainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(DomainState::Ok),
            "pending" => Ok(DomainState::Pending),
            "locked" => Ok(DomainState::Locked),
            "deleted" => Ok(DomainState::Deleted),
            other => Err(format!("unknown domain state \"{other}\"")),
        }
    }
}

/// Contact handles registered for a domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contacts {
    pub registrant: Option<String>,
    pub admin: Option<String>,
    pub tech: Option<String>,
    pub billing: Option<String>,
}

/// Registrar-side switches toggled through remote actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainFlag {
    Autorenewal,
    WhoisProtected,
    TransferLock,
}

impl DomainFlag {
    pub fn column(self) -> &'static str {
        match self {
            DomainFlag::Autorenewal => "autorenewal",
            DomainFlag::WhoisProtected => "whois_protected",
            DomainFlag::TransferLock => "transfer_lock",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    pub name: String,
    pub state: DomainState,
    pub note: Option<String>,
    pub nameservers: Vec<String>,
    pub contacts: Contacts,
    pub autorenewal: bool,
    pub whois_protected: bool,
    pub transfer_lock: bool,
    pub expires: Option<NaiveDate>,
    pub vnc_enabled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Domain {
    type Draft = DomainDraft;

    const KIND: &'static str = "domain";

    fn id(&self) -> i64 {
        self.id.0
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn to_draft(&self) -> DomainDraft {
        DomainDraft {
            name: self.name.clone(),
            state: self.state,
            note: self.note.clone(),
            nameservers: self.nameservers.clone(),
            contacts: self.contacts.clone(),
            autorenewal: self.autorenewal,
            whois_protected: self.whois_protected,
            transfer_lock: self.transfer_lock,
            expires: self.expires,
        }
    }
}

impl Operable for Domain {
    fn check_operable(&self) -> Result<(), NotSupported> {
        match self.state {
            DomainState::Ok => Ok(()),
            DomainState::Pending => Err(NotSupported::new(
                "Another operation is in progress, try again later",
            )),
            DomainState::Locked => Err(NotSupported::new("The domain is locked")),
            DomainState::Deleted => Err(NotSupported::new("The domain has been deleted")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainDraft {
    pub name: String,
    pub state: DomainState,
    pub note: Option<String>,
    pub nameservers: Vec<String>,
    pub contacts: Contacts,
    pub autorenewal: bool,
    pub whois_protected: bool,
    pub transfer_lock: bool,
    pub expires: Option<NaiveDate>,
}

impl Draft for DomainDraft {
    const FIELDS: &'static [&'static str] = &[
        "name",
        "state",
        "note",
        "nameservers",
        "registrant",
        "admin",
        "tech",
        "billing",
        "autorenewal",
        "whois_protected",
        "transfer_lock",
        "expires",
    ];

    fn assign(&mut self, field: &str, value: &str) -> Result<(), String> {
        match field {
            "name" => self.name = value.to_ascii_lowercase(),
            "state" => self.state = value.parse()?,
            "note" => self.note = non_empty(value),
            "nameservers" => self.nameservers = split_nameservers(value),
            "registrant" => self.contacts.registrant = non_empty(value),
            "admin" => self.contacts.admin = non_empty(value),
            "tech" => self.contacts.tech = non_empty(value),
            "billing" => self.contacts.billing = non_empty(value),
            "autorenewal" => self.autorenewal = parse_flag(value)?,
            "whois_protected" => self.whois_protected = parse_flag(value)?,
            "transfer_lock" => self.transfer_lock = parse_flag(value)?,
            "expires" => {
                self.expires = if value.is_empty() {
                    None
                } else {
                    Some(
                        NaiveDate::parse_from_str(value, "%Y-%m-%d")
                            .map_err(|_| format!("\"{value}\" is not a YYYY-MM-DD date"))?,
                    )
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.is_empty() {
            errors.add("name", "Name cannot be blank.");
        } else if !is_valid_hostname(&self.name) {
            errors.add("name", "Name is not a valid domain name.");
        }
        if let Some(note) = &self.note {
            if note.chars().count() > 255 {
                errors.add("note", "Note should contain at most 255 characters.");
            }
        }
        errors.merge(validate_nameservers(&self.nameservers));
        errors.into_result()
    }
}

pub fn split_nameservers(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

pub fn validate_nameservers(nameservers: &[String]) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if nameservers.len() > 13 {
        errors.add("nameservers", "At most 13 name servers are allowed.");
    }
    for ns in nameservers {
        if !is_valid_hostname(ns) {
            errors.add("nameservers", format!("\"{ns}\" is not a valid host name."));
        }
    }
    errors
}

/// RFC 1123 host name: dot-separated labels of letters, digits and inner hyphens.
pub fn is_valid_hostname(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 || !name.contains('.') {
        return false;
    }
    name.trim_end_matches('.').split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}
