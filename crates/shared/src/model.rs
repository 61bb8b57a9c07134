use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{NotSupported, ValidationErrors};

/// Raw request parameters as they arrive from a query string or form body.
pub type Params = BTreeMap<String, String>;

/// A persisted record the generic controllers can load, save and delete.
pub trait Entity: Serialize + Clone + Send + Sync + 'static {
    type Draft: Draft;

    /// Route and message name, e.g. `"domain"`.
    const KIND: &'static str;

    fn id(&self) -> i64;
    fn display_name(&self) -> &str;
    fn to_draft(&self) -> Self::Draft;
}

/// Gate evaluated before any state-changing remote action.
pub trait Operable {
    fn check_operable(&self) -> Result<(), NotSupported>;

    fn is_operable(&self) -> bool {
        self.check_operable().is_ok()
    }
}

/// Typed, allow-listed update struct for an entity.
pub trait Draft: Serialize + Clone + Default + PartialEq + Send + Sync + 'static {
    /// Fields a request payload may set. Anything else is rejected by [`bind`].
    const FIELDS: &'static [&'static str];

    /// Assigns one allow-listed field. Returns a user-facing message when the
    /// raw value cannot be parsed.
    fn assign(&mut self, field: &str, value: &str) -> Result<(), String>;

    fn validate(&self) -> Result<(), ValidationErrors>;
}

#[derive(Debug, Clone)]
pub struct Binding<D> {
    pub draft: D,
    pub assigned: Vec<String>,
    pub rejected: Vec<String>,
    pub errors: ValidationErrors,
}

impl<D: Draft> Binding<D> {
    /// True when the payload carried at least one allow-listed field.
    pub fn is_loaded(&self) -> bool {
        !self.assigned.is_empty()
    }

    /// Runs the draft's rules and folds in any parse errors from binding.
    pub fn validated(self) -> Result<D, (D, ValidationErrors)> {
        let mut errors = self.errors;
        if let Err(rule_errors) = self.draft.validate() {
            errors.merge(rule_errors);
        }
        if errors.is_empty() {
            Ok(self.draft)
        } else {
            Err((self.draft, errors))
        }
    }
}

/// Copies allow-listed fields from `raw` onto `draft`.
pub fn bind<D: Draft>(mut draft: D, raw: &Params) -> Binding<D> {
    let mut assigned = Vec::new();
    let mut rejected = Vec::new();
    let mut errors = ValidationErrors::new();

    for (field, value) in raw {
        if !D::FIELDS.contains(&field.as_str()) {
            rejected.push(field.clone());
            continue;
        }
        if let Err(message) = draft.assign(field, value.trim()) {
            errors.add(field, message);
        }
        assigned.push(field.clone());
    }

    Binding {
        draft,
        assigned,
        rejected,
        errors,
    }
}

pub fn parse_flag(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "" | "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(format!("\"{value}\" is not a boolean")),
    }
}

pub fn parse_optional_id(value: &str) -> Result<Option<i64>, String> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<i64>()
        .map(Some)
        .map_err(|_| format!("\"{value}\" is not an integer"))
}

pub fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
