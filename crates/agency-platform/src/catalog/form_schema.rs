//! Dynamic Form Schema
//!
//! Admin-authored intake forms attached to a service. Each field carries a
//! tagged kind (`text`, `textarea`, `select`, `radio`, `file`, `date`) that
//! decides how a submitted value is checked.
//!
//! `step` and `groupName` are presentation metadata only. A submission may
//! carry every step's values at once.

use chrono::{DateTime, NaiveDate};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::shared::error::{PlatformError, Result};
use crate::TsidGenerator;

/// Field names are snake_case identifiers
fn name_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap())
}

/// Field type with its type-specific settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Textarea,
    Select { options: Vec<String> },
    Radio { options: Vec<String> },
    /// Value is a reference to an already uploaded file
    File,
    /// `YYYY-MM-DD` or RFC 3339
    Date,
}

impl FieldKind {
    pub fn options(&self) -> Option<&[String]> {
        match self {
            Self::Select { options } | Self::Radio { options } => Some(options),
            _ => None,
        }
    }

    /// Check a present, non-blank value. Returns the normalized value.
    fn check(&self, label: &str, value: &Value) -> std::result::Result<Value, (FieldErrorCode, String)> {
        match self {
            Self::Text | Self::Textarea => match value {
                Value::String(s) => Ok(Value::String(s.trim().to_string())),
                _ => Err((FieldErrorCode::WrongType, format!("{} must be text", label))),
            },
            Self::Select { options } | Self::Radio { options } => match value {
                Value::String(s) if options.iter().any(|o| o == s) => Ok(value.clone()),
                Value::String(_) => Err((
                    FieldErrorCode::OptionNotAllowed,
                    format!("{} must be one of: {}", label, options.join(", ")),
                )),
                _ => Err((FieldErrorCode::WrongType, format!("{} must be text", label))),
            },
            Self::File => match value {
                Value::String(s) => Ok(Value::String(s.trim().to_string())),
                _ => Err((FieldErrorCode::MissingFile, format!("{} requires an uploaded file", label))),
            },
            Self::Date => match value {
                Value::String(s) if is_date(s.trim()) => Ok(Value::String(s.trim().to_string())),
                _ => Err((
                    FieldErrorCode::InvalidDate,
                    format!("{} must be a date (YYYY-MM-DD)", label),
                )),
            },
        }
    }
}

fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(s).is_ok()
}

fn default_step() -> u32 {
    1
}

/// One admin-defined form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    /// Assigned on first definition when left empty
    #[serde(default)]
    pub id: String,

    /// Key under which the value is submitted
    pub name: String,

    pub label: String,

    #[serde(flatten)]
    pub kind: FieldKind,

    #[serde(default)]
    pub required: bool,

    /// May be filled from the submitter's profile
    #[serde(default)]
    pub from_user: bool,

    #[serde(default = "default_step")]
    pub step: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            label: label.into(),
            kind,
            required: false,
            from_user: false,
            step: 1,
            group_name: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn from_user(mut self) -> Self {
        self.from_user = true;
        self
    }

    pub fn in_step(mut self, step: u32, group_name: Option<&str>) -> Self {
        self.step = step;
        self.group_name = group_name.map(str::to_string);
        self
    }

    /// Definition-level checks that don't depend on sibling fields
    fn validate(&self) -> Result<()> {
        if !name_pattern().is_match(&self.name) {
            return Err(PlatformError::validation(format!(
                "Field name '{}' must be snake_case",
                self.name
            )));
        }
        if self.label.trim().is_empty() {
            return Err(PlatformError::validation("Field label is required"));
        }
        if self.step == 0 {
            return Err(PlatformError::validation("Field step starts at 1"));
        }
        if let Some(options) = self.kind.options() {
            if options.is_empty() || options.iter().any(|o| o.trim().is_empty()) {
                return Err(PlatformError::validation(format!(
                    "Field '{}' needs a non-empty list of options",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Why a submitted value was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldErrorCode {
    Missing,
    WrongType,
    OptionNotAllowed,
    InvalidDate,
    MissingFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub code: FieldErrorCode,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, code: FieldErrorCode, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

/// Source of `from_user` values
pub trait ProfileLookup {
    fn profile_value(&self, field: &str) -> Option<String>;
}

impl ProfileLookup for HashMap<String, String> {
    fn profile_value(&self, field: &str) -> Option<String> {
        self.get(field).cloned()
    }
}

/// Fields sharing a group within a step
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldGroup<'a> {
    pub name: Option<&'a str>,
    pub fields: Vec<&'a FieldDefinition>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormStep<'a> {
    pub step: u32,
    pub groups: Vec<FieldGroup<'a>>,
}

/// Ordered field set of one service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSchema {
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl FormSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema by defining each field in turn
    pub fn from_fields(fields: Vec<FieldDefinition>) -> Result<Self> {
        let mut schema = Self::new();
        for field in fields {
            schema.define_field(field)?;
        }
        Ok(schema)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Add or replace a field.
    ///
    /// A definition carrying the id of an existing field replaces it in place;
    /// anything else is appended with a fresh id. Names stay unique.
    pub fn define_field(&mut self, mut field: FieldDefinition) -> Result<&FieldDefinition> {
        field.name = field.name.trim().to_string();
        field.label = field.label.trim().to_string();
        field.validate()?;

        let existing = if field.id.is_empty() {
            None
        } else {
            self.fields.iter().position(|f| f.id == field.id)
        };

        if self
            .fields
            .iter()
            .enumerate()
            .any(|(i, f)| f.name == field.name && Some(i) != existing)
        {
            return Err(PlatformError::duplicate("Field", "name", &field.name));
        }

        let index = match existing {
            Some(i) => {
                self.fields[i] = field;
                i
            }
            None => {
                if field.id.is_empty() {
                    field.id = TsidGenerator::generate();
                }
                self.fields.push(field);
                self.fields.len() - 1
            }
        };
        Ok(&self.fields[index])
    }

    /// Remove a field by name. Returns `false` if there was none.
    pub fn remove_field(&mut self, name: &str) -> bool {
        let before = self.fields.len();
        self.fields.retain(|f| f.name != name);
        self.fields.len() != before
    }

    /// Fields by step (ascending), then by group in order of first appearance
    pub fn steps(&self) -> Vec<FormStep<'_>> {
        let mut steps: Vec<u32> = self.fields.iter().map(|f| f.step).collect();
        steps.sort_unstable();
        steps.dedup();

        steps
            .into_iter()
            .map(|step| {
                let mut groups: Vec<FieldGroup<'_>> = Vec::new();
                for field in self.fields.iter().filter(|f| f.step == step) {
                    let name = field.group_name.as_deref();
                    match groups.iter_mut().find(|g| g.name == name) {
                        Some(group) => group.fields.push(field),
                        None => groups.push(FieldGroup { name, fields: vec![field] }),
                    }
                }
                FormStep { step, groups }
            })
            .collect()
    }

    /// Check a submission against the schema.
    ///
    /// Errors come back in declaration order, at most one per field. Keys
    /// that match no field are dropped from the normalized output. Absent
    /// `from_user` fields are filled from `profile`.
    pub fn validate_submission(
        &self,
        values: &Map<String, Value>,
        profile: &dyn ProfileLookup,
    ) -> std::result::Result<IndexMap<String, Value>, Vec<FieldError>> {
        let mut normalized = IndexMap::new();
        let mut errors = Vec::new();

        for field in &self.fields {
            let value = match values.get(&field.name).filter(|v| !is_blank(v)) {
                Some(v) => Some(v.clone()),
                None if field.from_user => profile
                    .profile_value(&field.name)
                    .filter(|v| !v.trim().is_empty())
                    .map(Value::String),
                None => None,
            };

            let Some(value) = value else {
                if field.required {
                    errors.push(missing(field));
                }
                continue;
            };

            match field.kind.check(&field.label, &value) {
                Ok(value) => {
                    normalized.insert(field.name.clone(), value);
                }
                Err((code, message)) => errors.push(FieldError::new(&field.name, code, message)),
            }
        }

        if errors.is_empty() {
            Ok(normalized)
        } else {
            Err(errors)
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn missing(field: &FieldDefinition) -> FieldError {
    match field.kind {
        FieldKind::File => FieldError::new(
            &field.name,
            FieldErrorCode::MissingFile,
            format!("{} requires an uploaded file", field.label),
        ),
        _ => FieldError::new(
            &field.name,
            FieldErrorCode::Missing,
            format!("{} is required", field.label),
        ),
    }
}
