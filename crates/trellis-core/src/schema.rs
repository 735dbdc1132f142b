//! Declarative form schemas.
//!
//! A [`Schema`] is a list of [`Field`] descriptors. Parsing a submission
//! decodes it (array fields are derived from the descriptors, see
//! [`Schema::array_fields`]), checks every field, coerces the string values
//! into JSON scalars and finally deserializes the result into a typed input
//! struct. Validation is fail-closed: one bad field means no input at all.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::form::{decode, Decoded, DecodedForm, FileBlob, FormSubmission, FormValue};

/// Field-keyed validation messages, serialized as `{"field": ["msg", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Kind {
    Text,
    Integer,
    Boolean { truthy: &'static str },
    Choice(&'static [&'static str]),
    Date,
    File { max_bytes: usize, too_large: &'static str },
    List(Box<Kind>),
}

#[derive(Debug, Clone)]
enum Presence {
    Required,
    Optional,
    Default(Value),
}

/// What an empty string submitted for the field means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Empty {
    Keep,
    Absent,
    Null,
}

#[derive(Debug, Clone)]
pub struct Field {
    name: &'static str,
    kind: Kind,
    presence: Presence,
    min: Option<(usize, &'static str)>,
    max: Option<(usize, &'static str)>,
    email: Option<&'static str>,
    empty: Empty,
}

impl Field {
    fn new(name: &'static str, kind: Kind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Required,
            min: None,
            max: None,
            email: None,
            empty: Empty::Keep,
        }
    }

    pub fn text(name: &'static str) -> Self {
        Self::new(name, Kind::Text)
    }

    /// Integer coerced from its decimal string form.
    pub fn integer(name: &'static str) -> Self {
        Self::new(name, Kind::Integer)
    }

    /// `true` exactly when the submitted value equals `truthy`.
    pub fn boolean(name: &'static str, truthy: &'static str) -> Self {
        Self::new(name, Kind::Boolean { truthy })
    }

    pub fn choice(name: &'static str, options: &'static [&'static str]) -> Self {
        Self::new(name, Kind::Choice(options))
    }

    /// Calendar date in `YYYY-MM-DD` form.
    pub fn date(name: &'static str) -> Self {
        Self::new(name, Kind::Date)
    }

    pub fn file(name: &'static str, max_bytes: usize, too_large: &'static str) -> Self {
        Self::new(name, Kind::File { max_bytes, too_large })
    }

    /// Turn this field into a list of its current kind. `min`/`max` then
    /// bound the number of items.
    pub fn list(mut self) -> Self {
        self.kind = Kind::List(Box::new(self.kind));
        self
    }

    pub fn optional(mut self) -> Self {
        self.presence = Presence::Optional;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.presence = Presence::Default(value.into());
        self
    }

    pub fn min(mut self, n: usize, message: &'static str) -> Self {
        self.min = Some((n, message));
        self
    }

    pub fn max(mut self, n: usize, message: &'static str) -> Self {
        self.max = Some((n, message));
        self
    }

    pub fn email(mut self, message: &'static str) -> Self {
        self.email = Some(message);
        self
    }

    /// An empty string counts as not submitted.
    pub fn empty_as_absent(mut self) -> Self {
        self.empty = Empty::Absent;
        self
    }

    /// An empty string is an explicit `null` (clears the stored value).
    pub fn empty_as_null(mut self) -> Self {
        self.empty = Empty::Null;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, Kind::List(_))
    }

    fn check(&self, raw: Option<&Decoded>) -> Result<Checked, Vec<String>> {
        let Some(raw) = raw else {
            return self.absent();
        };
        match raw {
            Decoded::Single(FormValue::Text(s)) if s.is_empty() => match self.empty {
                Empty::Absent => return self.absent(),
                Empty::Null => return Ok(Checked::Value(Value::Null)),
                Empty::Keep => {}
            },
            Decoded::Single(FormValue::File(f)) if f.is_empty_selection() => {
                return self.absent();
            }
            _ => {}
        }

        match (&self.kind, raw) {
            (Kind::List(inner), Decoded::List(values)) => self.check_list(inner, values),
            (Kind::List(inner), Decoded::Single(value)) => {
                self.check_list(inner, std::slice::from_ref(value))
            }
            (Kind::File { .. }, Decoded::Single(FormValue::File(f))) => check_file(&self.kind, f)
                .map(|f| Checked::Files(vec![f]))
                .map_err(|m| vec![m]),
            (Kind::File { .. }, _) => Err(vec!["Expected a file".into()]),
            (kind, Decoded::Single(FormValue::Text(s))) => self
                .check_scalar(kind, s)
                .map(Checked::Value)
                .map_err(|m| vec![m]),
            (_, Decoded::Single(FormValue::File(_))) => Err(vec!["Expected text".into()]),
            (_, Decoded::List(_)) => Err(vec!["Expected a single value".into()]),
        }
    }

    fn absent(&self) -> Result<Checked, Vec<String>> {
        match &self.presence {
            Presence::Optional => Ok(Checked::Omitted),
            Presence::Default(v) => Ok(Checked::Value(v.clone())),
            Presence::Required => {
                let message = match (&self.kind, self.min) {
                    (Kind::Text | Kind::List(_), Some((_, msg))) => msg.to_string(),
                    _ => "Required".to_string(),
                };
                Err(vec![message])
            }
        }
    }

    fn check_scalar(&self, kind: &Kind, s: &str) -> Result<Value, String> {
        match kind {
            Kind::Text => {
                let len = s.chars().count();
                if let Some((min, msg)) = self.min {
                    if len < min {
                        return Err(msg.into());
                    }
                }
                if let Some((max, msg)) = self.max {
                    if len > max {
                        return Err(msg.into());
                    }
                }
                if let Some(msg) = self.email {
                    if !looks_like_email(s) {
                        return Err(msg.into());
                    }
                }
                Ok(Value::String(s.to_string()))
            }
            Kind::Integer => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| "Expected number".to_string()),
            Kind::Boolean { truthy } => Ok(Value::Bool(s == *truthy)),
            Kind::Choice(options) => {
                if options.contains(&s) {
                    Ok(Value::String(s.to_string()))
                } else {
                    let expected: Vec<String> =
                        options.iter().map(|o| format!("'{o}'")).collect();
                    Err(format!(
                        "Invalid enum value. Expected {}, received '{s}'",
                        expected.join(" | ")
                    ))
                }
            }
            Kind::Date => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .map_err(|_| "Invalid date".to_string()),
            Kind::File { .. } | Kind::List(_) => Err("Expected a single value".into()),
        }
    }

    fn check_list(&self, inner: &Kind, values: &[FormValue]) -> Result<Checked, Vec<String>> {
        let mut errors = Vec::new();
        let mut items = Vec::new();
        let mut files = Vec::new();

        for value in values {
            match (inner, value) {
                (Kind::File { .. }, FormValue::File(f)) => match check_file(inner, f) {
                    Ok(f) => files.push(f),
                    Err(m) => errors.push(m),
                },
                (Kind::File { .. }, FormValue::Text(_)) => errors.push("Expected a file".into()),
                (_, FormValue::Text(s)) => match self.check_item(inner, s) {
                    Ok(v) => items.push(v),
                    Err(m) => errors.push(m),
                },
                (_, FormValue::File(_)) => errors.push("Expected text".into()),
            }
        }

        let count = values.len();
        if let Some((min, msg)) = self.min {
            if count < min {
                errors.push(msg.into());
            }
        }
        if let Some((max, msg)) = self.max {
            if count > max {
                errors.push(msg.into());
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        if matches!(inner, Kind::File { .. }) {
            Ok(Checked::Files(files))
        } else {
            Ok(Checked::Value(Value::Array(items)))
        }
    }

    /// List items are checked by kind only; `min`/`max` belong to the list.
    fn check_item(&self, kind: &Kind, s: &str) -> Result<Value, String> {
        let item = Field::new(self.name, kind.clone());
        item.check_scalar(kind, s)
    }
}

fn check_file(kind: &Kind, file: &FileBlob) -> Result<FileBlob, String> {
    if let Kind::File { max_bytes, too_large } = kind {
        if file.size() > *max_bytes {
            return Err((*too_large).to_string());
        }
    }
    Ok(file.clone())
}

fn looks_like_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

enum Checked {
    Value(Value),
    Files(Vec<FileBlob>),
    Omitted,
}

/// A successfully validated submission.
#[derive(Debug, Clone)]
pub struct Validated<T> {
    pub input: T,
    files: BTreeMap<String, Vec<FileBlob>>,
}

impl<T> Validated<T> {
    pub fn file(&self, name: &str) -> Option<&FileBlob> {
        self.files.get(name).and_then(|f| f.first())
    }

    pub fn take_file(&mut self, name: &str) -> Option<FileBlob> {
        self.files
            .remove(name)
            .and_then(|files| files.into_iter().next())
    }

    pub fn files(&self, name: &str) -> &[FileBlob] {
        self.files.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn object(fields: impl IntoIterator<Item = Field>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    /// Names of the list-typed fields, read off the descriptors.
    pub fn array_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.is_list())
            .map(Field::name)
            .collect()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Decode and validate a raw submission.
    pub fn parse<T: DeserializeOwned>(
        &self,
        submission: &FormSubmission,
    ) -> Result<Validated<T>, FieldErrors> {
        let decoded = decode(submission, &self.array_fields());
        self.validate(&decoded)
    }

    pub fn validate<T: DeserializeOwned>(
        &self,
        decoded: &DecodedForm,
    ) -> Result<Validated<T>, FieldErrors> {
        let mut values = Map::new();
        let mut files = BTreeMap::new();
        let mut errors = FieldErrors::new();

        for field in &self.fields {
            match field.check(decoded.get(field.name)) {
                Ok(Checked::Value(v)) => {
                    values.insert(field.name.to_string(), v);
                }
                Ok(Checked::Files(f)) => {
                    files.insert(field.name.to_string(), f);
                }
                Ok(Checked::Omitted) => {}
                Err(messages) => {
                    for message in messages {
                        errors.add(field.name, message);
                    }
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let input = serde_json::from_value(Value::Object(values))
            .map_err(|e| FieldErrors::single("form", e.to_string()))?;
        Ok(Validated { input, files })
    }
}

/// Deserializer for `Option<Option<T>>` patch fields: a missing key stays
/// `None` (via `#[serde(default)]`), an explicit `null` becomes `Some(None)`.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
