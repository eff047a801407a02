use crate::constants::*;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(USERNAME_REGEX).expect("valid regex"));
static COLOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(COLOR_REGEX).expect("valid regex"));
static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(SLUG_REGEX).expect("valid regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex")
});

/// Validation messages keyed by field name, serialized as `{"field": ["msg"]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    /// Records the outcome of a field check.
    pub fn check(&mut self, field: &str, outcome: Result<(), String>) {
        if let Err(message) = outcome {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Required, non-blank, at most `max` characters. Returns the trimmed value.
pub fn required_text(value: Option<&str>, max: usize) -> Result<String, String> {
    let value = value.ok_or_else(|| FIELD_REQUIRED.to_string())?.trim();
    if value.is_empty() {
        return Err(FIELD_BLANK.to_string());
    }
    max_length(value, max)?;
    Ok(value.to_string())
}

pub fn max_length(value: &str, max: usize) -> Result<(), String> {
    if value.chars().count() > max {
        return Err(format!("Ensure this field has no more than {max} characters."));
    }
    Ok(())
}

pub fn in_range(value: i64, min: i64, max: i64) -> Result<(), String> {
    if value < min {
        return Err(format!("Ensure this value is greater than or equal to {min}."));
    }
    if value > max {
        return Err(format!("Ensure this value is less than or equal to {max}."));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), String> {
    if username == RESERVED_USERNAME {
        return Err(format!("Username '{RESERVED_USERNAME}' is reserved."));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_string(),
        );
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if !EMAIL_RE.is_match(email) {
        return Err("Enter a valid email address.".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    let length = password.chars().count();
    if length < MIN_PASSWORD {
        return Err(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD} characters."
        ));
    }
    if length > MAX_PASSWORD {
        return Err(format!("Ensure this field has no more than {MAX_PASSWORD} characters."));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err("This password is entirely numeric.".to_string());
    }
    Ok(())
}

pub fn validate_color(color: &str) -> Result<(), String> {
    if !COLOR_RE.is_match(color) {
        return Err("Enter a hex color like #123ABC.".to_string());
    }
    Ok(())
}

pub fn validate_slug(slug: &str) -> Result<(), String> {
    max_length(slug, MAX_TAG_SLUG)?;
    if !SLUG_RE.is_match(slug) {
        return Err(
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.".to_string(),
        );
    }
    Ok(())
}

/// Integer from a JSON number or a numeric string such as `"20"`.
pub fn integer(value: &Value) -> Result<i64, String> {
    match value {
        Value::Null => Err(FIELD_REQUIRED.to_string()),
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| INVALID_INTEGER.to_string()),
        Value::String(text) => text.trim().parse().map_err(|_| INVALID_INTEGER.to_string()),
        _ => Err(INVALID_INTEGER.to_string()),
    }
}

/// Values that occur more than once, in order of their second occurrence.
pub fn duplicates<T: Eq + Hash + Clone>(values: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    values
        .iter()
        .filter(|value| !seen.insert(*value) && reported.insert(*value))
        .cloned()
        .collect()
}
