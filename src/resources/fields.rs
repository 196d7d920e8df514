//! Field-by-field reading of a JSON object body.
//!
//! Each accessor records a [`FieldError`] instead of failing fast, so a
//! response can list every bad field at once.

use std::ops::RangeInclusive;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::FieldError;

lazy_static::lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();

    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").unwrap();

    static ref USERNAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_.\-]{3,30}$").unwrap();
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_REGEX.is_match(email)
}

pub fn is_valid_username(username: &str) -> bool {
    USERNAME_REGEX.is_match(username)
}

/// Absolute `http`/`https` URL with a host.
pub fn is_valid_url(raw: &str) -> bool {
    if raw.contains(char::is_whitespace) {
        return false;
    }
    match url::Url::parse(raw) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}

pub struct Fields<'a> {
    map: &'a Map<String, Value>,
    errors: Vec<FieldError>,
}

impl<'a> Fields<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self {
            map,
            errors: Vec::new(),
        }
    }

    /// The field's value, treating JSON `null` as absent.
    fn raw(&self, name: &str) -> Option<&'a Value> {
        self.map.get(name).filter(|v| !v.is_null())
    }

    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn has_error(&self, name: &str) -> bool {
        self.errors.iter().any(|e| e.field == name)
    }

    pub fn finish<T>(self, value: T) -> Result<T, Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }

    fn text(&mut self, name: &str, required: bool, max: usize) -> Option<String> {
        let value = match self.raw(name) {
            Some(v) => v,
            None => {
                if required {
                    self.push(FieldError::required(name));
                }
                return None;
            }
        };

        let Some(s) = value.as_str() else {
            self.push(FieldError::invalid(name, "Not a valid string."));
            return None;
        };

        let s = s.trim();
        if s.is_empty() {
            if required {
                self.push(FieldError::invalid(name, "This field may not be blank."));
            }
            return None;
        }
        if s.chars().count() > max {
            self.push(FieldError::invalid(
                name,
                format!("Ensure this field has no more than {} characters.", max),
            ));
            return None;
        }
        Some(s.to_string())
    }

    pub fn required_text(&mut self, name: &str, max: usize) -> Option<String> {
        self.text(name, true, max)
    }

    pub fn optional_text(&mut self, name: &str, max: usize) -> Option<String> {
        self.text(name, false, max)
    }

    /// Raw password: not trimmed, only length-checked.
    pub fn password(&mut self, name: &str, min: usize) -> Option<String> {
        match self.raw(name) {
            None => {
                self.push(FieldError::required(name));
                None
            }
            Some(Value::String(s)) if s.is_empty() => {
                self.push(FieldError::invalid(name, "This field may not be blank."));
                None
            }
            Some(Value::String(s)) if s.chars().count() < min => {
                self.push(FieldError::invalid(
                    name,
                    format!("Ensure this field has at least {} characters.", min),
                ));
                None
            }
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.push(FieldError::invalid(name, "Not a valid string."));
                None
            }
        }
    }

    pub fn flag(&mut self, name: &str) -> Option<bool> {
        match self.raw(name) {
            None => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => {
                self.push(FieldError::invalid(name, "Must be a valid boolean."));
                None
            }
        }
    }

    pub fn integer_in(&mut self, name: &str, range: RangeInclusive<i64>) -> Option<i64> {
        let value = self.raw(name)?;
        match value.as_i64() {
            Some(n) if range.contains(&n) => Some(n),
            Some(_) => {
                self.push(FieldError::invalid(
                    name,
                    format!(
                        "Ensure this value is between {} and {}.",
                        range.start(),
                        range.end()
                    ),
                ));
                None
            }
            None => {
                self.push(FieldError::invalid(name, "A valid integer is required."));
                None
            }
        }
    }

    pub fn non_negative_number(&mut self, name: &str) -> Option<f64> {
        let value = self.raw(name)?;
        match value.as_f64() {
            Some(n) if n.is_finite() && n >= 0.0 => Some(n),
            Some(_) => {
                self.push(FieldError::invalid(
                    name,
                    "Ensure this value is greater than or equal to 0.",
                ));
                None
            }
            None => {
                self.push(FieldError::invalid(name, "A valid number is required."));
                None
            }
        }
    }

    pub fn id(&mut self, name: &str, required: bool) -> Option<Uuid> {
        let raw = self.text(name, required, 64)?;
        match Uuid::parse_str(&raw) {
            Ok(id) => Some(id),
            Err(_) => {
                self.push(FieldError::invalid(name, "Must be a valid UUID."));
                None
            }
        }
    }

    pub fn date(&mut self, name: &str, required: bool) -> Option<NaiveDate> {
        let raw = self.text(name, required, 10)?;
        match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => {
                self.push(FieldError::invalid(
                    name,
                    "Date has wrong format. Use YYYY-MM-DD.",
                ));
                None
            }
        }
    }

    pub fn email(&mut self, name: &str, required: bool) -> Option<String> {
        let raw = self.text(name, required, 254)?;
        if is_valid_email(&raw) {
            Some(raw.to_lowercase())
        } else {
            self.push(FieldError::invalid(name, "Enter a valid email address."));
            None
        }
    }

    pub fn url(&mut self, name: &str, required: bool) -> Option<String> {
        let raw = self.text(name, required, 2048)?;
        if is_valid_url(&raw) {
            Some(raw)
        } else {
            self.push(FieldError::invalid(name, "Enter a valid URL."));
            None
        }
    }

    pub fn slug(&mut self, name: &str, required: bool) -> Option<String> {
        let raw = self.text(name, required, 100)?;
        if is_valid_slug(&raw) {
            Some(raw)
        } else {
            self.push(FieldError::invalid(
                name,
                "Slug must contain only lowercase letters, numbers, and hyphens",
            ));
            None
        }
    }

    pub fn string_list(&mut self, name: &str) -> Vec<String> {
        match self.raw(name) {
            None => Vec::new(),
            Some(Value::Array(items)) => {
                let strings: Option<Vec<String>> = items
                    .iter()
                    .map(|v| v.as_str().map(|s| s.trim().to_string()))
                    .collect();
                match strings {
                    Some(list) => list.into_iter().filter(|s| !s.is_empty()).collect(),
                    None => {
                        self.push(FieldError::invalid(name, "Expected a list of strings."));
                        Vec::new()
                    }
                }
            }
            Some(_) => {
                self.push(FieldError::invalid(name, "Expected a list of strings."));
                Vec::new()
            }
        }
    }

    pub fn object(&mut self, name: &str) -> Option<Map<String, Value>> {
        match self.raw(name) {
            None => None,
            Some(Value::Object(map)) => Some(map.clone()),
            Some(_) => {
                self.push(FieldError::invalid(name, "Expected a JSON object."));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_and_null_are_required_errors() {
        let body = map(json!({ "b": null }));
        let mut f = Fields::new(&body);
        assert!(f.required_text("a", 10).is_none());
        assert!(f.required_text("b", 10).is_none());
        let errors = f.finish(()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.error == "This field is required."));
    }

    #[test]
    fn test_blank_and_too_long_text() {
        let body = map(json!({ "a": "   ", "b": "abcdef" }));
        let mut f = Fields::new(&body);
        f.required_text("a", 10);
        f.required_text("b", 3);
        let errors = f.finish(()).unwrap_err();
        assert_eq!(errors[0].error, "This field may not be blank.");
        assert!(errors[1].error.contains("no more than 3"));
    }

    #[test]
    fn test_integer_range_and_type() {
        let body = map(json!({ "a": 150, "b": "x", "c": 40 }));
        let mut f = Fields::new(&body);
        assert!(f.integer_in("a", 0..=100).is_none());
        assert!(f.integer_in("b", 0..=100).is_none());
        assert_eq!(f.integer_in("c", 0..=100), Some(40));
        assert_eq!(f.finish(()).unwrap_err().len(), 2);
    }

    #[test]
    fn test_email_is_lowercased() {
        let body = map(json!({ "email": "Ada@Example.COM" }));
        let mut f = Fields::new(&body);
        assert_eq!(f.email("email", true).as_deref(), Some("ada@example.com"));
        assert!(f.finish(()).is_ok());
    }

    #[test]
    fn test_validators() {
        assert!(is_valid_slug("my-portfolio-2"));
        assert!(!is_valid_slug("My Portfolio"));
        assert!(!is_valid_slug("trailing-"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(is_valid_username("ada_l"));
        assert!(!is_valid_username("a"));
        assert!(is_valid_url("https://example.com/cv.pdf"));
        assert!(is_valid_url("http://localhost:8080/a?b=c#d"));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("https:///"));
        assert!(!is_valid_url("http://?"));
        assert!(!is_valid_url("https://#frag"));
        assert!(!is_valid_url("https://exa mple.com"));
        assert!(!is_valid_url("example.com"));
    }

    #[test]
    fn test_string_list_rejects_mixed_items() {
        let body = map(json!({ "ok": ["rust", " axum "], "bad": ["rust", 3] }));
        let mut f = Fields::new(&body);
        assert_eq!(f.string_list("ok"), vec!["rust", "axum"]);
        assert!(f.string_list("bad").is_empty());
        assert!(f.has_error("bad"));
    }
}
