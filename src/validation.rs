//! Field validation shared by the lead store, the filter translator and the
//! auth endpoints.
//!
//! Validators return `Result<(), String>` with a human-readable message;
//! callers collect them per field with [`FieldErrors`].

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

lazy_static! {
    /// Loose address check: word characters with `.`/`-` separators and a 2-3 char TLD
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$"
    ).unwrap();
}

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_PHONE_LEN: usize = 20;
pub const MAX_COMPANY_LEN: usize = 200;
pub const MAX_PLACE_LEN: usize = 100;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Per-field validation failures, keyed by field (or query parameter) name.
#[derive(Debug, Clone, Default, PartialEq, thiserror::Error)]
#[error("{}", self.summary())]
pub struct FieldErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single failing field
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Record the outcome of a validator under `field`
    pub fn check(&mut self, field: &str, result: Result<(), String>) -> &mut Self {
        if let Err(message) = result {
            self.add(field, message);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    pub fn into_map(self) -> BTreeMap<String, Vec<String>> {
        self.errors
    }

    /// Return Ok(()) if nothing was recorded
    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn summary(&self) -> String {
        if self.errors.len() == 1 {
            self.errors
                .values()
                .next()
                .and_then(|v| v.first())
                .cloned()
                .unwrap_or_else(|| "Validation failed".to_string())
        } else {
            format!("Validation failed for {} fields", self.errors.len())
        }
    }
}

/// Validate a required, length-bounded text field
pub fn validate_required(value: &str, label: &str, max: usize) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{} is required", label));
    }
    validate_max_len(value, label, max)
}

/// Validate an optional text field's length
pub fn validate_max_len(value: &str, label: &str, max: usize) -> Result<(), String> {
    if value.chars().count() > max {
        return Err(format!("{} cannot exceed {} characters", label, max));
    }
    Ok(())
}

/// Validate an email address (expects it already trimmed and lowercased)
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Please enter a valid email".to_string());
    }

    Ok(())
}

pub fn validate_score(score: i64) -> Result<(), String> {
    if score < 0 {
        return Err("Score must be at least 0".to_string());
    }
    if score > 100 {
        return Err("Score cannot exceed 100".to_string());
    }
    Ok(())
}

pub fn validate_lead_value(value: f64) -> Result<(), String> {
    if !value.is_finite() {
        return Err("Lead value must be a finite number".to_string());
    }
    if value < 0.0 {
        return Err("Lead value cannot be negative".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(format!(
            "Password cannot exceed {} characters",
            MAX_PASSWORD_LEN
        ));
    }
    Ok(())
}

/// Trim and lowercase an email before validation and storage
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trim an optional text field; blank becomes `None`
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("jane@example.com").is_ok());
        assert!(validate_email("jane.doe@mail.example.org").is_ok());
        assert!(validate_email("j-d@ex-ample.co").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("jane@example").is_err());
        assert!(validate_email("jane@example.comms").is_err()); // 5 char tld
        assert!(validate_email("jane doe@example.com").is_err());
    }

    #[test]
    fn test_validate_required() {
        assert!(validate_required("Jane", "First name", MAX_NAME_LEN).is_ok());
        assert!(validate_required("", "First name", MAX_NAME_LEN).is_err());
        assert!(validate_required(&"x".repeat(101), "First name", MAX_NAME_LEN).is_err());
        assert!(validate_required(&"x".repeat(100), "First name", MAX_NAME_LEN).is_ok());
    }

    #[test]
    fn test_validate_score() {
        assert!(validate_score(0).is_ok());
        assert!(validate_score(100).is_ok());
        assert!(validate_score(-1).is_err());
        assert!(validate_score(101).is_err());
    }

    #[test]
    fn test_validate_lead_value() {
        assert!(validate_lead_value(0.0).is_ok());
        assert!(validate_lead_value(1250.5).is_ok());
        assert!(validate_lead_value(-0.01).is_err());
        assert!(validate_lead_value(f64::NAN).is_err());
        assert!(validate_lead_value(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("Test@1234").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_normalizers() {
        assert_eq!(normalize_email("  Jane@Example.COM "), "jane@example.com");
        assert_eq!(normalize_optional(Some("  ".to_string())), None);
        assert_eq!(
            normalize_optional(Some(" Acme ".to_string())),
            Some("Acme".to_string())
        );
        assert_eq!(normalize_optional(None), None);
    }

    #[test]
    fn test_field_errors_builder() {
        let mut errors = FieldErrors::new();
        errors.add("first_name", "First name is required");
        errors.add("email", "Please enter a valid email");
        errors.add("first_name", "First name is too short");
        errors.check("score", Ok(()));

        assert!(!errors.is_empty());
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("first_name").unwrap().len(), 2);
        assert!(errors.get("score").is_none());
        assert_eq!(errors.to_string(), "Validation failed for 2 fields");
        assert!(errors.finish().is_err());
    }

    #[test]
    fn test_field_errors_single_message() {
        let errors = FieldErrors::single("score", "Score cannot exceed 100");
        assert_eq!(errors.to_string(), "Score cannot exceed 100");
        assert!(FieldErrors::new().finish().is_ok());
    }
}
