use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::Serialize;

use crate::{CreateContactRequest, DirectoryError, UpdateContactRequest};

const PHONE_PATTERN: &str = r"^\(\d{2}\) \d{4,5}-\d{4}$";
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

const NAME_MESSAGE: &str = "name MUST be non-empty";
const EMAIL_MESSAGE: &str = "email MUST be a valid email address";
const PHONE_MESSAGE: &str =
    "phone MUST match (DD) NNNNN-NNNN or (DD) NNNN-NNNN, for example (11) 91234-5678";

#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

/// Every field-level violation found in one request, in field order.
#[derive(Debug, Clone, Default, Serialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct ValidationErrors {
    violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: &str) {
        self.violations.push(FieldViolation { field, message: message.to_string() });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    #[must_use]
    pub fn fields(&self) -> Vec<&'static str> {
        self.violations.iter().map(|violation| violation.field).collect()
    }

    /// # Errors
    /// Returns [`DirectoryError::Validation`] when at least one violation was recorded.
    pub fn into_result(self) -> Result<(), DirectoryError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DirectoryError::Validation(self))
        }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let joined = self
            .violations
            .iter()
            .map(|violation| violation.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

fn phone_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(PHONE_PATTERN).unwrap_or_else(|err| panic!("invalid phone pattern: {err}"))
    })
}

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(EMAIL_PATTERN).unwrap_or_else(|err| panic!("invalid email pattern: {err}"))
    })
}

#[must_use]
pub fn is_valid_phone(value: &str) -> bool {
    phone_regex().is_match(value)
}

#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    email_regex().is_match(value)
}

fn is_valid_name(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Check every field of a create request and collect all violations.
#[must_use]
pub fn validate_create(request: &CreateContactRequest) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    if !is_valid_name(&request.name) {
        errors.push("name", NAME_MESSAGE);
    }
    if !is_valid_email(&request.email) {
        errors.push("email", EMAIL_MESSAGE);
    }
    if !is_valid_phone(&request.phone) {
        errors.push("phone", PHONE_MESSAGE);
    }
    errors
}

/// Check only the fields an update request sets; kept fields are never inspected.
#[must_use]
pub fn validate_update(request: &UpdateContactRequest) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    if request.name.as_set().is_some_and(|name| !is_valid_name(name)) {
        errors.push("name", NAME_MESSAGE);
    }
    if request.email.as_set().is_some_and(|email| !is_valid_email(email)) {
        errors.push("email", EMAIL_MESSAGE);
    }
    if request.phone.as_set().is_some_and(|phone| !is_valid_phone(phone)) {
        errors.push("phone", PHONE_MESSAGE);
    }
    errors
}
