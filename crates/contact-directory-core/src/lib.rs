use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::Ulid;

mod service;
mod store;
mod validation;

pub use service::ContactDirectoryService;
pub use store::{MemoryStore, RecordStore, StagedWrite};
pub use validation::{
    is_valid_email, is_valid_phone, validate_create, validate_update, FieldViolation,
    ValidationErrors,
};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum DirectoryError {
    #[error("validation error: {0}")]
    Validation(ValidationErrors),
    #[error("contact not found: {id}")]
    NotFound { id: String },
    #[error("storage error: {0}")]
    Storage(String),
}

impl DirectoryError {
    pub fn not_found(id: impl Display) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    /// Wrap a store failure, keeping the full context chain in the message.
    #[must_use]
    pub fn storage(err: &anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct ContactId(pub Ulid);

impl ContactId {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ContactId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ContactId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContactId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Resolve a caller-supplied id. A string that is not a valid id cannot address any
/// stored contact, so it is reported as not found.
///
/// # Errors
/// Returns [`DirectoryError::NotFound`] when `raw` does not decode as a [`ContactId`].
pub fn parse_contact_id(raw: &str) -> DirectoryResult<ContactId> {
    raw.parse().map_err(|_| DirectoryError::not_found(raw))
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ContactRecord {
    pub id: ContactId,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl ContactRecord {
    /// Literal prefix match on `(code)`; the code is neither normalized nor range-checked.
    #[must_use]
    pub fn has_area_code(&self, code: &str) -> bool {
        self.phone.starts_with(&area_code_prefix(code))
    }
}

#[must_use]
pub fn area_code_prefix(code: &str) -> String {
    format!("({code})")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct CreateContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct UpdateContactRequest {
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub name: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub email: FieldUpdate<String>,
    #[serde(default, skip_serializing_if = "FieldUpdate::is_keep")]
    pub phone: FieldUpdate<String>,
}

impl UpdateContactRequest {
    /// Overwrite the fields this request sets and keep the rest of `record`.
    pub fn apply_to(self, record: &mut ContactRecord) {
        self.name.apply(&mut record.name);
        self.email.apply(&mut record.email);
        self.phone.apply(&mut record.phone);
    }
}

/// One field of a partial update.
///
/// On the wire an absent key and an explicit `null` both decode to [`FieldUpdate::Keep`];
/// any value, including the empty string, decodes to [`FieldUpdate::Set`].
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum FieldUpdate<T> {
    #[default]
    Keep,
    Set(T),
}

impl<T> FieldUpdate<T> {
    #[must_use]
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    #[must_use]
    pub fn as_set(&self) -> Option<&T> {
        match self {
            Self::Keep => None,
            Self::Set(value) => Some(value),
        }
    }

    pub fn apply(self, current: &mut T) {
        if let Self::Set(value) = self {
            *current = value;
        }
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Keep, Self::Set)
    }
}

impl<T: Serialize> Serialize for FieldUpdate<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Keep => serializer.serialize_none(),
            Self::Set(value) => serializer.serialize_some(value),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldUpdate<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_record(phone: &str) -> ContactRecord {
        ContactRecord {
            id: ContactId::new(),
            name: "Wally West".to_string(),
            email: "wally.west@example.com".to_string(),
            phone: phone.to_string(),
        }
    }

    #[test]
    fn contact_id_round_trips_through_display_and_parse() {
        let id = ContactId::new();
        let parsed = parse_contact_id(&id.to_string());
        assert_eq!(parsed, Ok(id));
    }

    #[test]
    fn malformed_contact_id_is_reported_as_not_found() {
        let err = parse_contact_id("not-a-contact-id");
        assert_eq!(err, Err(DirectoryError::NotFound { id: "not-a-contact-id".to_string() }));
    }

    #[test]
    fn area_code_match_is_a_literal_prefix() {
        let record = fixture_record("(11) 91234-5678");
        assert!(record.has_area_code("11"));
        assert!(!record.has_area_code("1"));
        assert!(!record.has_area_code("011"));
        assert!(!record.has_area_code("21"));
    }

    #[test]
    fn update_request_distinguishes_absent_null_and_empty() {
        let request: UpdateContactRequest =
            match serde_json::from_str(r#"{"name": null, "email": ""}"#) {
                Ok(request) => request,
                Err(err) => panic!("update request should decode: {err}"),
            };
        assert_eq!(request.name, FieldUpdate::Keep);
        assert_eq!(request.email, FieldUpdate::Set(String::new()));
        assert_eq!(request.phone, FieldUpdate::Keep);
    }

    #[test]
    fn update_request_serializes_only_set_fields() {
        let request = UpdateContactRequest {
            email: FieldUpdate::Set("c@d.com".to_string()),
            ..UpdateContactRequest::default()
        };
        let json = match serde_json::to_value(&request) {
            Ok(json) => json,
            Err(err) => panic!("update request should encode: {err}"),
        };
        assert_eq!(json, serde_json::json!({ "email": "c@d.com" }));
    }

    #[test]
    fn apply_to_keeps_unset_fields() {
        let mut record = fixture_record("(11) 91234-5678");
        let before = record.clone();
        UpdateContactRequest {
            phone: FieldUpdate::Set("(21) 98765-4321".to_string()),
            ..UpdateContactRequest::default()
        }
        .apply_to(&mut record);

        assert_eq!(record.id, before.id);
        assert_eq!(record.name, before.name);
        assert_eq!(record.email, before.email);
        assert_eq!(record.phone, "(21) 98765-4321");
    }

    #[test]
    fn create_request_defaults_missing_fields_to_empty() {
        let request: CreateContactRequest = match serde_json::from_str(r#"{"name": "Wally"}"#) {
            Ok(request) => request,
            Err(err) => panic!("create request should decode: {err}"),
        };
        assert_eq!(request.email, "");
        assert_eq!(request.phone, "");
    }

    #[test]
    fn contact_record_serializes_with_plain_field_names() {
        let record = fixture_record("(11) 91234-5678");
        let json = match serde_json::to_value(&record) {
            Ok(json) => json,
            Err(err) => panic!("record should encode: {err}"),
        };
        assert_eq!(json.get("id").and_then(serde_json::Value::as_str), Some(record.id.to_string().as_str()));
        assert_eq!(json.get("phone").and_then(serde_json::Value::as_str), Some("(11) 91234-5678"));
    }
}
