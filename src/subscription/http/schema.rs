//! Payload validation.
//!
//! Decoded JSON is checked against the shape a query expects before it reaches the
//! cache. Extra fields are ignored; required fields must be present with the right
//! type.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// The kind of a JSON value, used in validation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl JsonKind {
    /// Returns the kind of `value`.
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// A decoded payload did not match the expected shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("expected object, received {received}")]
    NotAnObject { received: JsonKind },

    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("type mismatch at `{field}`: expected {expected}, received {received}")]
    TypeMismatch {
        field: &'static str,
        expected: JsonKind,
        received: JsonKind,
    },
}

/// A type that can be validated out of a decoded JSON value.
pub trait Schema: Sized {
    /// Checks `raw` and builds the typed value from it.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] describing the first mismatch found.
    fn validate(raw: &Value) -> Result<Self, ValidationError>;
}

/// Returns `raw` as an object.
///
/// # Errors
///
/// Returns [`ValidationError::NotAnObject`] for any other JSON kind.
pub fn object(raw: &Value) -> Result<&Map<String, Value>, ValidationError> {
    raw.as_object().ok_or(ValidationError::NotAnObject {
        received: JsonKind::of(raw),
    })
}

/// Returns the string value of the required field `field`.
///
/// # Errors
///
/// Returns [`ValidationError::MissingField`] if the field is absent, or
/// [`ValidationError::TypeMismatch`] if it is not a string.
pub fn required_str<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    let value = obj.get(field).ok_or(ValidationError::MissingField { field })?;
    value.as_str().ok_or(ValidationError::TypeMismatch {
        field,
        expected: JsonKind::String,
        received: JsonKind::of(value),
    })
}

/// The hello resource: `{ "message": <string> }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloPayload {
    pub message: String,
}

impl Schema for HelloPayload {
    fn validate(raw: &Value) -> Result<Self, ValidationError> {
        let obj = object(raw)?;
        let message = required_str(obj, "message")?;
        Ok(Self {
            message: message.to_string(),
        })
    }
}

/// Validates a decoded hello response.
///
/// # Errors
///
/// Returns a [`ValidationError`] if `raw` is not an object with a string `message`.
pub fn validate(raw: &Value) -> Result<HelloPayload, ValidationError> {
    HelloPayload::validate(raw)
}
