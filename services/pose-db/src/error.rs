//! Error types for the pose access layer.

use thiserror::Error;

/// A record or query parameter failed schema/type constraints
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid identifier for {field}: {value:?}")]
    InvalidIdentifier { field: String, value: String },

    #[error("Wrong arity for {field}: expected {expected}, got {actual}")]
    Arity {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Non-finite value for {field}")]
    NonFinite { field: String },

    #[error("Out-of-range value for {field}: {message}")]
    OutOfRange { field: String, message: String },

    #[error("Unknown {kind} value: {value:?}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Failed to decode record: {0}")]
    Decode(String),
}

/// A stored record could not be flattened into a table row
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Stored record is missing field {field}")]
    MissingField { field: String },

    #[error("Stored field {field} has unexpected type, expected {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    #[error("Stored field {field} has wrong arity: expected {expected}, got {actual}")]
    Arity {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Stored field {field} holds an unrecognised value: {value:?}")]
    InvalidValue { field: String, value: String },

    #[error("Stored time {naive} for {field} does not exist in time zone {time_zone}")]
    NonexistentLocalTime {
        field: String,
        naive: String,
        time_zone: String,
    },
}

/// Failures reported by the document store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Document store driver error: {0}")]
    Driver(#[from] mongodb::error::Error),

    #[error("Failed to encode document: {0}")]
    Encode(#[from] bson::ser::Error),
}

/// Top-level error for pose handle operations
#[derive(Error, Debug)]
pub enum PoseDbError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to load configuration: {0}")]
    Config(String),

    #[error("Pose handle has been cleaned up")]
    Closed,
}

pub type Result<T, E = PoseDbError> = std::result::Result<T, E>;
