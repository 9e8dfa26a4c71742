use std::path::PathBuf;

use thiserror::Error;

use crate::schema::ValueKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store file not found: {0}")]
    NotFound(PathBuf),

    #[error("store file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("entered password is incorrect")]
    IncorrectPassword,

    #[error("unknown record key: {0}")]
    UnknownKey(String),

    #[error("value for {key} has the wrong type: expected {expected}, got {found}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: &'static str,
    },

    #[error("value cannot be serialised: {0}")]
    SerializationFailure(#[from] serde_json::Error),

    #[error("authentication failed (wrong key or corrupted data)")]
    AuthenticationFailure,

    #[error("store is closed")]
    StoreClosed,

    #[error("invalid password policy: {0}")]
    InvalidPasswordPolicy(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
