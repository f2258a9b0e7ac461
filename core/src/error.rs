use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Unknown leak preset '{name}'")]
    UnknownPreset { name: String },

    #[error("Share link '{key}' not found or expired")]
    LinkNotFound { key: String },

    #[error("Scenario payload is {size} bytes, cap is {cap}")]
    PayloadTooLarge { size: usize, cap: usize },

    #[error("Could not mint a unique share key after {attempts} attempts")]
    KeyExhausted { attempts: u32 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LabError {
    /// Shorthand for the fail-fast validation variant.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        LabError::InvalidInput { field: field.into(), reason: reason.into() }
    }
}

pub type LabResult<T> = Result<T, LabError>;
