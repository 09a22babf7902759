use std::time::Duration;

/// Why a submission failed validation. Raised before any store access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid operation: {0}")]
    UnknownOperation(String),

    #[error(
        "Invalid stage: {} for operation: {operation}",
        .stage.as_deref().unwrap_or("none")
    )]
    InvalidStage {
        operation: String,
        stage: Option<String>,
    },

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
}

/// A submission the engine refused to apply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Invalid operation or data.")]
    InvalidOperationData,
}

/// Failures talking to the backing spreadsheet.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("record store authorization failed: {0}")]
    Unauthorized(String),

    #[error("record store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed record store response: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum UpsertError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum DropdownError {
    #[error("No data found")]
    EmptyReferenceData,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    #[error("Missing data in the scanned QR code: {0}")]
    MissingKey(&'static str),

    #[error("Please fill out all fields: QR ID, Box Type, and Operator Name.")]
    EmptyField,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
