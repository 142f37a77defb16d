use thiserror::Error;

/// Input or record shape rejected before anything is persisted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Field must not be blank: {0}")]
    Blank(&'static str),

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Unsupported schema version {found} (expected {expected})")]
    SchemaVersion { found: u32, expected: u32 },

    #[error("Value out of range for {field}: {value}")]
    OutOfRange { field: &'static str, value: String },

    #[error("Malformed record: {0}")]
    Malformed(String),
}
