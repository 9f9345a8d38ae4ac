use thiserror::Error;

/// Why an inbound bus payload was rejected before any side effect happened.
///
/// Rejected events are dropped; the variant only decides what gets logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Payload is not JSON, or a field has the wrong JSON type
    #[error("payload could not be decoded: {0}")]
    Malformed(String),
    /// A required field is absent, null, or blank
    #[error("required field '{field}' is missing or empty")]
    MissingField { field: &'static str },
    /// `content_encoding` names an encoding the worker cannot decode
    #[error("unsupported content encoding '{0}'")]
    UnsupportedEncoding(String),
}

impl ValidationError {
    /// Machine-readable code for structured log fields.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::Malformed(_) => codes::MALFORMED_PAYLOAD,
            ValidationError::MissingField { .. } => codes::MISSING_FIELD,
            ValidationError::UnsupportedEncoding(_) => codes::UNSUPPORTED_ENCODING,
        }
    }
}

/// Error codes used in rejection logs
pub mod codes {
    pub const MALFORMED_PAYLOAD: &str = "malformed_payload";
    pub const MISSING_FIELD: &str = "missing_field";
    pub const UNSUPPORTED_ENCODING: &str = "unsupported_encoding";
}
