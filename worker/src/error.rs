use thiserror::Error;

/// Document store failures (context and transcript tables)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Pub/sub and key-value cache failures
#[derive(Debug, Error)]
pub enum BusError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Agent-configuration lookup failures. Every variant means "no config".
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("config service returned HTTP {0}")]
    Status(u16),
    #[error("config service response has no usable config object")]
    NotConfigured,
}

/// Generative backend failures. Every variant is replaced by the fallback text.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("model backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model backend returned no message content")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),
    #[error("DOCX parsing failed: {0}")]
    DocxParsing(String),
    #[error("extractor aborted: {0}")]
    Aborted(String),
}

/// Failures that end processing of one file upload before its context record
/// is written.
#[derive(Debug, Error)]
pub enum FileIngestError {
    #[error("content is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("could not stage upload on disk: {0}")]
    Staging(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fatal errors; the process exits non-zero when one of these surfaces.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("redis connection failed: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("subscription failed: {0}")]
    Bus(#[from] BusError),
    #[error("HTTP client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("a consumption loop stopped; its subscription ended")]
    LoopStopped,
}
