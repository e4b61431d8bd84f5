use thiserror::Error;

/// Violations of a table or field schema. Any of these aborts the whole run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("table '{table}' has no '{column}' column")]
    MissingColumn { table: String, column: String },

    #[error("table '{table}' row {row}: id '{value}' is not an integer")]
    InvalidKey {
        table: String,
        row: usize,
        value: String,
    },

    #[error("table '{table}' is not uniquely keyed: id {id} appears more than once")]
    DuplicateKey { table: String, id: i64 },

    #[error("field '{field}' of record {id} is malformed: {reason}")]
    MalformedField {
        field: String,
        id: i64,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Schema violation: {0}")]
    Schema(#[from] SchemaError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
