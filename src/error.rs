use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A page fetch kept failing after every retry. Carries what was already
    /// ingested so the run can be reported as partial.
    #[error(
        "page fetch at offset {offset} failed after {attempts} attempts \
         ({records_fetched} records fetched before failure): {message}"
    )]
    TransientNetwork {
        offset: u64,
        attempts: u32,
        records_fetched: usize,
        message: String,
    },

    #[error("source request failed at offset {offset}: {message}")]
    Source { offset: u64, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("write to {table} failed for key {key}: {source}")]
    Persistence {
        table: &'static str,
        key: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{} reference table write(s) failed: {}", .0.len(), summarize(.0))]
    ReferenceWrites(Vec<PipelineError>),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn summarize(errors: &[PipelineError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl PipelineError {
    pub fn persistence(table: &'static str, key: impl Into<String>, source: rusqlite::Error) -> Self {
        PipelineError::Persistence {
            table,
            key: key.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
