use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to save progress for '{workflow_id}': {reason}")]
    ProgressWrite { workflow_id: String, reason: String },

    #[error("Advance hook failed ({from} -> {to}): {reason}")]
    AdvanceHook {
        from: usize,
        to: usize,
        reason: String,
    },

    #[error("Page initializer failed: {0}")]
    Init(String),

    #[error("Page set '{0}' has no pages")]
    EmptyPageSet(String),

    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

pub type Result<T> = std::result::Result<T, Error>;
