use thiserror::Error;

use crate::catalog::submit::ValidationError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend URL not configured")]
    BackendNotConfigured,

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Submission(String),

    #[error("Access gate not configured")]
    AccessNotConfigured,

    #[error("Wrong secret")]
    WrongSecret,
}

pub type Result<T> = std::result::Result<T, AppError>;
