use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Compose error: {0}")]
    Compose(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<std::fmt::Error> for AppError {
    fn from(err: std::fmt::Error) -> Self {
        AppError::Compose(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
