use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReallocationError {
    #[error("Category row {row}: category name is empty")]
    EmptyCategoryName { row: usize },

    #[error("Category row {row}: duplicate category '{key}' after normalization")]
    DuplicateCategory { row: usize, key: String },

    #[error("Category row {row}: budget '{value}' for category '{category}' is not a finite, non-negative amount")]
    InvalidBudget {
        row: usize,
        category: String,
        value: String,
    },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("External classifier failed: {0}")]
    Classifier(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReallocationError>;
