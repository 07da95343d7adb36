use thiserror::Error;

use crate::domain::{BookId, ReaderId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Book not found: {0}")]
    BookNotFound(BookId),

    #[error("Reader not found: {0}")]
    ReaderNotFound(ReaderId),

    /// A reader name is already taken
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// The operation clashes with an active loan
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, AppError::Duplicate(_))
    }
}
