use thiserror::Error;
use crate::card::CardError;
use crate::database::DatabaseError;
use crate::query::QueryError;

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("IO/Terminal error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("{0}")]
    CardError(#[from] CardError),

    #[error("{0}")]
    QueryError(#[from] QueryError),

    #[error("Key binding error: {0}")]
    KeyBindingError(String),

    #[error("Editor error: {0}")]
    EditorError(String),

    #[error("Render error: {0}")]
    RenderError(String),
}
