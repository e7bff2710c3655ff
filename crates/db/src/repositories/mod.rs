use thiserror::Error;

pub mod call_buffer;

pub use call_buffer::{BufferedCall, CallBufferRepository, SqlCallBufferRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}
