use thiserror::Error;

use crate::session::GameState;

/// Unified error type for sequence generation, session control and storage.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("session is {actual}, expected {expected}")]
    InvalidState {
        expected: GameState,
        actual: GameState,
    },
    #[error("sequence has {actual} steps, settings ask for {expected}")]
    SequenceLength { expected: usize, actual: usize },
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
