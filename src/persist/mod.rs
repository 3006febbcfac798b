pub mod sqlite;

use crate::{
    core::engine::{PairingError, PairingState},
    op::StoredRound,
    types::RoundSeq,
};

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("pairing: {0}")]
    Pairing(#[from] PairingError),
    #[error("{0}")]
    Message(String),
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Durable destination for selected rounds.
pub trait RoundSink: Send {
    fn append_rounds(&mut self, rounds: &[StoredRound]) -> PersistResult<RoundSeq>;
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
    /// Records roster and arrangement. Written once, before any round.
    fn write_header(&mut self, _state: &PairingState) -> PersistResult<()> {
        Ok(())
    }
}
