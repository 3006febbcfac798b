//! SQLite-backed tournament header plus append-only round journal.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    core::engine::{PairingEngine, PairingState},
    op::{ROUND_FORMAT_VERSION, StoredRound, StoredRoundEnvelope},
    types::{PlayerId, RoundSeq},
};

use super::{PersistError, PersistResult, RoundSink};

const HEADER_FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct HeaderEnvelope {
    format_version: u16,
    roster: Vec<PlayerId>,
    arrangement: Vec<PlayerId>,
}

/// SQLite implementation of [`crate::persist::RoundSink`].
pub struct SqliteRoundSink {
    conn: Connection,
}

impl SqliteRoundSink {
    /// Opens or creates a SQLite-backed sink at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory SQLite sink.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Rebuilds the engine from the header and every journaled round.
    ///
    /// Uses strict reconstruction: a journal whose matches only partly
    /// cover some round is reported as
    /// [`crate::core::engine::PairingError::InconsistentHistory`].
    pub fn load_engine(&self) -> PersistResult<PairingEngine> {
        let state = self
            .load_state()?
            .ok_or_else(|| PersistError::Message("no tournament header".to_string()))?;
        Ok(PairingEngine::from_state(state)?)
    }

    /// Loads the persisted state, or `None` for an empty database.
    pub fn load_state(&self) -> PersistResult<Option<PairingState>> {
        let Some(header) = self.load_header()? else {
            return Ok(None);
        };

        let mut played = Vec::new();
        for stored in self.load_rounds_after(0)? {
            played.extend(stored.round.iter().copied());
        }
        played.sort_unstable();
        played.dedup();

        Ok(Some(PairingState {
            roster: header.roster,
            arrangement: header.arrangement,
            played,
        }))
    }

    /// Loads rounds strictly after `seq`.
    pub fn load_rounds_after(&self, seq: RoundSeq) -> PersistResult<Vec<StoredRound>> {
        let mut stmt = self
            .conn
            .prepare("SELECT seq, ts_ms, payload FROM rounds WHERE seq > ?1 ORDER BY seq ASC")?;

        let rows = stmt.query_map(params![seq as i64], |row| {
            let seq: i64 = row.get(0)?;
            let ts_ms: i64 = row.get(1)?;
            let payload: Vec<u8> = row.get(2)?;
            let mut stored = decode_round_payload(&payload).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    payload.len(),
                    rusqlite::types::Type::Blob,
                    Box::new(std::io::Error::other(err)),
                )
            })?;
            stored.seq = seq as RoundSeq;
            stored.ts_ms = ts_ms as u64;
            Ok(stored)
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Returns the latest sequence persisted in the rounds table.
    pub fn latest_seq(&self) -> PersistResult<RoundSeq> {
        let seq: Option<i64> = self
            .conn
            .query_row("SELECT MAX(seq) FROM rounds", [], |row| row.get(0))
            .optional()?
            .flatten();
        Ok(seq.unwrap_or(0) as RoundSeq)
    }

    fn load_header(&self) -> PersistResult<Option<HeaderEnvelope>> {
        let payload: Option<Vec<u8>> = self
            .conn
            .query_row("SELECT payload FROM tournament WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let env: HeaderEnvelope = serde_json::from_slice(&payload)?;
        if env.format_version != HEADER_FORMAT_VERSION {
            return Err(PersistError::Message(
                "unsupported tournament header format".to_string(),
            ));
        }
        Ok(Some(env))
    }
}

impl RoundSink for SqliteRoundSink {
    fn append_rounds(&mut self, rounds: &[StoredRound]) -> PersistResult<RoundSeq> {
        if rounds.is_empty() {
            return self.latest_seq();
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO rounds(seq, ts_ms, kind, payload) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for stored in rounds {
                let payload = serde_json::to_vec(&StoredRoundEnvelope::new(stored.clone()))?;
                stmt.execute(params![
                    stored.seq as i64,
                    stored.ts_ms as i64,
                    stored.selection.kind(),
                    payload,
                ])?;
            }
        }
        tx.commit()?;

        let last = rounds.last().map(|r| r.seq).unwrap_or(0);
        debug!(count = rounds.len(), last_seq = last, "appended rounds");
        Ok(last)
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }

    fn write_header(&mut self, state: &PairingState) -> PersistResult<()> {
        if let Some(existing) = self.load_header()? {
            if existing.roster == state.roster && existing.arrangement == state.arrangement {
                return Ok(());
            }
            return Err(PersistError::Message(
                "database already holds a different tournament".to_string(),
            ));
        }

        let env = HeaderEnvelope {
            format_version: HEADER_FORMAT_VERSION,
            roster: state.roster.clone(),
            arrangement: state.arrangement.clone(),
        };
        let payload = serde_json::to_vec(&env)?;
        self.conn.execute(
            "INSERT INTO tournament(id, ts_ms, payload) VALUES (1, ?1, ?2)",
            params![now_ms() as i64, payload],
        )?;
        Ok(())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn decode_round_payload(payload: &[u8]) -> Result<StoredRound, String> {
    let envelope = serde_json::from_slice::<StoredRoundEnvelope>(payload)
        .map_err(|e| format!("round payload decode failed: {e}"))?;
    if envelope.format_version != ROUND_FORMAT_VERSION {
        return Err(format!(
            "unsupported round format version: {}",
            envelope.format_version
        ));
    }
    Ok(envelope.stored)
}
