//! Round-selection journal records and persistence wrappers.

use serde::{Deserialize, Serialize};

use crate::{
    pairing::{Match, Round},
    types::RoundSeq,
};

/// Version number for serialized [`StoredRoundEnvelope`] payloads.
pub const ROUND_FORMAT_VERSION: u16 = 1;

/// How a round was chosen from the remaining schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    /// Taken from the end of the remaining schedule.
    FirstRound,
    /// Requested through a specific pairing.
    Anchor {
        /// Pairing the caller asked for.
        anchor: Match,
    },
    /// Found by scanning a ranking for the first unplayed pairing.
    Ranking {
        /// Pairing the scan settled on.
        anchor: Match,
    },
}

impl Selection {
    /// Short stable tag, used as the journal `kind` column.
    pub fn kind(&self) -> &'static str {
        match self {
            Selection::FirstRound => "first_round",
            Selection::Anchor { .. } => "anchor",
            Selection::Ranking { .. } => "ranking",
        }
    }
}

/// One selected round as it is appended to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRound {
    /// Monotonic round number.
    pub seq: RoundSeq,
    /// Selection timestamp in milliseconds.
    pub ts_ms: u64,
    /// Selection path.
    pub selection: Selection,
    /// The full round.
    pub round: Round,
}

/// Versioned wrapper for stable on-disk payload decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRoundEnvelope {
    /// Payload format version.
    pub format_version: u16,
    /// Wrapped record.
    pub stored: StoredRound,
}

impl StoredRoundEnvelope {
    /// Constructs an envelope using [`ROUND_FORMAT_VERSION`].
    pub fn new(stored: StoredRound) -> Self {
        Self {
            format_version: ROUND_FORMAT_VERSION,
            stored,
        }
    }
}
