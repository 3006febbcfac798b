//! Runtime event stream payloads.

use crate::{op::Selection, types::RoundSeq};

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// A round was taken from the schedule.
    RoundSelected {
        /// Round number.
        seq: RoundSeq,
        /// How the round was chosen.
        selection: Selection,
    },
    /// The last round of the schedule has been selected.
    Exhausted,
    /// Persistence has reached at least this round.
    DurableUpTo {
        /// Highest round known durable.
        round_seq: RoundSeq,
    },
}
