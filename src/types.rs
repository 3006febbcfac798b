//! Shared primitive identifiers.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Monotonic round sequence number, starting at 1.
pub type RoundSeq = u64;
/// Standing in a ranking. Lower is better; ties are allowed.
pub type Rank = u32;

const PLAYER_PREFIX: &str = "p_";

/// Opaque player token carrying a stable integer index.
///
/// The index only orders the two sides of a [`crate::pairing::Match`];
/// identity is plain equality. The textual form is `p_<index>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(u32);

impl PlayerId {
    /// Wraps a raw player index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Raw player index.
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PLAYER_PREFIX}{}", self.0)
    }
}

/// Error returned when text is not of the form `p_<index>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid player id {0:?}, expected p_<index>")]
pub struct ParsePlayerIdError(pub String);

impl FromStr for PlayerId {
    type Err = ParsePlayerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(PLAYER_PREFIX)
            .and_then(|digits| digits.parse::<u32>().ok())
            .map(PlayerId)
            .ok_or_else(|| ParsePlayerIdError(s.to_string()))
    }
}

impl TryFrom<String> for PlayerId {
    type Error = ParsePlayerIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PlayerId> for String {
    fn from(value: PlayerId) -> Self {
        value.to_string()
    }
}
