//! Pairing domain records: matches, rounds, and rankings.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::types::{PlayerId, Rank};

/// Unordered pairing of two distinct players, stored lowest index first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "(PlayerId, PlayerId)", into = "(PlayerId, PlayerId)")]
pub struct Match {
    low: PlayerId,
    high: PlayerId,
}

impl Match {
    /// Builds the canonical form of a pairing. Returns `None` when both
    /// sides are the same player.
    pub fn new(a: PlayerId, b: PlayerId) -> Option<Self> {
        match a.index().cmp(&b.index()) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Player with the lower index.
    pub fn low(&self) -> PlayerId {
        self.low
    }

    /// Player with the higher index.
    pub fn high(&self) -> PlayerId {
        self.high
    }

    /// True when `player` sits on either side.
    pub fn involves(&self, player: PlayerId) -> bool {
        self.low == player || self.high == player
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.low, self.high)
    }
}

/// Error for a pair that names the same player twice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("player {0} cannot be paired with itself")]
pub struct SelfPairing(pub PlayerId);

impl TryFrom<(PlayerId, PlayerId)> for Match {
    type Error = SelfPairing;

    fn try_from((a, b): (PlayerId, PlayerId)) -> Result<Self, Self::Error> {
        Match::new(a, b).ok_or(SelfPairing(a))
    }
}

impl From<Match> for (PlayerId, PlayerId) {
    fn from(value: Match) -> Self {
        (value.low, value.high)
    }
}

/// One round's full set of pairings: a perfect matching of the roster.
///
/// Matches are kept sorted so two rounds holding the same pairs compare
/// and serialize identically regardless of generation order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Match>", into = "Vec<Match>")]
pub struct Round {
    matches: Vec<Match>,
}

impl Round {
    /// Matches in canonical order.
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    /// Number of pairings in the round.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// True for a round with no pairings.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Membership test for one pairing.
    pub fn contains(&self, m: &Match) -> bool {
        self.matches.binary_search(m).is_ok()
    }

    /// Iterates the pairings.
    pub fn iter(&self) -> std::slice::Iter<'_, Match> {
        self.matches.iter()
    }

    /// The opponent of `player` in this round, if the player takes part.
    pub fn opponent_of(&self, player: PlayerId) -> Option<PlayerId> {
        self.matches.iter().find_map(|m| {
            if m.low == player {
                Some(m.high)
            } else if m.high == player {
                Some(m.low)
            } else {
                None
            }
        })
    }
}

impl From<Vec<Match>> for Round {
    fn from(mut matches: Vec<Match>) -> Self {
        matches.sort_unstable();
        matches.dedup();
        Self { matches }
    }
}

impl FromIterator<Match> for Round {
    fn from_iter<T: IntoIterator<Item = Match>>(iter: T) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl From<Round> for Vec<Match> {
    fn from(value: Round) -> Self {
        value.matches
    }
}

impl<'a> IntoIterator for &'a Round {
    type Item = &'a Match;
    type IntoIter = std::slice::Iter<'a, Match>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}

/// Current standings: rank to the players sharing it.
///
/// Ranks iterate ascending (best first); players within a rank keep the
/// order they were added in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ranking {
    groups: BTreeMap<Rank, Vec<PlayerId>>,
}

impl Ranking {
    /// Empty ranking.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `player` to the group at `rank`.
    pub fn push(&mut self, rank: Rank, player: PlayerId) -> &mut Self {
        self.groups.entry(rank).or_default().push(player);
        self
    }

    /// Rank groups, best rank first.
    pub fn groups(&self) -> impl Iterator<Item = (Rank, &[PlayerId])> + '_ {
        self.groups.iter().map(|(rank, players)| (*rank, players.as_slice()))
    }

    /// Total number of ranked entries.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// True when nobody is ranked.
    pub fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
    }
}

impl FromIterator<(Rank, Vec<PlayerId>)> for Ranking {
    fn from_iter<T: IntoIterator<Item = (Rank, Vec<PlayerId>)>>(iter: T) -> Self {
        let mut ranking = Ranking::new();
        for (rank, players) in iter {
            ranking.groups.entry(rank).or_default().extend(players);
        }
        ranking
    }
}
