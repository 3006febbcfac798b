use std::time::{SystemTime, UNIX_EPOCH};

use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    op::{Selection, StoredRound},
    pairing::{Match, Ranking, Round},
    types::{PlayerId, RoundSeq},
};

use super::{
    memory::PlayedMatches,
    schedule::{circle_rounds, validate_arrangement, validate_roster},
};

/// Reasons a pairing operation can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PairingError {
    /// The roster names no players.
    #[error("roster is empty")]
    EmptyRoster,
    /// The roster size is odd; the payload is that size.
    #[error("roster has an odd number of players ({0})")]
    OddRoster(usize),
    /// A player is listed twice in the roster.
    #[error("player {0} appears more than once in the roster")]
    DuplicatePlayer(PlayerId),
    /// The seating arrangement is not a permutation of the roster.
    #[error("arrangement does not seat exactly the roster")]
    ArrangementMismatch,
    /// A played match names a player outside the roster.
    #[error("played history names player {0} outside the roster")]
    UnknownPlayer(PlayerId),
    /// The anchor match is in no remaining round.
    #[error("no remaining round contains {0}")]
    NoSuchRound(Match),
    /// All rounds of the schedule have been selected.
    #[error("every round of the schedule has been selected")]
    Exhausted,
    /// Rounds remain, but no pairing of ranked players reaches one.
    #[error("ranking ran out of players before reaching an unplayed pairing")]
    IncompleteRanking,
    /// Some rounds are only partly covered by the played history.
    #[error("played history partially covers {} round(s)", .partial.len())]
    InconsistentHistory {
        /// The partly covered rounds, in schedule order.
        partial: Vec<Round>,
    },
}

/// Everything a caller must persist to rebuild a [`PairingEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingState {
    pub roster: Vec<PlayerId>,
    /// Seating order the schedule was generated from.
    pub arrangement: Vec<PlayerId>,
    /// Every match handed out so far, canonical and sorted.
    pub played: Vec<Match>,
}

/// Round-robin pairing engine for one tournament.
///
/// Holds the schedule derived from a seating arrangement and hands out
/// its rounds one at a time. No match is ever handed out twice.
#[derive(Debug)]
pub struct PairingEngine {
    roster: Vec<PlayerId>,
    arrangement: Vec<PlayerId>,
    remaining: Vec<Round>,
    played: PlayedMatches,
    pending: Vec<StoredRound>,
    next_round_seq: RoundSeq,
}

impl PairingEngine {
    /// Fresh engine with a uniformly shuffled arrangement drawn from `rng`.
    pub fn new<R: Rng + ?Sized>(players: Vec<PlayerId>, rng: &mut R) -> Result<Self, PairingError> {
        validate_roster(&players)?;
        let mut arrangement = players.clone();
        arrangement.shuffle(rng);
        Ok(Self::build(players, arrangement))
    }

    /// Fresh engine seeded from a known arrangement.
    pub fn with_arrangement(players: Vec<PlayerId>, arrangement: Vec<PlayerId>) -> Result<Self, PairingError> {
        validate_roster(&players)?;
        validate_arrangement(&players, &arrangement)?;
        Ok(Self::build(players, arrangement))
    }

    /// Rebuilds an engine from persisted state.
    ///
    /// Fails with [`PairingError::InconsistentHistory`] when the played
    /// matches cover only part of some round.
    pub fn restore(
        players: Vec<PlayerId>,
        arrangement: Vec<PlayerId>,
        played: impl IntoIterator<Item = Match>,
    ) -> Result<Self, PairingError> {
        let (engine, partial) = Self::restore_best_effort(players, arrangement, played)?;
        if !partial.is_empty() {
            return Err(PairingError::InconsistentHistory { partial });
        }
        Ok(engine)
    }

    /// Rebuilds an engine from persisted state, dropping every round that
    /// shares at least one played match.
    ///
    /// Rounds dropped while only partially played are returned alongside
    /// the engine; their unplayed matches can no longer be scheduled.
    pub fn restore_best_effort(
        players: Vec<PlayerId>,
        arrangement: Vec<PlayerId>,
        played: impl IntoIterator<Item = Match>,
    ) -> Result<(Self, Vec<Round>), PairingError> {
        let mut engine = Self::with_arrangement(players, arrangement)?;

        for m in played {
            for p in [m.low(), m.high()] {
                if !engine.roster.contains(&p) {
                    return Err(PairingError::UnknownPlayer(p));
                }
            }
            engine.played.insert(m);
        }

        let mut partial = Vec::new();
        let played = &engine.played;
        engine.remaining.retain(|round| {
            if !played.overlaps(round) {
                return true;
            }
            if !played.covers(round) {
                partial.push(round.clone());
            }
            false
        });

        let consumed = engine.schedule_len() - engine.remaining.len();
        engine.next_round_seq = consumed as RoundSeq + 1;

        if partial.is_empty() {
            info!(
                remaining = engine.remaining.len(),
                played = engine.played.len(),
                "pairing engine restored"
            );
        } else {
            warn!(
                remaining = engine.remaining.len(),
                partial = partial.len(),
                "played history partially covers rounds"
            );
        }
        Ok((engine, partial))
    }

    /// Strict restore from an exported [`PairingState`].
    pub fn from_state(state: PairingState) -> Result<Self, PairingError> {
        Self::restore(state.roster, state.arrangement, state.played)
    }

    pub fn export_state(&self) -> PairingState {
        PairingState {
            roster: self.roster.clone(),
            arrangement: self.arrangement.clone(),
            played: self.played.sorted(),
        }
    }

    /// Takes the round at the end of the remaining schedule.
    pub fn select_first_round(&mut self) -> Result<Round, PairingError> {
        let round = self.remaining.pop().ok_or(PairingError::Exhausted)?;
        Ok(self.commit(round, Selection::FirstRound))
    }

    /// Takes the unique remaining round that contains `anchor`.
    pub fn select_round_containing(&mut self, anchor: Match) -> Result<Round, PairingError> {
        self.take_round_containing(anchor, Selection::Anchor { anchor })
    }

    /// Takes the round reached through the best-ranked unplayed pairing.
    ///
    /// Players are pooled rank by rank, best first. After each rank is
    /// added, pairs `(i, j)` with `i` before `j` in pool order are tried
    /// and the first unplayed one picks the whole round that holds it.
    pub fn select_round_by_ranking(&mut self, ranking: &Ranking) -> Result<Round, PairingError> {
        if self.remaining.is_empty() {
            return Err(PairingError::Exhausted);
        }

        let mut pool: Vec<PlayerId> = Vec::with_capacity(ranking.len());
        for (_, players) in ranking.groups() {
            let scanned = pool.len();
            pool.extend_from_slice(players);
            if let Some(anchor) = self.first_reachable_pair(&pool, scanned) {
                return self.take_round_containing(anchor, Selection::Ranking { anchor });
            }
        }

        Err(PairingError::IncompleteRanking)
    }

    pub fn roster(&self) -> &[PlayerId] {
        &self.roster
    }

    pub fn arrangement(&self) -> &[PlayerId] {
        &self.arrangement
    }

    /// Rounds not selected yet, in schedule order.
    pub fn remaining(&self) -> &[Round] {
        &self.remaining
    }

    pub fn remaining_len(&self) -> usize {
        self.remaining.len()
    }

    pub fn played(&self) -> &PlayedMatches {
        &self.played
    }

    pub fn has_played(&self, m: &Match) -> bool {
        self.played.contains(m)
    }

    pub fn rounds_selected(&self) -> RoundSeq {
        self.next_round_seq - 1
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Full schedule for the arrangement, including selected rounds.
    pub fn schedule(&self) -> Vec<Round> {
        circle_rounds(&self.arrangement)
    }

    pub fn schedule_len(&self) -> usize {
        self.roster.len() - 1
    }

    pub fn drain_pending_rounds(&mut self) -> Vec<StoredRound> {
        std::mem::take(&mut self.pending)
    }

    fn build(roster: Vec<PlayerId>, arrangement: Vec<PlayerId>) -> Self {
        let remaining = circle_rounds(&arrangement);
        debug!(players = roster.len(), rounds = remaining.len(), "generated circle schedule");
        Self {
            roster,
            arrangement,
            remaining,
            played: PlayedMatches::new(),
            pending: Vec::new(),
            next_round_seq: 1,
        }
    }

    // Pairs lying entirely inside `pool[..scanned]` were rejected by an
    // earlier pass, so only pairs ending in the newly added tail are tried.
    // Pair order is still (i, j) lexicographic over the whole pool.
    fn first_reachable_pair(&self, pool: &[PlayerId], scanned: usize) -> Option<Match> {
        for i in 0..pool.len() {
            for j in (i + 1).max(scanned)..pool.len() {
                let Some(candidate) = Match::new(pool[i], pool[j]) else {
                    continue;
                };
                if self.played.contains(&candidate) {
                    continue;
                }
                if self.position_of(&candidate).is_some() {
                    return Some(candidate);
                }
            }
        }
        None
    }

    fn position_of(&self, m: &Match) -> Option<usize> {
        self.remaining.iter().position(|round| round.contains(m))
    }

    fn take_round_containing(&mut self, anchor: Match, selection: Selection) -> Result<Round, PairingError> {
        if self.played.contains(&anchor) {
            return Err(PairingError::NoSuchRound(anchor));
        }
        let idx = self.position_of(&anchor).ok_or(PairingError::NoSuchRound(anchor))?;
        let round = self.remaining.remove(idx);
        Ok(self.commit(round, selection))
    }

    fn commit(&mut self, round: Round, selection: Selection) -> Round {
        self.played.record(&round);
        let seq = self.next_round_seq;
        self.next_round_seq += 1;
        debug!(
            seq,
            kind = selection.kind(),
            matches = round.len(),
            remaining = self.remaining.len(),
            "round selected"
        );
        self.pending.push(StoredRound {
            seq,
            ts_ms: now_ms(),
            selection,
            round: round.clone(),
        });
        round
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
