use hashbrown::HashSet;

use crate::pairing::{Match, Round};

/// Matches already consumed in the current tournament. Only grows.
#[derive(Debug, Clone, Default)]
pub struct PlayedMatches {
    set: HashSet<Match>,
}

impl PlayedMatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unions every pairing of `round` into memory and returns how many
    /// were not already known.
    pub fn record(&mut self, round: &Round) -> usize {
        round.iter().filter(|m| self.set.insert(**m)).count()
    }

    pub fn insert(&mut self, m: Match) -> bool {
        self.set.insert(m)
    }

    pub fn contains(&self, m: &Match) -> bool {
        self.set.contains(m)
    }

    /// True when at least one pairing of `round` is known.
    pub fn overlaps(&self, round: &Round) -> bool {
        round.iter().any(|m| self.set.contains(m))
    }

    /// True when every pairing of `round` is known.
    pub fn covers(&self, round: &Round) -> bool {
        round.iter().all(|m| self.set.contains(m))
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Known matches in canonical order.
    pub fn sorted(&self) -> Vec<Match> {
        let mut out: Vec<Match> = self.set.iter().copied().collect();
        out.sort_unstable();
        out
    }
}
