use hashbrown::HashSet;

use crate::{
    pairing::{Match, Round},
    types::PlayerId,
};

use super::engine::PairingError;

/// Rejects rosters the circle method cannot schedule: empty, odd-sized,
/// or naming a player twice.
pub fn validate_roster(players: &[PlayerId]) -> Result<(), PairingError> {
    if players.is_empty() {
        return Err(PairingError::EmptyRoster);
    }
    if players.len() % 2 != 0 {
        return Err(PairingError::OddRoster(players.len()));
    }

    let mut seen = HashSet::with_capacity(players.len());
    for p in players {
        if !seen.insert(*p) {
            return Err(PairingError::DuplicatePlayer(*p));
        }
    }
    Ok(())
}

/// Checks that `arrangement` seats exactly the players of `roster`.
pub fn validate_arrangement(roster: &[PlayerId], arrangement: &[PlayerId]) -> Result<(), PairingError> {
    if roster.len() != arrangement.len() {
        return Err(PairingError::ArrangementMismatch);
    }
    let roster_set: HashSet<PlayerId> = roster.iter().copied().collect();
    let mut seated = HashSet::with_capacity(arrangement.len());
    for p in arrangement {
        if !roster_set.contains(p) || !seated.insert(*p) {
            return Err(PairingError::ArrangementMismatch);
        }
    }
    Ok(())
}

/// Generates the full round-robin schedule for a seating.
///
/// Seat 0 stays fixed. Each step first rotates seats `1..N` one place
/// (the last seat moves to seat 1), then pairs seat `i` with seat
/// `N-1-i`. After `N-1` steps the seating is back where it started and
/// every pair of players has met exactly once.
///
/// `arrangement` must already be validated (even, non-empty, distinct).
pub fn circle_rounds(arrangement: &[PlayerId]) -> Vec<Round> {
    let n = arrangement.len();
    let mut seats = arrangement.to_vec();
    let mut rounds = Vec::with_capacity(n.saturating_sub(1));

    for _ in 1..n {
        seats[1..].rotate_right(1);
        rounds.push(pair_seats(&seats));
    }
    rounds
}

fn pair_seats(seats: &[PlayerId]) -> Round {
    let n = seats.len();
    (0..n / 2)
        .filter_map(|i| Match::new(seats[i], seats[n - 1 - i]))
        .collect()
}
