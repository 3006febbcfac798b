use std::collections::BTreeSet;

use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

use rrpair::{
    core::engine::{PairingEngine, PairingError},
    op::Selection,
    pairing::{Match, Ranking, Round},
    types::PlayerId,
};

#[derive(Debug, Clone)]
enum Action {
    First,
    Anchor { a: u8, b: u8 },
    Ranked { ranks: Vec<u8> },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::First),
        (0u8..32, 0u8..32).prop_map(|(a, b)| Action::Anchor { a, b }),
        prop::collection::vec(0u8..6, 32).prop_map(|ranks| Action::Ranked { ranks }),
    ]
}

fn roster(n: usize) -> Vec<PlayerId> {
    (0..n as u32).map(|i| PlayerId::new(i * 3 + 1)).collect()
}

fn ranking_from(players: &[PlayerId], ranks: &[u8]) -> Ranking {
    let mut ranking = Ranking::new();
    for (player, rank) in players.iter().zip(ranks) {
        ranking.push(u32::from(*rank), *player);
    }
    ranking
}

fn as_set(rounds: &[Round]) -> BTreeSet<Vec<Match>> {
    rounds.iter().map(|r| r.matches().to_vec()).collect()
}

fn all_pairs(players: &[PlayerId]) -> Vec<Match> {
    let mut out = Vec::new();
    for i in 0..players.len() {
        for j in i + 1..players.len() {
            out.extend(Match::new(players[i], players[j]));
        }
    }
    out
}

// Rescans every (i, j) of the pool after each rank group is added.
fn reference_anchor(engine: &PairingEngine, ranking: &Ranking) -> Option<Match> {
    let mut pool = Vec::new();
    for (_, group) in ranking.groups() {
        pool.extend_from_slice(group);
        for i in 0..pool.len() {
            for j in i + 1..pool.len() {
                let Some(m) = Match::new(pool[i], pool[j]) else {
                    continue;
                };
                if engine.has_played(&m) {
                    continue;
                }
                if engine.remaining().iter().any(|r| r.contains(&m)) {
                    return Some(m);
                }
            }
        }
    }
    None
}

proptest! {
    #[test]
    fn schedule_covers_every_pair_exactly_once(half in 1usize..12, seed in any::<u64>()) {
        let players = roster(half * 2);
        let mut rng = StdRng::seed_from_u64(seed);
        let engine = PairingEngine::new(players.clone(), &mut rng).unwrap();
        let n = players.len();

        prop_assert_eq!(engine.remaining().len(), n - 1);

        let mut seen = BTreeSet::new();
        for round in engine.remaining() {
            prop_assert_eq!(round.len(), n / 2);
            let mut in_round = BTreeSet::new();
            for m in round {
                prop_assert!(in_round.insert(m.low()));
                prop_assert!(in_round.insert(m.high()));
                prop_assert!(seen.insert(*m), "pair {} repeated", m);
            }
            prop_assert_eq!(in_round.len(), n);
        }
        prop_assert_eq!(seen.len(), n * (n - 1) / 2);
    }

    #[test]
    fn same_arrangement_gives_same_schedule(half in 1usize..10, seed in any::<u64>()) {
        let players = roster(half * 2);
        let mut rng = StdRng::seed_from_u64(seed);
        let fresh = PairingEngine::new(players.clone(), &mut rng).unwrap();
        let rebuilt = PairingEngine::with_arrangement(players.clone(), fresh.arrangement().to_vec()).unwrap();
        let restored = PairingEngine::restore(players, fresh.arrangement().to_vec(), Vec::new()).unwrap();

        prop_assert_eq!(fresh.remaining(), rebuilt.remaining());
        prop_assert_eq!(fresh.remaining(), restored.remaining());
        prop_assert_eq!(fresh.schedule(), fresh.remaining().to_vec());
    }

    #[test]
    fn selections_never_repeat_and_restore_matches(
        half in 1usize..8,
        seed in any::<u64>(),
        actions in prop::collection::vec(action_strategy(), 1..40),
    ) {
        let players = roster(half * 2);
        let n = players.len();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut engine = PairingEngine::new(players.clone(), &mut rng).unwrap();
        let mut handed_out = BTreeSet::new();
        let mut selected = 0usize;

        for action in actions {
            let res = match action {
                Action::First => engine.select_first_round(),
                Action::Anchor { a, b } => {
                    let a = players[usize::from(a) % n];
                    let b = players[usize::from(b) % n];
                    match Match::new(a, b) {
                        Some(m) => engine.select_round_containing(m),
                        None => continue,
                    }
                }
                Action::Ranked { ranks } => engine.select_round_by_ranking(&ranking_from(&players, &ranks)),
            };

            match res {
                Ok(round) => {
                    selected += 1;
                    for m in &round {
                        prop_assert!(handed_out.insert(*m), "pair {} handed out twice", m);
                    }
                }
                Err(PairingError::Exhausted) => prop_assert!(engine.is_exhausted()),
                Err(PairingError::NoSuchRound(m)) => prop_assert!(engine.has_played(&m)),
                Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
            }

            // Restoring from the exported state must land on the same remaining rounds.
            let restored = PairingEngine::from_state(engine.export_state()).unwrap();
            prop_assert_eq!(as_set(restored.remaining()), as_set(engine.remaining()));
            prop_assert_eq!(restored.rounds_selected(), engine.rounds_selected());
        }

        prop_assert!(selected <= n - 1);
        prop_assert_eq!(engine.rounds_selected() as usize, selected);
    }

    #[test]
    fn ranking_selection_runs_the_schedule_to_exhaustion(half in 1usize..8, seed in any::<u64>()) {
        let players = roster(half * 2);
        let n = players.len();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut engine = PairingEngine::new(players.clone(), &mut rng).unwrap();

        let mut ranking = Ranking::new();
        for (i, player) in players.iter().enumerate() {
            ranking.push((i % 3) as u32, *player);
        }

        engine.select_first_round().unwrap();
        for _ in 1..n - 1 {
            prop_assert!(engine.select_round_by_ranking(&ranking).is_ok());
        }
        prop_assert!(engine.is_exhausted());
        prop_assert_eq!(engine.played().len(), n * (n - 1) / 2);
        prop_assert_eq!(engine.select_round_by_ranking(&ranking), Err(PairingError::Exhausted));
        prop_assert_eq!(engine.select_first_round(), Err(PairingError::Exhausted));
    }

    #[test]
    fn restored_engine_finishes_with_the_same_rounds(half in 1usize..8, seed in any::<u64>(), played_rounds in 0usize..8) {
        let players = roster(half * 2);
        let n = players.len();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut original = PairingEngine::new(players, &mut rng).unwrap();

        for _ in 0..played_rounds.min(n - 1) {
            original.select_first_round().unwrap();
        }

        let mut restored = PairingEngine::from_state(original.export_state()).unwrap();

        let mut from_original = Vec::new();
        while let Ok(r) = original.select_first_round() {
            from_original.push(r);
        }
        let mut from_restored = Vec::new();
        while let Ok(r) = restored.select_first_round() {
            from_restored.push(r);
        }
        prop_assert_eq!(as_set(&from_original), as_set(&from_restored));
    }

    #[test]
    fn ranking_scan_matches_full_rescan(
        half in 1usize..7,
        seed in any::<u64>(),
        keep in prop::collection::vec(any::<bool>(), 66),
        rankings in prop::collection::vec(prop::collection::vec(0u8..5, 12), 1..6),
    ) {
        let players = roster(half * 2);
        let mut rng = StdRng::seed_from_u64(seed);
        let arrangement = PairingEngine::new(players.clone(), &mut rng).unwrap().arrangement().to_vec();

        let history: Vec<Match> = all_pairs(&players)
            .into_iter()
            .zip(&keep)
            .filter_map(|(m, keep)| keep.then_some(m))
            .collect();
        let (mut engine, _) = PairingEngine::restore_best_effort(players.clone(), arrangement, history).unwrap();

        for ranks in rankings {
            let ranking = ranking_from(&players, &ranks);
            let expected = reference_anchor(&engine, &ranking);
            let before = engine.remaining_len();

            match engine.select_round_by_ranking(&ranking) {
                Ok(round) => {
                    prop_assert!(expected.is_some(), "scan found a pair the full rescan did not");
                    let anchor = expected.unwrap();
                    prop_assert!(round.contains(&anchor));
                    let stored = engine.drain_pending_rounds();
                    prop_assert_eq!(stored.last().map(|s| s.selection), Some(Selection::Ranking { anchor }));
                    prop_assert_eq!(engine.remaining_len(), before - 1);
                }
                Err(PairingError::Exhausted) => {
                    prop_assert!(engine.is_exhausted());
                    prop_assert_eq!(expected, None);
                }
                Err(PairingError::IncompleteRanking) => {
                    prop_assert_eq!(expected, None);
                    prop_assert_eq!(engine.remaining_len(), before);
                }
                Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
            }
        }
    }
}
