//! Round-robin pairing for chess tournaments, with an append-only SQLite
//! round journal for restart recovery.
//!
//! # Examples
//!
//! Selecting rounds in memory with [`core::engine::PairingEngine`]:
//! ```
//! use rrpair::{
//!     core::engine::PairingEngine,
//!     pairing::{Match, Ranking},
//!     types::PlayerId,
//! };
//!
//! let players: Vec<PlayerId> = (1..=4).map(PlayerId::new).collect();
//! let mut engine = PairingEngine::with_arrangement(players.clone(), players.clone())
//!     .expect("valid roster");
//!
//! let first = engine.select_first_round().expect("first round");
//! assert_eq!(first.len(), 2);
//!
//! let mut ranking = Ranking::new();
//! ranking.push(1, players[0]).push(2, players[1]).push(3, players[3]).push(4, players[2]);
//! let second = engine.select_round_by_ranking(&ranking).expect("second round");
//! assert!(second.contains(&Match::new(players[0], players[1]).expect("pair")));
//! ```
//!
//! Restoring after a restart from the persisted state:
//! ```
//! use rand::{rngs::StdRng, SeedableRng};
//! use rrpair::{core::engine::PairingEngine, types::PlayerId};
//!
//! let players: Vec<PlayerId> = (1..=6).map(PlayerId::new).collect();
//! let mut rng = StdRng::seed_from_u64(7);
//! let mut engine = PairingEngine::new(players, &mut rng).expect("valid roster");
//! engine.select_first_round().expect("round");
//!
//! let restored = PairingEngine::from_state(engine.export_state()).expect("restore");
//! assert_eq!(restored.remaining(), engine.remaining());
//! ```
//!
//! Runtime usage with SQLite sink:
//! ```no_run
//! use rrpair::{
//!     core::engine::PairingEngine,
//!     persist::sqlite::SqliteRoundSink,
//!     runtime::handle::{spawn_pairing, RuntimeConfig},
//!     types::PlayerId,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = SqliteRoundSink::open("tournament.db").expect("open sqlite");
//! let players: Vec<PlayerId> = (1..=8).map(PlayerId::new).collect();
//! let engine = PairingEngine::new(players, &mut rand::thread_rng()).expect("roster");
//! let handle = spawn_pairing(engine, Some(Box::new(sink)), RuntimeConfig::default())
//!     .expect("spawn");
//! let _round = handle.select_first_round().await.expect("round");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Pairing engine, schedule generation, and played-match memory.
pub mod core;
/// Round-selection journal records.
pub mod op;
/// Matches, rounds, and rankings.
pub mod pairing;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Shared primitive types.
pub mod types;
