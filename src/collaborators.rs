//! Injected capability interfaces.
//!
//! The engine performs no I/O of its own. Everything that would touch
//! a database, a clock, or a rating service is expressed as a trait
//! here and handed to the managers at construction time — the same
//! separation the reference chess server draws between `GameManager`
//! (in-memory orchestration) and `GameStorage` (the concrete backing
//! store), generalized one step further so the backing store itself
//! is swappable.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::series::Series;

/// A player's rating snapshot as returned by the player directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub user_id: Uuid,
    pub mindpoint: i64,
    pub current_rank: String,
}

/// Resolves a player id to their current rating snapshot.
///
/// `None` means the player id does not resolve to a known player.
pub trait PlayerFetcher: Send + Sync {
    fn fetch(&self, player_id: Uuid) -> Option<PlayerSnapshot>;
}

/// Persists a series. The engine calls this after every mutation; it
/// never retries a failure itself.
pub trait SeriesSaver: Send + Sync {
    fn save(&self, series: &Series);
}

/// Looks up a series by id. `None` means unknown.
pub trait SeriesFinder: Send + Sync {
    fn find(&self, series_id: Uuid) -> Option<Series>;
}

/// Monotonic seconds. Injected so the disconnect watchdog carries no
/// clock of its own and is deterministically testable.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall-clock `TimeProvider` backed by `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs() as i64
    }
}

/// A `TimeProvider` whose clock is set explicitly — used by tests and
/// the demo binary to drive scripted timelines without sleeping.
#[derive(Debug)]
pub struct ManualTimeProvider {
    now: RwLock<i64>,
}

impl ManualTimeProvider {
    pub fn new(start: i64) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, now: i64) {
        *self.now.write().unwrap() = now;
    }

    pub fn advance(&self, by: i64) {
        *self.now.write().unwrap() += by;
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now(&self) -> i64 {
        *self.now.read().unwrap()
    }
}

/// In-memory reference `PlayerFetcher` used by the demo binary and
/// tests. A real deployment backs this with a player/rating service.
#[derive(Debug, Default)]
pub struct InMemoryPlayerDirectory {
    players: RwLock<HashMap<Uuid, PlayerSnapshot>>,
}

impl InMemoryPlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, player_id: Uuid, mindpoint: i64, current_rank: impl Into<String>) {
        self.players.write().unwrap().insert(
            player_id,
            PlayerSnapshot {
                user_id: player_id,
                mindpoint,
                current_rank: current_rank.into(),
            },
        );
    }
}

impl PlayerFetcher for InMemoryPlayerDirectory {
    fn fetch(&self, player_id: Uuid) -> Option<PlayerSnapshot> {
        self.players.read().unwrap().get(&player_id).cloned()
    }
}

/// In-memory reference `SeriesSaver`/`SeriesFinder` pair used by the
/// demo binary and tests. Mirrors the reference crate's
/// `GameManager.games: HashMap<Uuid, Game>` registry shape.
#[derive(Debug, Default)]
pub struct InMemorySeriesStore {
    series: RwLock<HashMap<Uuid, Series>>,
}

impl InMemorySeriesStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SeriesSaver for InMemorySeriesStore {
    fn save(&self, series: &Series) {
        self.series
            .write()
            .unwrap()
            .insert(series.id, series.clone());
    }
}

impl SeriesFinder for InMemorySeriesStore {
    fn find(&self, series_id: Uuid) -> Option<Series> {
        self.series.read().unwrap().get(&series_id).cloned()
    }
}
