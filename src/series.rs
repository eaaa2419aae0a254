//! Best-of-three series lifecycle.
//!
//! A `Series` tracks the score between two players across up to three
//! games, composing a [`Swap2Manager`] to open each game and emitting
//! a completion result (score, winner, the MP-change field) once one
//! side reaches two wins. Rating computation itself is someone else's
//! job — this module only ever *reports* `loser_mp_change`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collaborators::{PlayerFetcher, SeriesFinder, SeriesSaver, TimeProvider};
use crate::error::{EngineError, EngineResult};
use crate::swap2::{StoneChoice, Swap2Manager, Swap2State};

/// Number of game wins needed to take the series.
pub const GAMES_TO_WIN: u32 = 2;

/// MP penalty applied on a standard (non-abandon) series loss.
pub const STANDARD_LOSS_MP: i64 = -15;

/// Additional penalty folded into an abandon (`-15` standard + `-10`).
pub const ABANDON_PENALTY_MP: i64 = -25;

/// Total MP penalty recorded against the abandoning player.
pub const ABANDON_TOTAL_MP: i64 = STANDARD_LOSS_MP - 10;

const _: () = assert!(ABANDON_TOTAL_MP == ABANDON_PENALTY_MP);

/// Which color a player held in the game that produced this series'
/// current opening, or the most recently completed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerSide {
    Black,
    White,
}

/// Lifecycle status of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesStatus {
    InProgress,
    Completed,
    Abandoned,
}

/// A best-of-three series between two players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: Uuid,
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub player1_initial_mp: i64,
    pub player2_initial_mp: i64,
    pub player1_initial_rank: String,
    pub player2_initial_rank: String,
    pub player1_side: Option<PlayerSide>,
    pub player2_side: Option<PlayerSide>,
    pub player1_wins: u32,
    pub player2_wins: u32,
    pub games_to_win: u32,
    pub current_game: u32,
    pub status: SeriesStatus,
    pub created_at: i64,
    pub started_at: i64,
    pub winner_id: Option<Uuid>,
    pub final_score: Option<String>,
    pub ended_at: Option<i64>,
    pub loser_mp_change: Option<i64>,
    /// The id of the game currently being opened/played.
    pub game_id: Uuid,
    /// The active game's opening state, embedded for convenience.
    /// `None` once the series has terminated.
    pub swap2_state: Option<Swap2State>,
}

impl Series {
    /// Returns the other participant, or `Unauthorized` if `player_id`
    /// isn't in this series at all.
    pub fn opponent_of(&self, player_id: Uuid) -> EngineResult<Uuid> {
        if player_id == self.player1_id {
            Ok(self.player2_id)
        } else if player_id == self.player2_id {
            Ok(self.player1_id)
        } else {
            Err(EngineError::Unauthorized(player_id))
        }
    }

    pub fn is_participant(&self, player_id: Uuid) -> bool {
        player_id == self.player1_id || player_id == self.player2_id
    }
}

/// Outcome of `endGame`/`prepareNextSeriesGame`/a forfeit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndGameOutcome {
    pub series: Series,
    pub is_complete: bool,
    pub next_game_ready: bool,
    pub swap2_state: Option<Swap2State>,
    pub game_id: Option<Uuid>,
}

/// Outcome of a pure `getSeriesState` read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesStateOutcome {
    pub series: Series,
    pub is_complete: bool,
}

/// Outcome of `abandonSeries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbandonOutcome {
    pub series: Series,
    pub winner_id: Uuid,
    pub loser_id: Uuid,
}

/// Outcome of a rematch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RematchOutcome {
    WaitingForOpponent,
    Created(Series),
}

/// Owns every series' lifecycle, composing a [`Swap2Manager`] to open
/// each game and a process-wide rematch-intent registry.
pub struct SeriesManager {
    swap2: Arc<Swap2Manager>,
    player_fetcher: Arc<dyn PlayerFetcher>,
    saver: Arc<dyn SeriesSaver>,
    finder: Arc<dyn SeriesFinder>,
    time: Arc<dyn TimeProvider>,
    /// Per-series lock so a single series' mutating operations are
    /// always serialized, independent of whatever the injected
    /// saver/finder do internally (see the engine's concurrency model).
    series_locks: RwLock<HashMap<Uuid, Arc<Mutex<()>>>>,
    /// At most one pending rematch requester per completed series id.
    rematch_intents: RwLock<HashMap<Uuid, Uuid>>,
}

impl SeriesManager {
    pub fn new(
        swap2: Arc<Swap2Manager>,
        player_fetcher: Arc<dyn PlayerFetcher>,
        saver: Arc<dyn SeriesSaver>,
        finder: Arc<dyn SeriesFinder>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            swap2,
            player_fetcher,
            saver,
            finder,
            time,
            series_locks: RwLock::new(HashMap::new()),
            rematch_intents: RwLock::new(HashMap::new()),
        }
    }

    fn lock_for(&self, series_id: Uuid) -> Arc<Mutex<()>> {
        if let Some(lock) = self.series_locks.read().unwrap().get(&series_id) {
            return lock.clone();
        }
        self.series_locks
            .write()
            .unwrap()
            .entry(series_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Creates a new series and opens game 1's Swap 2 dialogue.
    pub fn create_series(&self, player1_id: Uuid, player2_id: Uuid) -> EngineResult<Series> {
        if player1_id == player2_id {
            return Err(EngineError::Validation(
                "player1 and player2 must be distinct".to_string(),
            ));
        }

        let p1 = self
            .player_fetcher
            .fetch(player1_id)
            .ok_or_else(|| EngineError::Validation(format!("player {player1_id} not found")))?;
        let p2 = self
            .player_fetcher
            .fetch(player2_id)
            .ok_or_else(|| EngineError::Validation(format!("player {player2_id} not found")))?;

        let series_id = Uuid::new_v4();
        let game_id = Uuid::new_v4();
        let swap2_state = self.swap2.initialize_swap2(game_id, player1_id, player2_id)?;
        let now = self.time.now();

        let series = Series {
            id: series_id,
            player1_id,
            player2_id,
            player1_initial_mp: p1.mindpoint,
            player2_initial_mp: p2.mindpoint,
            player1_initial_rank: p1.current_rank,
            player2_initial_rank: p2.current_rank,
            player1_side: None,
            player2_side: None,
            player1_wins: 0,
            player2_wins: 0,
            games_to_win: GAMES_TO_WIN,
            current_game: 1,
            status: SeriesStatus::InProgress,
            created_at: now,
            started_at: now,
            winner_id: None,
            final_score: None,
            ended_at: None,
            loser_mp_change: None,
            game_id,
            swap2_state: Some(swap2_state),
        };

        self.saver.save(&series);
        log::info!(
            "series {}: created between {} and {}",
            series_id,
            player1_id,
            player2_id
        );
        Ok(series)
    }

    pub fn get_series_state(&self, series_id: Uuid) -> EngineResult<SeriesStateOutcome> {
        let series = self
            .finder
            .find(series_id)
            .ok_or(EngineError::SeriesNotFound(series_id))?;
        let is_complete = series.status != SeriesStatus::InProgress;
        Ok(SeriesStateOutcome { series, is_complete })
    }

    /// Reports a game's winner; advances the series or completes it.
    pub fn end_game(
        &self,
        series_id: Uuid,
        match_id: Uuid,
        winner_id: Uuid,
        duration_seconds: u64,
    ) -> EngineResult<EndGameOutcome> {
        let lock = self.lock_for(series_id);
        let _guard = lock.lock().unwrap();

        let mut series = self
            .finder
            .find(series_id)
            .ok_or(EngineError::SeriesNotFound(series_id))?;
        if series.status != SeriesStatus::InProgress {
            return Err(EngineError::InvalidState(format!(
                "series {series_id} is not in progress"
            )));
        }
        if !series.is_participant(winner_id) {
            return Err(EngineError::Unauthorized(winner_id));
        }

        self.credit_win(&mut series, winner_id);
        log::info!(
            "series {series_id}: game {} (match {match_id}, {duration_seconds}s) won by {winner_id}",
            series.current_game
        );

        let outcome = self.finalize_or_advance(&mut series)?;
        self.saver.save(&series);
        Ok(outcome)
    }

    /// Advances to the next game without re-reporting a winner, for
    /// callers that already mutated the series score out of band.
    pub fn prepare_next_series_game(&self, series_id: Uuid) -> EngineResult<EndGameOutcome> {
        let lock = self.lock_for(series_id);
        let _guard = lock.lock().unwrap();

        let mut series = self
            .finder
            .find(series_id)
            .ok_or(EngineError::SeriesNotFound(series_id))?;
        if series.status != SeriesStatus::InProgress {
            return Err(EngineError::InvalidState(format!(
                "series {series_id} is not in progress"
            )));
        }

        self.advance_to_next_game(&mut series)?;
        self.saver.save(&series);
        Ok(EndGameOutcome {
            series: series.clone(),
            is_complete: false,
            next_game_ready: true,
            swap2_state: series.swap2_state,
            game_id: Some(series.game_id),
        })
    }

    /// Credits the opponent with a win for the current game, as if the
    /// forfeiting player had lost it outright.
    pub fn forfeit_current_game(
        &self,
        series_id: Uuid,
        forfeiting_player_id: Uuid,
    ) -> EngineResult<EndGameOutcome> {
        let lock = self.lock_for(series_id);
        let _guard = lock.lock().unwrap();

        let mut series = self
            .finder
            .find(series_id)
            .ok_or(EngineError::SeriesNotFound(series_id))?;
        if series.status != SeriesStatus::InProgress {
            return Err(EngineError::InvalidState(format!(
                "series {series_id} is not in progress"
            )));
        }

        let opponent = series.opponent_of(forfeiting_player_id)?;
        self.credit_win(&mut series, opponent);
        log::info!(
            "series {series_id}: game {} forfeited by {forfeiting_player_id}",
            series.current_game
        );

        let outcome = self.finalize_or_advance(&mut series)?;
        self.saver.save(&series);
        Ok(outcome)
    }

    /// Terminates the series outright, regardless of the current
    /// score, crediting the opponent and applying the abandon penalty.
    pub fn abandon_series(
        &self,
        series_id: Uuid,
        abandoning_player_id: Uuid,
    ) -> EngineResult<AbandonOutcome> {
        let lock = self.lock_for(series_id);
        let _guard = lock.lock().unwrap();

        let mut series = self
            .finder
            .find(series_id)
            .ok_or(EngineError::SeriesNotFound(series_id))?;
        if series.status != SeriesStatus::InProgress {
            return Err(EngineError::InvalidState(format!(
                "series {series_id} is not in progress"
            )));
        }

        let winner_id = series.opponent_of(abandoning_player_id)?;
        series.status = SeriesStatus::Abandoned;
        series.winner_id = Some(winner_id);
        series.final_score = Some(format!("{}-{}", series.player1_wins, series.player2_wins));
        series.ended_at = Some(self.time.now());
        series.loser_mp_change = Some(ABANDON_PENALTY_MP);
        self.swap2.clear_state(series.game_id);
        series.swap2_state = None;

        self.saver.save(&series);
        log::info!("series {series_id}: abandoned by {abandoning_player_id}");

        Ok(AbandonOutcome {
            series,
            winner_id,
            loser_id: abandoning_player_id,
        })
    }

    /// Places a tentative stone in the current game's Swap 2 opening.
    /// The real entry point for opening placements: routes through
    /// `Swap2Manager` and refreshes `player1_side`/`player2_side` the
    /// moment the dialogue completes.
    pub fn place_opening_stone(
        &self,
        series_id: Uuid,
        player_id: Uuid,
        x: i32,
        y: i32,
    ) -> EngineResult<Swap2State> {
        let series = self
            .finder
            .find(series_id)
            .ok_or(EngineError::SeriesNotFound(series_id))?;
        let state = self.swap2.place_stone(series.game_id, player_id, x, y)?;
        self.record_opening_result(series_id)?;
        Ok(state)
    }

    /// Records a color choice in the current game's Swap 2 opening. The
    /// real entry point for opening choices: routes through
    /// `Swap2Manager` and refreshes `player1_side`/`player2_side` the
    /// moment the dialogue completes.
    pub fn make_opening_choice(
        &self,
        series_id: Uuid,
        player_id: Uuid,
        choice: StoneChoice,
    ) -> EngineResult<Swap2State> {
        let series = self
            .finder
            .find(series_id)
            .ok_or(EngineError::SeriesNotFound(series_id))?;
        let state = self.swap2.make_choice(series.game_id, player_id, choice)?;
        self.record_opening_result(series_id)?;
        Ok(state)
    }

    /// Refreshes `player1_side`/`player2_side` from the current game's
    /// completed opening. A no-op unless the embedded Swap 2 dialogue
    /// has reached `complete`. Called automatically by
    /// `place_opening_stone`/`make_opening_choice`; exposed directly
    /// too, for a caller that drove the opening through `Swap2Manager`
    /// out of band and needs the series record to catch up.
    pub fn record_opening_result(&self, series_id: Uuid) -> EngineResult<Series> {
        let lock = self.lock_for(series_id);
        let _guard = lock.lock().unwrap();

        let mut series = self
            .finder
            .find(series_id)
            .ok_or(EngineError::SeriesNotFound(series_id))?;

        let Some(state) = self.swap2.get_state(series.game_id) else {
            return Ok(series);
        };
        if let Some(assignments) = Swap2Manager::get_final_assignments(&state) {
            series.player1_side = Some(if series.player1_id == assignments.black_player_id {
                PlayerSide::Black
            } else {
                PlayerSide::White
            });
            series.player2_side = Some(if series.player2_id == assignments.black_player_id {
                PlayerSide::Black
            } else {
                PlayerSide::White
            });
            series.swap2_state = Some(state);
            self.saver.save(&series);
        }
        Ok(series)
    }

    /// A rematch request from `player_id` on a completed series. The
    /// first request waits; the second, from the opponent, atomically
    /// consumes both intents and creates the new series.
    pub fn request_rematch(&self, series_id: Uuid, player_id: Uuid) -> EngineResult<RematchOutcome> {
        let series = self
            .finder
            .find(series_id)
            .ok_or(EngineError::SeriesNotFound(series_id))?;
        if series.status != SeriesStatus::Completed {
            return Err(EngineError::InvalidState(format!(
                "series {series_id} is not completed"
            )));
        }
        if !series.is_participant(player_id) {
            return Err(EngineError::Unauthorized(player_id));
        }

        let mut intents = self.rematch_intents.write().unwrap();
        match intents.remove(&series_id) {
            Some(existing) if existing != player_id => {
                drop(intents);
                let new_series = self.create_series(series.player1_id, series.player2_id)?;
                log::info!(
                    "series {series_id}: rematch agreed by both players, new series {}",
                    new_series.id
                );
                Ok(RematchOutcome::Created(new_series))
            }
            Some(existing) => {
                // Same player asking again — still waiting.
                intents.insert(series_id, existing);
                Ok(RematchOutcome::WaitingForOpponent)
            }
            None => {
                intents.insert(series_id, player_id);
                Ok(RematchOutcome::WaitingForOpponent)
            }
        }
    }

    fn credit_win(&self, series: &mut Series, winner_id: Uuid) {
        if winner_id == series.player1_id {
            series.player1_wins += 1;
        } else {
            series.player2_wins += 1;
        }
    }

    fn finalize_or_advance(&self, series: &mut Series) -> EngineResult<EndGameOutcome> {
        if series.player1_wins >= series.games_to_win || series.player2_wins >= series.games_to_win
        {
            let winner_id = if series.player1_wins > series.player2_wins {
                series.player1_id
            } else {
                series.player2_id
            };
            series.status = SeriesStatus::Completed;
            series.winner_id = Some(winner_id);
            series.final_score = Some(format!("{}-{}", series.player1_wins, series.player2_wins));
            series.ended_at = Some(self.time.now());
            series.loser_mp_change = Some(STANDARD_LOSS_MP);
            self.swap2.clear_state(series.game_id);
            series.swap2_state = None;

            log::info!(
                "series {}: completed, winner {winner_id}, score {}",
                series.id,
                series.final_score.as_deref().unwrap_or("?")
            );

            Ok(EndGameOutcome {
                series: series.clone(),
                is_complete: true,
                next_game_ready: false,
                swap2_state: None,
                game_id: None,
            })
        } else {
            self.advance_to_next_game(series)?;
            Ok(EndGameOutcome {
                series: series.clone(),
                is_complete: false,
                next_game_ready: true,
                swap2_state: series.swap2_state.clone(),
                game_id: Some(series.game_id),
            })
        }
    }

    fn advance_to_next_game(&self, series: &mut Series) -> EngineResult<()> {
        self.swap2.clear_state(series.game_id);
        series.current_game += 1;
        let new_game_id = Uuid::new_v4();
        let new_state = self
            .swap2
            .initialize_swap2(new_game_id, series.player1_id, series.player2_id)?;
        series.game_id = new_game_id;
        series.swap2_state = Some(new_state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryPlayerDirectory, InMemorySeriesStore, ManualTimeProvider};

    fn setup() -> (SeriesManager, Uuid, Uuid) {
        let swap2 = Arc::new(Swap2Manager::new(Arc::new(ManualTimeProvider::new(0))));
        let players = Arc::new(InMemoryPlayerDirectory::new());
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        players.register(p1, 1200, "Silver");
        players.register(p2, 1250, "Silver");
        let store = Arc::new(InMemorySeriesStore::new());
        let time = Arc::new(ManualTimeProvider::new(1_000_000));
        let manager = SeriesManager::new(swap2, players, store.clone(), store, time);
        (manager, p1, p2)
    }

    #[test]
    fn create_series_stamps_initial_ratings() {
        let (mgr, p1, p2) = setup();
        let series = mgr.create_series(p1, p2).unwrap();
        assert_eq!(series.player1_initial_mp, 1200);
        assert_eq!(series.player2_initial_mp, 1250);
        assert_eq!(series.current_game, 1);
        assert_eq!(series.status, SeriesStatus::InProgress);
        assert!(series.swap2_state.is_some());
    }

    #[test]
    fn completed_opening_populates_player_sides() {
        let (mgr, p1, p2) = setup();
        let series = mgr.create_series(p1, p2).unwrap();
        assert!(series.player1_side.is_none());
        assert!(series.player2_side.is_none());

        mgr.place_opening_stone(series.id, p1, 7, 7).unwrap();
        mgr.place_opening_stone(series.id, p1, 7, 8).unwrap();
        mgr.place_opening_stone(series.id, p1, 8, 7).unwrap();
        let state = mgr
            .make_opening_choice(series.id, p2, StoneChoice::Black)
            .unwrap();
        assert!(Swap2Manager::is_complete(&state));

        let refreshed = mgr.get_series_state(series.id).unwrap().series;
        assert_eq!(refreshed.player1_side, Some(PlayerSide::White));
        assert_eq!(refreshed.player2_side, Some(PlayerSide::Black));
    }

    #[test]
    fn rejects_equal_players() {
        let (mgr, p1, _p2) = setup();
        let err = mgr.create_series(p1, p1).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn end_game_advances_then_completes() {
        let (mgr, p1, p2) = setup();
        let series = mgr.create_series(p1, p2).unwrap();

        let outcome = mgr.end_game(series.id, Uuid::new_v4(), p1, 120).unwrap();
        assert!(!outcome.is_complete);
        assert!(outcome.next_game_ready);
        assert_eq!(outcome.series.current_game, 2);
        assert_eq!(outcome.series.player1_wins, 1);

        let outcome = mgr.end_game(series.id, Uuid::new_v4(), p1, 90).unwrap();
        assert!(outcome.is_complete);
        assert_eq!(outcome.series.status, SeriesStatus::Completed);
        assert_eq!(outcome.series.winner_id, Some(p1));
        assert_eq!(outcome.series.final_score.as_deref(), Some("2-0"));
        assert_eq!(outcome.series.loser_mp_change, Some(STANDARD_LOSS_MP));
    }

    #[test]
    fn abandon_terminates_regardless_of_score_matches_scenario_5() {
        let (mgr, p1, p2) = setup();
        let series = mgr.create_series(p1, p2).unwrap();
        let outcome = mgr.abandon_series(series.id, p1).unwrap();
        assert_eq!(outcome.series.status, SeriesStatus::Abandoned);
        assert_eq!(outcome.winner_id, p2);
        assert_eq!(outcome.loser_id, p1);
        assert_eq!(outcome.series.loser_mp_change, Some(-25));
    }

    #[test]
    fn rematch_handshake_matches_scenario_6() {
        let (mgr, p1, p2) = setup();
        let series = mgr.create_series(p1, p2).unwrap();
        mgr.end_game(series.id, Uuid::new_v4(), p1, 1).unwrap();
        mgr.end_game(series.id, Uuid::new_v4(), p1, 1).unwrap();

        let first = mgr.request_rematch(series.id, p1).unwrap();
        assert_eq!(first, RematchOutcome::WaitingForOpponent);

        let second = mgr.request_rematch(series.id, p2).unwrap();
        match second {
            RematchOutcome::Created(new_series) => {
                assert_ne!(new_series.id, series.id);
                assert_eq!(new_series.player1_id, p1);
                assert_eq!(new_series.player2_id, p2);
                assert_eq!(new_series.player1_wins, 0);
                assert_eq!(new_series.player2_wins, 0);
                assert_eq!(new_series.current_game, 1);
                assert_eq!(new_series.status, SeriesStatus::InProgress);
                assert!(new_series.winner_id.is_none());
                assert!(new_series.final_score.is_none());
            }
            other => panic!("expected Created, got {other:?}"),
        }
    }

    #[test]
    fn rematch_rejected_on_non_completed_series() {
        let (mgr, p1, p2) = setup();
        let series = mgr.create_series(p1, p2).unwrap();
        let err = mgr.request_rematch(series.id, p1).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn rematch_rejected_for_non_participant() {
        let (mgr, p1, p2) = setup();
        let series = mgr.create_series(p1, p2).unwrap();
        mgr.end_game(series.id, Uuid::new_v4(), p1, 1).unwrap();
        mgr.end_game(series.id, Uuid::new_v4(), p1, 1).unwrap();

        let stranger = Uuid::new_v4();
        let err = mgr.request_rematch(series.id, stranger).unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized(_)));
    }

    #[test]
    fn forfeit_current_game_is_unauthorized_for_non_participant() {
        let (mgr, p1, p2) = setup();
        let series = mgr.create_series(p1, p2).unwrap();
        let stranger = Uuid::new_v4();
        let err = mgr.forfeit_current_game(series.id, stranger).unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized(_)));
    }
}
