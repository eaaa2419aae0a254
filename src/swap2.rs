//! Swap 2 opening dialogue state machine.
//!
//! Swap 2 decides who plays Black for a single game: the opener (P1)
//! places three tentative stones, then the other player (P2) either
//! names a color or asks P1 to place two more stones before naming
//! one. This module owns exactly that dialogue — nothing about the
//! main game's board or move legality is modeled here.
//!
//! The state machine has five phases and exactly the transitions in
//! the table below; every other transition is rejected with
//! `InvalidState`.
//!
//! ```text
//! placement --[3rd stone]--> choice
//! choice    --[black|white]--> complete
//! choice    --[place_more]--> extra
//! extra     --[5th stone]--> final_choice
//! final_choice --[black|white]--> complete
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collaborators::{SystemTimeProvider, TimeProvider};
use crate::error::{EngineError, EngineResult};

/// Board extent for the Swap 2 opening: coordinates in `0..=BOARD_MAX`.
pub const BOARD_MAX: i32 = 14;

/// One of the five phases of the opening dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Placement,
    Choice,
    Extra,
    FinalChoice,
    Complete,
}

/// A color token named during the `choice` or `final_choice` phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoneChoice {
    Black,
    White,
    PlaceMore,
}

/// A single tentative stone placed during the opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StonePlacement {
    pub x: i32,
    pub y: i32,
    pub placed_by: Uuid,
    /// 1-based, strictly increasing, dense over the placements made so far.
    pub placement_order: u32,
    pub phase_when_placed: Phase,
}

/// What a single audit-log entry carries beyond actor and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionPayload {
    Place { x: i32, y: i32 },
    Choice { choice: StoneChoice },
}

/// One entry in the append-only action log. Total, insertion-preserving order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub actor: Uuid,
    pub payload: ActionPayload,
    pub timestamp: i64,
}

/// The color assignment once the opening has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAssignments {
    pub black_player_id: Uuid,
    pub white_player_id: Uuid,
    /// Equal to `black_player_id` — Black moves first in the main game.
    pub first_mover: Uuid,
}

/// Everything worth showing about a completed opening: the full
/// audit trail plus the resulting assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swap2History {
    pub actions: Vec<ActionLogEntry>,
    pub tentative_stones: Vec<StonePlacement>,
    pub final_choice: StoneChoice,
    pub final_assignment: FinalAssignments,
}

/// The full state of one game's Swap 2 opening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Swap2State {
    pub game_id: Uuid,
    /// The opener, by convention.
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub phase: Phase,
    pub active_player_id: Uuid,
    pub tentative_stones: Vec<StonePlacement>,
    pub actions: Vec<ActionLogEntry>,
    pub black_player_id: Option<Uuid>,
    pub white_player_id: Option<Uuid>,
    /// The color token that ended the dialogue, if any.
    pub final_choice: Option<StoneChoice>,
}

impl Swap2State {
    pub fn stone_count(&self) -> usize {
        self.tentative_stones.len()
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    fn opponent_of(&self, player_id: Uuid) -> Uuid {
        if player_id == self.player1_id {
            self.player2_id
        } else {
            self.player1_id
        }
    }
}

/// Owns every active game's Swap 2 state and drives it through its
/// phases. One manager is shared by the whole process; individual
/// games are independently lockable so unrelated games never contend.
pub struct Swap2Manager {
    states: RwLock<HashMap<Uuid, Mutex<Swap2State>>>,
    time: Arc<dyn TimeProvider>,
}

impl Default for Swap2Manager {
    fn default() -> Self {
        Self::new(Arc::new(SystemTimeProvider))
    }
}

impl Swap2Manager {
    pub fn new(time: Arc<dyn TimeProvider>) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            time,
        }
    }

    fn with_state<R>(
        &self,
        game_id: Uuid,
        f: impl FnOnce(&mut Swap2State) -> EngineResult<R>,
    ) -> EngineResult<R> {
        let map = self.states.read().unwrap();
        let cell = map
            .get(&game_id)
            .ok_or(EngineError::GameNotFound(game_id))?;
        let mut guard = cell.lock().unwrap();
        f(&mut guard)
    }

    /// Creates a fresh opening for `game_id` between two distinct players.
    pub fn initialize_swap2(
        &self,
        game_id: Uuid,
        player1_id: Uuid,
        player2_id: Uuid,
    ) -> EngineResult<Swap2State> {
        if player1_id == player2_id {
            return Err(EngineError::Validation(
                "player1 and player2 must be distinct".to_string(),
            ));
        }

        let state = Swap2State {
            game_id,
            player1_id,
            player2_id,
            phase: Phase::Placement,
            active_player_id: player1_id,
            tentative_stones: Vec::new(),
            actions: Vec::new(),
            black_player_id: None,
            white_player_id: None,
            final_choice: None,
        };

        self.states
            .write()
            .unwrap()
            .insert(game_id, Mutex::new(state.clone()));

        log::debug!("swap2 {}: initialized, P1={} to place", game_id, player1_id);
        Ok(state)
    }

    /// Places a tentative stone for the active player.
    pub fn place_stone(
        &self,
        game_id: Uuid,
        player_id: Uuid,
        x: i32,
        y: i32,
    ) -> EngineResult<Swap2State> {
        if !(0..=BOARD_MAX).contains(&x) || !(0..=BOARD_MAX).contains(&y) {
            return Err(EngineError::InvalidPosition {
                x,
                y,
                reason: format!("coordinates must be within 0..={BOARD_MAX}"),
            });
        }

        self.with_state(game_id, |state| {
            if !matches!(state.phase, Phase::Placement | Phase::Extra) {
                return Err(EngineError::InvalidState(format!(
                    "cannot place a stone in phase {:?}",
                    state.phase
                )));
            }
            if state.active_player_id != player_id {
                return Err(EngineError::InvalidActor {
                    expected: state.active_player_id,
                    actor: player_id,
                });
            }
            if state.tentative_stones.iter().any(|s| s.x == x && s.y == y) {
                return Err(EngineError::InvalidPosition {
                    x,
                    y,
                    reason: "position already occupied by a tentative stone".to_string(),
                });
            }

            let placement_order = state.tentative_stones.len() as u32 + 1;
            state.tentative_stones.push(StonePlacement {
                x,
                y,
                placed_by: player_id,
                placement_order,
                phase_when_placed: state.phase,
            });
            state.actions.push(ActionLogEntry {
                actor: player_id,
                payload: ActionPayload::Place { x, y },
                timestamp: self.time.now(),
            });

            match (state.phase, state.tentative_stones.len()) {
                (Phase::Placement, 3) => {
                    state.phase = Phase::Choice;
                    state.active_player_id = state.player2_id;
                }
                (Phase::Extra, 5) => {
                    state.phase = Phase::FinalChoice;
                    state.active_player_id = state.player1_id;
                }
                _ => {}
            }

            Ok(())
        })?;

        Ok(self.get_state(game_id).expect("state present after mutation"))
    }

    /// Records a color choice (or a request for two more stones).
    pub fn make_choice(
        &self,
        game_id: Uuid,
        player_id: Uuid,
        choice: StoneChoice,
    ) -> EngineResult<Swap2State> {
        self.with_state(game_id, |state| {
            if state.active_player_id != player_id {
                return Err(EngineError::InvalidActor {
                    expected: state.active_player_id,
                    actor: player_id,
                });
            }

            match state.phase {
                Phase::Choice => match choice {
                    StoneChoice::Black => Self::assign_and_complete(state, player_id, true),
                    StoneChoice::White => Self::assign_and_complete(state, player_id, false),
                    StoneChoice::PlaceMore => {
                        state.phase = Phase::Extra;
                        state.active_player_id = player_id;
                    }
                },
                Phase::FinalChoice => match choice {
                    StoneChoice::Black => Self::assign_and_complete(state, player_id, true),
                    StoneChoice::White => Self::assign_and_complete(state, player_id, false),
                    StoneChoice::PlaceMore => {
                        return Err(EngineError::InvalidState(
                            "place_more is not a valid choice in final_choice".to_string(),
                        ));
                    }
                },
                other => {
                    return Err(EngineError::InvalidState(format!(
                        "cannot make a choice in phase {other:?}"
                    )));
                }
            }

            state.actions.push(ActionLogEntry {
                actor: player_id,
                payload: ActionPayload::Choice { choice },
                timestamp: self.time.now(),
            });

            Ok(())
        })?;

        Ok(self.get_state(game_id).expect("state present after mutation"))
    }

    /// The caller of `choice` always takes the color they named.
    fn assign_and_complete(state: &mut Swap2State, chooser: Uuid, chooser_is_black: bool) {
        let opponent = state.opponent_of(chooser);
        if chooser_is_black {
            state.black_player_id = Some(chooser);
            state.white_player_id = Some(opponent);
            state.final_choice = Some(StoneChoice::Black);
        } else {
            state.white_player_id = Some(chooser);
            state.black_player_id = Some(opponent);
            state.final_choice = Some(StoneChoice::White);
        }
        state.phase = Phase::Complete;
    }

    /// Returns the black/white/first-mover assignment, defined only
    /// once the opening has completed.
    pub fn get_final_assignments(state: &Swap2State) -> Option<FinalAssignments> {
        if state.phase != Phase::Complete {
            return None;
        }
        let black_player_id = state.black_player_id?;
        let white_player_id = state.white_player_id?;
        Some(FinalAssignments {
            black_player_id,
            white_player_id,
            first_mover: black_player_id,
        })
    }

    pub fn is_complete(state: &Swap2State) -> bool {
        state.is_complete()
    }

    /// The full audit trail and resulting assignment, once complete.
    pub fn get_swap2_history(state: &Swap2State) -> Option<Swap2History> {
        let final_assignment = Self::get_final_assignments(state)?;
        let final_choice = state.final_choice?;
        Some(Swap2History {
            actions: state.actions.clone(),
            tentative_stones: state.tentative_stones.clone(),
            final_choice,
            final_assignment,
        })
    }

    pub fn serialize_state(state: &Swap2State) -> EngineResult<String> {
        serde_json::to_string(state)
            .map_err(|e| EngineError::Validation(format!("failed to serialize swap2 state: {e}")))
    }

    pub fn deserialize_state(blob: &str) -> EngineResult<Swap2State> {
        serde_json::from_str(blob)
            .map_err(|e| EngineError::Validation(format!("failed to deserialize swap2 state: {e}")))
    }

    /// Restores a previously-serialized state into the registry, e.g.
    /// after a player reconnects mid-opening.
    pub fn restore_state_for_reconnection(&self, blob: &str) -> EngineResult<Swap2State> {
        let state = Self::deserialize_state(blob)?;
        self.states
            .write()
            .unwrap()
            .insert(state.game_id, Mutex::new(state.clone()));
        Ok(state)
    }

    pub fn get_state(&self, game_id: Uuid) -> Option<Swap2State> {
        self.states
            .read()
            .unwrap()
            .get(&game_id)
            .map(|cell| cell.lock().unwrap().clone())
    }

    pub fn clear_state(&self, game_id: Uuid) -> Option<Swap2State> {
        self.states
            .write()
            .unwrap()
            .remove(&game_id)
            .map(|cell| cell.into_inner().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> Swap2Manager {
        Swap2Manager::new(Arc::new(SystemTimeProvider))
    }

    #[test]
    fn rejects_identical_players() {
        let mgr = manager();
        let p = Uuid::new_v4();
        let err = mgr.initialize_swap2(Uuid::new_v4(), p, p).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn direct_choice_black_matches_scenario_1() {
        let mgr = manager();
        let game_id = Uuid::new_v4();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        mgr.initialize_swap2(game_id, p1, p2).unwrap();

        mgr.place_stone(game_id, p1, 7, 7).unwrap();
        mgr.place_stone(game_id, p1, 7, 8).unwrap();
        let state = mgr.place_stone(game_id, p1, 8, 7).unwrap();
        assert_eq!(state.phase, Phase::Choice);
        assert_eq!(state.active_player_id, p2);

        let state = mgr.make_choice(game_id, p2, StoneChoice::Black).unwrap();
        assert_eq!(state.black_player_id, Some(p2));
        assert_eq!(state.white_player_id, Some(p1));
        assert_eq!(state.actions.len(), 4);
        assert!(Swap2Manager::is_complete(&state));

        let assignments = Swap2Manager::get_final_assignments(&state).unwrap();
        assert_eq!(assignments.first_mover, p2);
    }

    #[test]
    fn place_more_then_white_matches_scenario_2() {
        let mgr = manager();
        let game_id = Uuid::new_v4();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        mgr.initialize_swap2(game_id, p1, p2).unwrap();

        mgr.place_stone(game_id, p1, 7, 7).unwrap();
        mgr.place_stone(game_id, p1, 7, 8).unwrap();
        mgr.place_stone(game_id, p1, 8, 7).unwrap();

        let state = mgr
            .make_choice(game_id, p2, StoneChoice::PlaceMore)
            .unwrap();
        assert_eq!(state.phase, Phase::Extra);
        assert_eq!(state.active_player_id, p2);

        mgr.place_stone(game_id, p2, 8, 8).unwrap();
        let state = mgr.place_stone(game_id, p2, 9, 9).unwrap();
        assert_eq!(state.phase, Phase::FinalChoice);
        assert_eq!(state.active_player_id, p1);

        let state = mgr.make_choice(game_id, p1, StoneChoice::White).unwrap();
        assert_eq!(state.black_player_id, Some(p2));
        assert_eq!(state.white_player_id, Some(p1));
        assert_eq!(state.actions.len(), 7);

        let assignments = Swap2Manager::get_final_assignments(&state).unwrap();
        assert_eq!(assignments.first_mover, p2);
    }

    #[test]
    fn final_choice_rejects_place_more() {
        let mgr = manager();
        let game_id = Uuid::new_v4();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        mgr.initialize_swap2(game_id, p1, p2).unwrap();
        mgr.place_stone(game_id, p1, 0, 0).unwrap();
        mgr.place_stone(game_id, p1, 1, 0).unwrap();
        mgr.place_stone(game_id, p1, 2, 0).unwrap();
        mgr.make_choice(game_id, p2, StoneChoice::PlaceMore).unwrap();
        mgr.place_stone(game_id, p2, 3, 0).unwrap();
        mgr.place_stone(game_id, p2, 4, 0).unwrap();

        let err = mgr
            .make_choice(game_id, p1, StoneChoice::PlaceMore)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn rejects_wrong_actor_and_occupied_and_out_of_bounds() {
        let mgr = manager();
        let game_id = Uuid::new_v4();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        mgr.initialize_swap2(game_id, p1, p2).unwrap();

        let err = mgr.place_stone(game_id, p2, 0, 0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidActor { .. }));

        mgr.place_stone(game_id, p1, 0, 0).unwrap();
        let err = mgr.place_stone(game_id, p1, 0, 0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPosition { .. }));

        let err = mgr.place_stone(game_id, p1, 15, 0).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPosition { .. }));
    }

    #[test]
    fn serialize_round_trips_identically() {
        let mgr = manager();
        let game_id = Uuid::new_v4();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        mgr.initialize_swap2(game_id, p1, p2).unwrap();
        mgr.place_stone(game_id, p1, 7, 7).unwrap();
        mgr.place_stone(game_id, p1, 7, 8).unwrap();
        let state = mgr.place_stone(game_id, p1, 8, 7).unwrap();

        let blob = Swap2Manager::serialize_state(&state).unwrap();
        let restored = Swap2Manager::deserialize_state(&blob).unwrap();
        assert_eq!(state, restored);
    }

    #[test]
    fn restore_for_reconnection_reinserts_into_registry() {
        let mgr = manager();
        let game_id = Uuid::new_v4();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        mgr.initialize_swap2(game_id, p1, p2).unwrap();
        let state = mgr.place_stone(game_id, p1, 3, 3).unwrap();
        let blob = Swap2Manager::serialize_state(&state).unwrap();

        mgr.clear_state(game_id);
        assert!(mgr.get_state(game_id).is_none());

        let restored = mgr.restore_state_for_reconnection(&blob).unwrap();
        assert_eq!(restored, state);
        assert_eq!(mgr.get_state(game_id), Some(state));
    }

    #[test]
    fn history_undefined_until_complete() {
        let mgr = manager();
        let game_id = Uuid::new_v4();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();
        let state = mgr.initialize_swap2(game_id, p1, p2).unwrap();
        assert!(Swap2Manager::get_swap2_history(&state).is_none());
    }
}
