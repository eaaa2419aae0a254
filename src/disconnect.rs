//! Disconnect/forfeit watchdog.
//!
//! This handler carries no clock or scheduler of its own — it is
//! purely a poll target. Something external (a connection handler, a
//! cron-like task) is expected to call [`DisconnectHandler::check_timeout`]
//! at least once a second per disconnected series; nothing here sleeps
//! or spawns a timer.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collaborators::TimeProvider;
use crate::error::EngineResult;
use crate::series::{AbandonOutcome, EndGameOutcome, SeriesManager};

/// Grace period before a disconnect becomes a forfeit.
pub const TIMEOUT_SECONDS: i64 = 60;

/// An active disconnect for a series. At most one per series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectState {
    pub series_id: Uuid,
    pub disconnected_player_id: Uuid,
    pub disconnected_at: i64,
}

/// Response to `handleDisconnect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectAck {
    pub status: PauseStatus,
    pub disconnected_player_id: Uuid,
    pub remaining_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseStatus {
    Paused,
}

/// Response to `checkTimeout`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutCheck {
    pub has_timeout: bool,
    pub forfeited: bool,
    pub forfeiting_player_id: Option<Uuid>,
    pub outcome: Option<EndGameOutcome>,
}

impl TimeoutCheck {
    fn none() -> Self {
        Self {
            has_timeout: false,
            forfeited: false,
            forfeiting_player_id: None,
            outcome: None,
        }
    }
}

/// Times out disconnects and forfeits the current game through a
/// [`SeriesManager`] when a player fails to reconnect within
/// [`TIMEOUT_SECONDS`].
pub struct DisconnectHandler {
    series: Arc<SeriesManager>,
    time: Arc<dyn TimeProvider>,
    disconnects: RwLock<HashMap<Uuid, DisconnectState>>,
}

impl DisconnectHandler {
    pub fn new(series: Arc<SeriesManager>, time: Arc<dyn TimeProvider>) -> Self {
        Self {
            series,
            time,
            disconnects: RwLock::new(HashMap::new()),
        }
    }

    /// Records a disconnect. Idempotent for repeated calls by the same
    /// player; a later call from a different player overwrites it.
    pub fn handle_disconnect(&self, series_id: Uuid, player_id: Uuid) -> DisconnectAck {
        let now = self.time.now();
        self.disconnects.write().unwrap().insert(
            series_id,
            DisconnectState {
                series_id,
                disconnected_player_id: player_id,
                disconnected_at: now,
            },
        );
        log::warn!("series {series_id}: player {player_id} disconnected");
        DisconnectAck {
            status: PauseStatus::Paused,
            disconnected_player_id: player_id,
            remaining_seconds: TIMEOUT_SECONDS,
        }
    }

    /// Returns `true` if no forfeit-pending condition remains for this
    /// player: no-op cases (no active disconnect, or the reconnecting
    /// player wasn't the one who disconnected) both return `true`.
    pub fn handle_reconnect(&self, series_id: Uuid, player_id: Uuid) -> bool {
        let mut disconnects = self.disconnects.write().unwrap();
        let Some(state) = disconnects.get(&series_id) else {
            return true;
        };
        if state.disconnected_player_id != player_id {
            return true;
        }

        let elapsed = self.time.now() - state.disconnected_at;
        if elapsed < TIMEOUT_SECONDS {
            disconnects.remove(&series_id);
            log::info!("series {series_id}: player {player_id} reconnected in time");
            true
        } else {
            false
        }
    }

    pub fn get_remaining_timeout(&self, series_id: Uuid) -> Option<i64> {
        let state = *self.disconnects.read().unwrap().get(&series_id)?;
        Some(TIMEOUT_SECONDS - (self.time.now() - state.disconnected_at))
    }

    pub fn is_player_disconnected(&self, series_id: Uuid, player_id: Uuid) -> bool {
        self.disconnects
            .read()
            .unwrap()
            .get(&series_id)
            .is_some_and(|state| state.disconnected_player_id == player_id)
    }

    /// Polls a series' disconnect state. Forfeits the current game
    /// through the series manager if the grace period has elapsed.
    pub fn check_timeout(&self, series_id: Uuid) -> EngineResult<TimeoutCheck> {
        let state = {
            let disconnects = self.disconnects.read().unwrap();
            match disconnects.get(&series_id) {
                Some(state) => *state,
                None => return Ok(TimeoutCheck::none()),
            }
        };

        let elapsed = self.time.now() - state.disconnected_at;
        if elapsed <= TIMEOUT_SECONDS {
            return Ok(TimeoutCheck::none());
        }

        self.disconnects.write().unwrap().remove(&series_id);
        let outcome = self
            .series
            .forfeit_current_game(series_id, state.disconnected_player_id)?;
        log::warn!(
            "series {series_id}: player {} timed out, forfeiting",
            state.disconnected_player_id
        );

        Ok(TimeoutCheck {
            has_timeout: true,
            forfeited: true,
            forfeiting_player_id: Some(state.disconnected_player_id),
            outcome: Some(outcome),
        })
    }

    /// Delegates to `SeriesManager::abandon_series` and clears any
    /// disconnect state for the series.
    pub fn handle_abandon(&self, series_id: Uuid, player_id: Uuid) -> EngineResult<AbandonOutcome> {
        let outcome = self.series.abandon_series(series_id, player_id)?;
        self.disconnects.write().unwrap().remove(&series_id);
        Ok(outcome)
    }
}
