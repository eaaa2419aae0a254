//! Error taxonomy for the Swap2/series/disconnect engine.
//!
//! Every fallible engine operation returns one of these kinds so a
//! caller — whatever transport layer sits on top of this crate — can
//! match on the failure mode rather than parsing a message string.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A single stable error code, independent of the human-readable message.
///
/// Mirrors the representative HTTP error codes in the engine's
/// specification (`VALIDATION_ERROR`, `SERIES_NOT_FOUND`, ...) without
/// this crate depending on an HTTP framework to produce them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    InvalidState,
    InvalidActor,
    InvalidPosition,
    Unauthorized,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::InvalidActor => "INVALID_ACTOR",
            ErrorCode::InvalidPosition => "INVALID_POSITION",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
        };
        write!(f, "{s}")
    }
}

/// All the ways an engine operation can fail.
///
/// Partial mutations are forbidden: every operation that returns one
/// of these leaves the engine's state exactly as it was before the
/// call.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("series {0} not found")]
    SeriesNotFound(Uuid),

    #[error("game {0} not found")]
    GameNotFound(Uuid),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("player {actor} is not the active player (expected {expected})")]
    InvalidActor { expected: Uuid, actor: Uuid },

    #[error("invalid position ({x}, {y}): {reason}")]
    InvalidPosition { x: i32, y: i32, reason: String },

    #[error("player {0} is not a participant in this series")]
    Unauthorized(Uuid),
}

impl EngineError {
    /// The stable error code a transport layer would map to an HTTP status.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Validation(_) => ErrorCode::ValidationError,
            EngineError::SeriesNotFound(_) | EngineError::GameNotFound(_) => ErrorCode::NotFound,
            EngineError::InvalidState(_) => ErrorCode::InvalidState,
            EngineError::InvalidActor { .. } => ErrorCode::InvalidActor,
            EngineError::InvalidPosition { .. } => ErrorCode::InvalidPosition,
            EngineError::Unauthorized(_) => ErrorCode::Unauthorized,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
