pub mod recording;
pub mod trait_def;

pub use recording::{PlayCall, RecordingPlayer};
pub use trait_def::*;

use thiserror::Error;

/// Errors reported by an instrument player for a single note
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Note rejected by player: {0}")]
    Rejected(String),

    #[error("Player output is disconnected")]
    Disconnected,
}

pub type PlayerResult<T> = Result<T, PlayerError>;
