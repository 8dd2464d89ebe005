//! Game aggregate and related types.

mod aggregate;
mod events;
mod value_objects;

pub use aggregate::{Game, MAX_GAME_NAME_LEN, SpotChanges};
pub use events::{GameEnded, GameStarted, LicensePlateSpotsRemoved, LicensePlatesSpotted};
pub use value_objects::{PlateKey, PlateSpot};

use common::{Failure, PlayerId};
use thiserror::Error;

/// Rule violations raised by the game aggregate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    /// The game already ended.
    #[error("Game is no longer active")]
    InactiveGame,

    /// The player is neither the owner nor an invited player.
    #[error("Player {player_id} is not part of this game")]
    UninvitedPlayer { player_id: PlayerId },

    /// The player was already invited.
    #[error("Player {player_id} is already part of this game")]
    AlreadyInvited { player_id: PlayerId },

    /// The player already owns a game that has not ended.
    #[error("Player {player_id} already has an active game")]
    ActiveGameExists { player_id: PlayerId },
}

impl From<GameError> for Failure {
    fn from(e: GameError) -> Self {
        Failure::new(e.to_string())
    }
}
