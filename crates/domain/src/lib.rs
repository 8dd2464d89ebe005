//! Domain layer for the plate game.
//!
//! This crate provides the core domain abstractions including:
//! - DomainEvent trait for facts raised during business operations
//! - AggregateRoot trait and the PendingEvents accumulator
//! - Game aggregate implementation with its events

pub mod aggregate;
pub mod event;
pub mod game;

pub use aggregate::{AggregateRoot, PendingEvents};
pub use event::DomainEvent;
pub use game::{
    Game, GameEnded, GameError, GameStarted, LicensePlateSpotsRemoved, LicensePlatesSpotted,
    MAX_GAME_NAME_LEN, PlateKey, PlateSpot, SpotChanges,
};
