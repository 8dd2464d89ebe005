//! Shared types for the plate game core.
//!
//! - Typed identifiers for aggregates and players
//! - [`Outcome`], the success/failure container every command returns

pub mod ids;
pub mod outcome;

pub use ids::{AggregateId, PlayerId};
pub use outcome::{Failure, Outcome, OutcomeExt, ValidationFailure};
