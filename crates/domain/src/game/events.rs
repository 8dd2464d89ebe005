//! Game domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, PlayerId};
use serde::{Deserialize, Serialize};

use crate::event::DomainEvent;

use super::PlateKey;

/// A new game was started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStarted {
    pub game_id: AggregateId,
    pub name: String,
    pub created_by: PlayerId,
    pub started_on: DateTime<Utc>,
}

/// One or more plates were newly spotted in a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensePlatesSpotted {
    pub game_id: AggregateId,
    pub spotted_by: PlayerId,
    pub plates: Vec<PlateKey>,
    pub spotted_on: DateTime<Utc>,
}

/// Previously spotted plates were removed from a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensePlateSpotsRemoved {
    pub game_id: AggregateId,
    pub removed_by: PlayerId,
    pub plates: Vec<PlateKey>,
}

/// A game was finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEnded {
    pub game_id: AggregateId,
    pub ended_on: DateTime<Utc>,
    pub total_spots: usize,
}

impl DomainEvent for GameStarted {
    fn event_type(&self) -> &'static str {
        "GameStarted"
    }
}

impl DomainEvent for LicensePlatesSpotted {
    fn event_type(&self) -> &'static str {
        "LicensePlatesSpotted"
    }
}

impl DomainEvent for LicensePlateSpotsRemoved {
    fn event_type(&self) -> &'static str {
        "LicensePlateSpotsRemoved"
    }
}

impl DomainEvent for GameEnded {
    fn event_type(&self) -> &'static str {
        "GameEnded"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spotted_event_serializes_plate_keys() {
        let event = LicensePlatesSpotted {
            game_id: AggregateId::new(),
            spotted_by: PlayerId::new(),
            plates: vec![PlateKey::new("US", "CA").unwrap()],
            spotted_on: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["plates"][0]["country"], "US");
        assert_eq!(json["plates"][0]["region"], "CA");
        assert_eq!(json["game_id"], event.game_id.to_string());
    }
}
