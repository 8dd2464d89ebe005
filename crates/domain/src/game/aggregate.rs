//! Game aggregate implementation.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{AggregateId, Outcome, PlayerId, ValidationFailure};

use crate::aggregate::{AggregateRoot, PendingEvents};
use crate::event::DomainEvent;

use super::{
    GameEnded, GameError, GameStarted, LicensePlateSpotsRemoved, LicensePlatesSpotted, PlateKey,
    PlateSpot,
};

/// Longest accepted game name, in characters.
pub const MAX_GAME_NAME_LEN: usize = 64;

/// Game aggregate root.
///
/// A game is owned by the player who started it; invited players may spot
/// plates too. Spotting replaces the full set of spotted plates: plates not
/// yet spotted are added, plates missing from the update are removed.
#[derive(Debug, Clone)]
pub struct Game {
    id: AggregateId,
    name: String,
    created_by: PlayerId,
    invited_players: HashSet<PlayerId>,
    spots: BTreeMap<PlateKey, PlateSpot>,
    is_active: bool,
    started_on: DateTime<Utc>,
    ended_on: Option<DateTime<Utc>>,
    events: PendingEvents,
}

/// Plates added and removed by one spot update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpotChanges {
    pub added: Vec<PlateKey>,
    pub removed: Vec<PlateKey>,
}

impl SpotChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl AggregateRoot for Game {
    fn aggregate_type() -> &'static str {
        "Game"
    }

    fn id(&self) -> AggregateId {
        self.id
    }

    fn domain_events(&self) -> &[Arc<dyn DomainEvent>] {
        self.events.as_slice()
    }
}

// Query methods
impl Game {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_by(&self) -> PlayerId {
        self.created_by
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn started_on(&self) -> DateTime<Utc> {
        self.started_on
    }

    pub fn ended_on(&self) -> Option<DateTime<Utc>> {
        self.ended_on
    }

    /// Returns spotted plates ordered by plate key.
    pub fn spots(&self) -> impl Iterator<Item = &PlateSpot> {
        self.spots.values()
    }

    pub fn spot_count(&self) -> usize {
        self.spots.len()
    }

    /// Returns true if the player owns the game or was invited to it.
    pub fn is_player(&self, player_id: PlayerId) -> bool {
        self.created_by == player_id || self.invited_players.contains(&player_id)
    }

    /// Returns the game as storage hands it back: same state, no pending
    /// events.
    pub fn to_persisted(&self) -> Self {
        Self {
            events: PendingEvents::new(),
            ..self.clone()
        }
    }
}

// Command methods
impl Game {
    /// Starts a new game owned by `created_by`.
    pub fn start(
        name: impl AsRef<str>,
        created_by: PlayerId,
        now: DateTime<Utc>,
    ) -> Outcome<Self> {
        let name = validate_name(name.as_ref(), now)?;

        let mut game = Self {
            id: AggregateId::new(),
            name,
            created_by,
            invited_players: HashSet::new(),
            spots: BTreeMap::new(),
            is_active: true,
            started_on: now,
            ended_on: None,
            events: PendingEvents::new(),
        };

        game.events.record(GameStarted {
            game_id: game.id,
            name: game.name.clone(),
            created_by,
            started_on: now,
        });

        Ok(game)
    }

    /// Invites a player so they can spot plates.
    pub fn invite_player(&mut self, player_id: PlayerId) -> Outcome<()> {
        if !self.is_active {
            return Err(GameError::InactiveGame.into());
        }

        if self.is_player(player_id) {
            return Err(GameError::AlreadyInvited { player_id }.into());
        }

        self.invited_players.insert(player_id);
        Ok(())
    }

    /// Replaces the set of spotted plates.
    ///
    /// Records `LicensePlatesSpotted` when plates were added and
    /// `LicensePlateSpotsRemoved` when plates were removed; an update that
    /// changes nothing records no event.
    pub fn spot_plates(
        &mut self,
        spotted_by: PlayerId,
        plates: impl IntoIterator<Item = PlateKey>,
        now: DateTime<Utc>,
    ) -> Outcome<SpotChanges> {
        if !self.is_active {
            return Err(GameError::InactiveGame.into());
        }

        if !self.is_player(spotted_by) {
            return Err(GameError::UninvitedPlayer {
                player_id: spotted_by,
            }
            .into());
        }

        let requested: BTreeSet<PlateKey> = plates.into_iter().collect();

        let added: Vec<PlateKey> = requested
            .iter()
            .filter(|plate| !self.spots.contains_key(*plate))
            .cloned()
            .collect();
        let removed: Vec<PlateKey> = self
            .spots
            .keys()
            .filter(|plate| !requested.contains(*plate))
            .cloned()
            .collect();

        for plate in &added {
            self.spots.insert(
                plate.clone(),
                PlateSpot {
                    plate: plate.clone(),
                    spotted_by,
                    spotted_on: now,
                },
            );
        }
        for plate in &removed {
            self.spots.remove(plate);
        }

        if !added.is_empty() {
            self.events.record(LicensePlatesSpotted {
                game_id: self.id,
                spotted_by,
                plates: added.clone(),
                spotted_on: now,
            });
        }
        if !removed.is_empty() {
            self.events.record(LicensePlateSpotsRemoved {
                game_id: self.id,
                removed_by: spotted_by,
                plates: removed.clone(),
            });
        }

        Ok(SpotChanges { added, removed })
    }

    /// Ends the game.
    ///
    /// The end time is the time of the latest spot, or the start time when
    /// nothing was spotted.
    pub fn end_game(&mut self) -> Outcome<DateTime<Utc>> {
        if !self.is_active {
            return Err(GameError::InactiveGame.into());
        }

        let ended_on = self
            .spots
            .values()
            .map(|spot| spot.spotted_on)
            .max()
            .unwrap_or(self.started_on);

        self.is_active = false;
        self.ended_on = Some(ended_on);

        self.events.record(GameEnded {
            game_id: self.id,
            ended_on,
            total_spots: self.spots.len(),
        });

        Ok(ended_on)
    }
}

/// Blank names default to the start time in RFC 3339.
fn validate_name(name: &str, now: DateTime<Utc>) -> Outcome<String> {
    let name = name.trim();

    if name.is_empty() {
        return Ok(now.to_rfc3339());
    }

    if name.chars().count() > MAX_GAME_NAME_LEN {
        return Err(ValidationFailure::single(
            "name",
            format!("Game name must be at most {MAX_GAME_NAME_LEN} characters"),
        )
        .into());
    }

    Ok(name.to_string())
}
