//! Read-side tally of spotted plates, fed by game events.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{GameEnded, GameStarted, LicensePlateSpotsRemoved, LicensePlatesSpotted};
use message_bus::{DomainEventHandler, HandlerError};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Current tally of one game.
///
/// Events of one game may be handled in any order, so additions and
/// removals are counted separately and only combined on read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameTally {
    pub name: String,
    pub added: usize,
    pub removed: usize,
    pub final_spots: Option<usize>,
}

impl GameTally {
    /// Plates currently spotted.
    pub fn spotted(&self) -> usize {
        self.final_spots
            .unwrap_or_else(|| self.added.saturating_sub(self.removed))
    }

    pub fn is_finished(&self) -> bool {
        self.final_spots.is_some()
    }
}

/// Shared per-game tallies.
#[derive(Debug, Clone, Default)]
pub struct Scoreboard {
    games: Arc<RwLock<HashMap<AggregateId, GameTally>>>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn tally(&self, game_id: AggregateId) -> Option<GameTally> {
        self.games.read().await.get(&game_id).cloned()
    }

    pub async fn game_count(&self) -> usize {
        self.games.read().await.len()
    }
}

/// Keeps the [`Scoreboard`] up to date.
///
/// Registered per event: each dispatch builds its own updater over the
/// shared scoreboard.
#[derive(Debug, Clone)]
pub struct ScoreboardUpdater {
    scoreboard: Scoreboard,
}

impl ScoreboardUpdater {
    pub fn new(scoreboard: Scoreboard) -> Self {
        Self { scoreboard }
    }
}

#[async_trait]
impl DomainEventHandler<GameStarted> for ScoreboardUpdater {
    fn name(&self) -> &'static str {
        "ScoreboardUpdater"
    }

    async fn handle(&self, event: &GameStarted, _cancel: &CancellationToken) -> Result<(), HandlerError> {
        let mut games = self.scoreboard.games.write().await;
        games.entry(event.game_id).or_default().name = event.name.clone();
        Ok(())
    }
}

#[async_trait]
impl DomainEventHandler<LicensePlatesSpotted> for ScoreboardUpdater {
    fn name(&self) -> &'static str {
        "ScoreboardUpdater"
    }

    async fn handle(
        &self,
        event: &LicensePlatesSpotted,
        _cancel: &CancellationToken,
    ) -> Result<(), HandlerError> {
        let mut games = self.scoreboard.games.write().await;
        games.entry(event.game_id).or_default().added += event.plates.len();
        Ok(())
    }
}

#[async_trait]
impl DomainEventHandler<LicensePlateSpotsRemoved> for ScoreboardUpdater {
    fn name(&self) -> &'static str {
        "ScoreboardUpdater"
    }

    async fn handle(
        &self,
        event: &LicensePlateSpotsRemoved,
        _cancel: &CancellationToken,
    ) -> Result<(), HandlerError> {
        let mut games = self.scoreboard.games.write().await;
        games.entry(event.game_id).or_default().removed += event.plates.len();
        Ok(())
    }
}

#[async_trait]
impl DomainEventHandler<GameEnded> for ScoreboardUpdater {
    fn name(&self) -> &'static str {
        "ScoreboardUpdater"
    }

    async fn handle(&self, event: &GameEnded, _cancel: &CancellationToken) -> Result<(), HandlerError> {
        let mut games = self.scoreboard.games.write().await;
        games.entry(event.game_id).or_default().final_spots = Some(event.total_spots);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::PlayerId;
    use domain::PlateKey;

    #[tokio::test]
    async fn test_tally_follows_events() {
        let scoreboard = Scoreboard::new();
        let updater = ScoreboardUpdater::new(scoreboard.clone());
        let cancel = CancellationToken::new();
        let game_id = AggregateId::new();
        let player = PlayerId::new();
        let plates = vec![
            PlateKey::new("US", "CA").unwrap(),
            PlateKey::new("US", "NV").unwrap(),
        ];

        updater
            .handle(
                &GameStarted {
                    game_id,
                    name: "Trip".to_string(),
                    created_by: player,
                    started_on: Utc::now(),
                },
                &cancel,
            )
            .await
            .unwrap();
        updater
            .handle(
                &LicensePlatesSpotted {
                    game_id,
                    spotted_by: player,
                    plates: plates.clone(),
                    spotted_on: Utc::now(),
                },
                &cancel,
            )
            .await
            .unwrap();
        updater
            .handle(
                &LicensePlateSpotsRemoved {
                    game_id,
                    removed_by: player,
                    plates: plates[..1].to_vec(),
                },
                &cancel,
            )
            .await
            .unwrap();

        let tally = scoreboard.tally(game_id).await.unwrap();
        assert_eq!(tally.name, "Trip");
        assert_eq!(tally.spotted(), 1);
        assert!(!tally.is_finished());
    }
}
