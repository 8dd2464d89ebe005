//! Game command handlers run through the transaction executor.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use common::{AggregateId, Failure, Outcome, PlayerId, ValidationFailure};
use domain::{AggregateRoot, Game, GameError, PlateKey, SpotChanges};
use message_bus::EventPublisher;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use transaction::{Database, Execution, ExecutionError, TransactionExecutor};

/// Committed games, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct GameStore {
    games: Arc<RwLock<HashMap<AggregateId, Game>>>,
}

impl GameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: AggregateId) -> Option<Game> {
        self.games.read().await.get(&id).cloned()
    }

    async fn load(&self, id: AggregateId) -> Outcome<Game> {
        self.get(id)
            .await
            .ok_or_else(|| Failure::new(format!("Game {id} not found")))
    }

    /// Returns true if `player` owns a game that has not ended.
    pub async fn has_active_game(&self, player: PlayerId) -> bool {
        self.games
            .read()
            .await
            .values()
            .any(|game| game.is_active() && game.created_by() == player)
    }

    async fn put(&self, game: &Game) {
        self.games.write().await.insert(game.id(), game.to_persisted());
    }
}

/// Entry points for the state-changing game commands.
///
/// Each command loads the game, applies the change and saves it through the
/// unit of work; the executor commits or rolls back and publishes the
/// resulting events. Every committed command updates the store, including
/// one whose events could not be published.
pub struct GameCommands<D, P> {
    executor: TransactionExecutor<D, P>,
    store: GameStore,
}

impl<D, P> GameCommands<D, P>
where
    D: Database,
    P: EventPublisher,
{
    pub fn new(executor: TransactionExecutor<D, P>, store: GameStore) -> Self {
        Self { executor, store }
    }

    pub fn store(&self) -> &GameStore {
        &self.store
    }

    /// Starts a new game owned by `player`.
    ///
    /// A player owns at most one active game.
    pub async fn start_game(
        &self,
        name: &str,
        player: PlayerId,
        cancel: &CancellationToken,
    ) -> Result<Execution<AggregateId>, ExecutionError> {
        let store = &self.store;
        let execution = self
            .executor
            .execute_in_transaction("start_game", cancel, |unit| async move {
                if store.has_active_game(player).await {
                    return Err(Failure::from(GameError::ActiveGameExists { player_id: player }));
                }
                let game = Game::start(name, player, Utc::now())?;
                unit.save(&game).await;
                let id = game.id();
                Ok((game, id))
            })
            .await?;

        Ok(self.commit_to_store("start_game", execution).await)
    }

    /// Replaces the plates spotted by `player` in a game.
    ///
    /// Plates are given as `(country, region)` pairs; every invalid pair is
    /// reported in one validation failure.
    pub async fn spot_plates(
        &self,
        game_id: AggregateId,
        player: PlayerId,
        plates: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<Execution<SpotChanges>, ExecutionError> {
        let store = &self.store;
        let execution = self
            .executor
            .execute_in_transaction("spot_plates", cancel, |unit| async move {
                let keys = parse_plates(plates)?;
                let mut game = store.load(game_id).await?;
                let changes = game.spot_plates(player, keys, Utc::now())?;
                unit.save(&game).await;
                Ok((game, changes))
            })
            .await?;

        Ok(self.commit_to_store("spot_plates", execution).await)
    }

    /// Ends a game and returns its end time.
    pub async fn end_game(
        &self,
        game_id: AggregateId,
        cancel: &CancellationToken,
    ) -> Result<Execution<chrono::DateTime<Utc>>, ExecutionError> {
        let store = &self.store;
        let execution = self
            .executor
            .execute_in_transaction("end_game", cancel, |unit| async move {
                let mut game = store.load(game_id).await?;
                let ended_on = game.end_game()?;
                unit.save(&game).await;
                Ok((game, ended_on))
            })
            .await?;

        Ok(self.commit_to_store("end_game", execution).await)
    }

    async fn commit_to_store<T>(
        &self,
        command: &'static str,
        execution: Execution<(Game, T)>,
    ) -> Execution<T> {
        let Execution {
            outcome,
            undelivered,
            publish_error,
        } = execution;

        if let Some(e) = &publish_error {
            tracing::warn!(command, undelivered, error = %e, "game command committed with undelivered events");
        }

        let outcome = match outcome {
            Ok((game, value)) => {
                metrics::counter!("game_commands_total", "command" => command, "outcome" => "success")
                    .increment(1);
                self.store.put(&game).await;
                Ok(value)
            }
            Err(failure) => {
                metrics::counter!("game_commands_total", "command" => command, "outcome" => "failure")
                    .increment(1);
                tracing::info!(command, failure = %failure, "game command rejected");
                Err(failure)
            }
        };

        Execution {
            outcome,
            undelivered,
            publish_error,
        }
    }
}

fn parse_plates(plates: &[(String, String)]) -> Outcome<Vec<PlateKey>> {
    let mut keys = Vec::with_capacity(plates.len());
    let mut violations: Option<ValidationFailure> = None;

    for (country, region) in plates {
        match PlateKey::new(country, region) {
            Ok(key) => keys.push(key),
            Err(Failure::Validation(failure)) => match violations.as_mut() {
                Some(all) => all.merge(failure),
                None => violations = Some(failure),
            },
            Err(other) => return Err(other),
        }
    }

    match violations {
        Some(failure) => Err(failure.into()),
        None => Ok(keys),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use message_bus::{BoundedEventQueue, EventBus, PublishError};
    use transaction::InMemoryDatabase;

    fn commands(
        queue: &BoundedEventQueue,
        db: &InMemoryDatabase,
    ) -> GameCommands<InMemoryDatabase, EventBus> {
        GameCommands::new(
            TransactionExecutor::new(db.clone(), EventBus::new(queue.clone())),
            GameStore::new(),
        )
    }

    fn pair(country: &str, region: &str) -> (String, String) {
        (country.to_string(), region.to_string())
    }

    #[test]
    fn test_parse_plates_collects_every_violation() {
        let failure =
            parse_plates(&[pair("US", "CA"), pair("", "NV"), pair("US", "")]).unwrap_err();

        let validation = failure.as_validation().unwrap();
        assert_eq!(validation.fields().count(), 2);
    }

    #[test]
    fn test_parse_plates_accepts_valid_pairs() {
        let keys = parse_plates(&[pair("us", "ca"), pair("CA", "BC")]).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].to_string(), "US-CA");
    }

    #[tokio::test]
    async fn test_owner_may_have_one_active_game() {
        let queue = BoundedEventQueue::new(8).unwrap();
        let db = InMemoryDatabase::new();
        let commands = commands(&queue, &db);
        let cancel = CancellationToken::new();
        let owner = PlayerId::new();

        let first = commands
            .start_game("First", owner, &cancel)
            .await
            .unwrap()
            .into_outcome()
            .unwrap();
        let second = commands
            .start_game("Second", owner, &cancel)
            .await
            .unwrap()
            .into_outcome();
        assert_eq!(
            second,
            Err(Failure::from(GameError::ActiveGameExists { player_id: owner }))
        );

        commands
            .end_game(first, &cancel)
            .await
            .unwrap()
            .into_outcome()
            .unwrap();
        let third = commands
            .start_game("Third", owner, &cancel)
            .await
            .unwrap()
            .into_outcome();
        assert!(third.is_ok());
        assert_eq!(db.stats().await.rolled_back, 1);
    }

    #[tokio::test]
    async fn test_blank_name_starts_a_game_named_after_its_start() {
        let queue = BoundedEventQueue::new(8).unwrap();
        let db = InMemoryDatabase::new();
        let commands = commands(&queue, &db);

        let id = commands
            .start_game("  ", PlayerId::new(), &CancellationToken::new())
            .await
            .unwrap()
            .into_outcome()
            .unwrap();

        let game = commands.store().get(id).await.unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(game.name()).is_ok());
    }

    #[tokio::test]
    async fn test_committed_game_is_stored_when_publishing_fails() {
        let queue = BoundedEventQueue::new(8).unwrap();
        queue.close();
        let db = InMemoryDatabase::new();
        let commands = commands(&queue, &db);

        let execution = commands
            .start_game("Trip", PlayerId::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(execution.publish_error, Some(PublishError::QueueClosed));
        assert_eq!(db.stats().await.committed, 1);
        let id = execution.into_outcome().unwrap();
        assert!(commands.store().get(id).await.is_some());
    }
}
