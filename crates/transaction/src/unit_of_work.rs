//! Per-attempt persistence context handed to commands.

use std::sync::Arc;

use domain::{AggregateRoot, DomainEvent};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::error::TransactionError;

struct Inner<Tx> {
    transaction: Mutex<Option<Tx>>,
    events: Mutex<Vec<Arc<dyn DomainEvent>>>,
}

/// The open transaction of one execution attempt plus the domain events
/// collected from aggregates saved during it.
///
/// Handles are cheap to clone and all refer to the same attempt. Once the
/// executor commits or rolls back, the transaction is gone and
/// [`transaction`](Self::transaction) fails with [`TransactionError::Finished`].
pub struct UnitOfWork<Tx> {
    inner: Arc<Inner<Tx>>,
}

impl<Tx> Clone for UnitOfWork<Tx> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Tx: Send> UnitOfWork<Tx> {
    pub(crate) fn new(transaction: Tx) -> Self {
        Self {
            inner: Arc::new(Inner {
                transaction: Mutex::new(Some(transaction)),
                events: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Locks the open transaction for use by the command.
    ///
    /// Hold the guard only while issuing statements; the executor needs the
    /// lock to commit.
    pub async fn transaction(&self) -> Result<MappedMutexGuard<'_, Tx>, TransactionError> {
        let guard = self.inner.transaction.lock().await;
        MutexGuard::try_map(guard, Option::as_mut).map_err(|_| TransactionError::Finished)
    }

    /// Collects the pending domain events of a saved aggregate.
    ///
    /// Saving the same aggregate again collects only events raised since the
    /// previous save. Returns the number of newly collected events.
    pub async fn save<A: AggregateRoot>(&self, aggregate: &A) -> usize {
        let mut collected = self.inner.events.lock().await;
        let before = collected.len();

        for event in aggregate.domain_events() {
            if !collected.iter().any(|seen| Arc::ptr_eq(seen, event)) {
                collected.push(Arc::clone(event));
            }
        }

        let added = collected.len() - before;
        tracing::debug!(aggregate_id = %aggregate.id(), events = added, "aggregate saved");
        added
    }

    /// Returns the events collected so far.
    pub async fn collected_events(&self) -> Vec<Arc<dyn DomainEvent>> {
        self.inner.events.lock().await.clone()
    }

    pub(crate) async fn take_transaction(&self) -> Option<Tx> {
        self.inner.transaction.lock().await.take()
    }

    pub(crate) async fn take_events(&self) -> Vec<Arc<dyn DomainEvent>> {
        std::mem::take(&mut *self.inner.events.lock().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::PlayerId;
    use domain::{Game, PlateKey};

    #[tokio::test]
    async fn test_saving_twice_collects_once() {
        let uow = UnitOfWork::new(());
        let owner = PlayerId::new();
        let mut game = Game::start("Commute", owner, Utc::now()).unwrap();

        assert_eq!(uow.save(&game).await, 1);
        assert_eq!(uow.save(&game).await, 0);

        game.spot_plates(owner, [PlateKey::new("US", "WA").unwrap()], Utc::now())
            .unwrap();
        assert_eq!(uow.save(&game).await, 1);

        let types: Vec<_> = uow
            .collected_events()
            .await
            .iter()
            .map(|event| event.event_type())
            .collect();
        assert_eq!(types, vec!["GameStarted", "LicensePlatesSpotted"]);
    }

    #[tokio::test]
    async fn test_transaction_unavailable_after_take() {
        let uow = UnitOfWork::new(7_u8);
        assert_eq!(*uow.transaction().await.unwrap(), 7);

        assert_eq!(uow.take_transaction().await, Some(7));
        assert!(matches!(
            uow.transaction().await,
            Err(TransactionError::Finished)
        ));
    }
}
