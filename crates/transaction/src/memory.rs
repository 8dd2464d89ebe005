use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::database::{Database, Transaction};
use crate::error::TransactionError;

/// Transaction counters of an [`InMemoryDatabase`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    pub begun: usize,
    pub committed: usize,
    pub rolled_back: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Begin,
    Commit,
    Rollback,
}

#[derive(Default)]
struct State {
    stats: DatabaseStats,
    committed_writes: Vec<String>,
    injected_failures: VecDeque<Step>,
}

/// In-memory database for testing.
///
/// Transactions stage writes and publish them to the committed log only on
/// commit. Transient failures can be injected into the next begin, commit
/// or rollback calls.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl InMemoryDatabase {
    /// Creates a new empty in-memory database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the transaction counters.
    pub async fn stats(&self) -> DatabaseStats {
        self.state.lock().await.stats
    }

    /// Returns every write made by committed transactions, in commit order.
    pub async fn committed_writes(&self) -> Vec<String> {
        self.state.lock().await.committed_writes.clone()
    }

    /// Makes the next `times` begin calls fail transiently.
    pub async fn fail_next_begin(&self, times: usize) {
        self.inject(Step::Begin, times).await;
    }

    /// Makes the next `times` commit calls fail transiently.
    pub async fn fail_next_commit(&self, times: usize) {
        self.inject(Step::Commit, times).await;
    }

    /// Makes the next `times` rollback calls fail transiently.
    pub async fn fail_next_rollback(&self, times: usize) {
        self.inject(Step::Rollback, times).await;
    }

    async fn inject(&self, step: Step, times: usize) {
        let mut state = self.state.lock().await;
        state
            .injected_failures
            .extend(std::iter::repeat_n(step, times));
    }
}

impl State {
    fn take_failure(&mut self, step: Step) -> Result<(), TransactionError> {
        let position = self.injected_failures.iter().position(|s| *s == step);
        match position {
            Some(index) => {
                self.injected_failures.remove(index);
                Err(TransactionError::Transient(format!(
                    "injected {step:?} failure"
                )))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction, TransactionError> {
        let mut state = self.state.lock().await;
        state.take_failure(Step::Begin)?;
        state.stats.begun += 1;

        Ok(InMemoryTransaction {
            state: Arc::clone(&self.state),
            staged: Vec::new(),
        })
    }
}

/// A transaction on an [`InMemoryDatabase`].
pub struct InMemoryTransaction {
    state: Arc<Mutex<State>>,
    staged: Vec<String>,
}

impl InMemoryTransaction {
    /// Stages a write; it becomes visible only if the transaction commits.
    pub fn write(&mut self, entry: impl Into<String>) {
        self.staged.push(entry.into());
    }

    pub fn staged(&self) -> &[String] {
        &self.staged
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(self) -> Result<(), TransactionError> {
        let mut state = self.state.lock().await;
        state.take_failure(Step::Commit)?;
        state.stats.committed += 1;
        state.committed_writes.extend(self.staged);
        Ok(())
    }

    async fn rollback(self) -> Result<(), TransactionError> {
        let mut state = self.state.lock().await;
        state.take_failure(Step::Rollback)?;
        state.stats.rolled_back += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_visible_only_after_commit() {
        let db = InMemoryDatabase::new();

        let mut tx = db.begin().await.unwrap();
        tx.write("game:1");
        assert!(db.committed_writes().await.is_empty());
        tx.commit().await.unwrap();

        let mut tx = db.begin().await.unwrap();
        tx.write("game:2");
        tx.rollback().await.unwrap();

        assert_eq!(db.committed_writes().await, vec!["game:1".to_string()]);
        assert_eq!(
            db.stats().await,
            DatabaseStats {
                begun: 2,
                committed: 1,
                rolled_back: 1
            }
        );
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let db = InMemoryDatabase::new();
        db.fail_next_begin(1).await;

        let error = db.begin().await.err().unwrap();
        assert!(error.is_transient());

        let tx = db.begin().await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(db.stats().await.begun, 1);
    }
}
