//! Database and transaction abstractions.

use async_trait::async_trait;

use crate::error::TransactionError;

/// A database that can open transactions.
#[async_trait]
pub trait Database: Send + Sync {
    type Transaction: Transaction;

    /// Begins a new transaction.
    async fn begin(&self) -> Result<Self::Transaction, TransactionError>;
}

/// An open database transaction.
///
/// Exactly one of `commit` or `rollback` ends it; both consume the value.
#[async_trait]
pub trait Transaction: Send + 'static {
    async fn commit(self) -> Result<(), TransactionError>;

    async fn rollback(self) -> Result<(), TransactionError>;
}
