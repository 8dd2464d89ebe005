use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres};

use crate::database::{Database, Transaction};
use crate::error::TransactionError;

/// PostgreSQL-backed database.
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: PgPool,
}

impl PostgresDatabase {
    /// Creates a new database over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, TransactionError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction, TransactionError> {
        let inner = self.pool.begin().await?;
        Ok(PostgresTransaction { inner })
    }
}

/// An open PostgreSQL transaction.
///
/// Dropping it without commit or rollback rolls it back.
pub struct PostgresTransaction {
    inner: sqlx::Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    /// Connection to run queries on inside this transaction.
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.inner
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(self) -> Result<(), TransactionError> {
        self.inner.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), TransactionError> {
        self.inner.rollback().await?;
        Ok(())
    }
}
