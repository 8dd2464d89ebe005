use thiserror::Error;

/// Errors raised while beginning, committing or rolling back a transaction.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// A database driver error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A failure that is expected to go away on retry.
    #[error("Transient database failure: {0}")]
    Transient(String),

    /// The transaction was already committed or rolled back.
    #[error("Transaction already finished")]
    Finished,
}

impl TransactionError {
    /// Returns true if re-running the whole unit of work may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransactionError::Transient(_) => true,
            TransactionError::Database(e) => is_transient_sqlx(e),
            TransactionError::Finished => false,
        }
    }
}

fn is_transient_sqlx(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| {
            // serialization_failure, deadlock_detected, connection_exception class
            code == "40001" || code == "40P01" || code.starts_with("08")
        }),
        _ => false,
    }
}

/// Errors returned by [`TransactionExecutor`](crate::TransactionExecutor)
/// for commands whose transaction did not commit.
///
/// Business failures are not errors here: they come back as the command's
/// own `Outcome`.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The transaction could not be completed.
    #[error("Transaction failed after {attempts} attempt(s): {source}")]
    Transaction {
        attempts: u32,
        #[source]
        source: TransactionError,
    },

    /// Execution stopped on cancellation before a commit.
    #[error("Command execution was cancelled")]
    Cancelled,
}
