//! Transaction execution for command handlers.
//!
//! A command runs inside a database transaction that is committed when the
//! command returns a success [`Outcome`](common::Outcome) and rolled back when
//! it returns a failure. Domain events collected from saved aggregates are
//! published only after a successful commit.

pub mod database;
pub mod error;
pub mod executor;
pub mod memory;
pub mod postgres;
pub mod retry;
pub mod unit_of_work;

pub use database::{Database, Transaction};
pub use error::{ExecutionError, TransactionError};
pub use executor::{Execution, TransactionExecutor};
pub use memory::{DatabaseStats, InMemoryDatabase, InMemoryTransaction};
pub use postgres::{PostgresDatabase, PostgresTransaction};
pub use retry::RetryPolicy;
pub use unit_of_work::UnitOfWork;
