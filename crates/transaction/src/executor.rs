//! The transaction execution wrapper every state-changing command runs through.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use common::Outcome;
use domain::DomainEvent;
use message_bus::{EventPublisher, PublishError};
use tokio_util::sync::CancellationToken;

use crate::database::{Database, Transaction};
use crate::error::{ExecutionError, TransactionError};
use crate::retry::RetryPolicy;
use crate::unit_of_work::UnitOfWork;

enum AttemptError {
    Transaction(TransactionError),
    Cancelled,
}

impl From<TransactionError> for AttemptError {
    fn from(e: TransactionError) -> Self {
        AttemptError::Transaction(e)
    }
}

/// What running one command produced.
///
/// `outcome` is the command's own outcome, returned unchanged. A committed
/// command whose domain events could not all be handed to the publisher
/// keeps its outcome; `publish_error` then holds the first publishing error
/// and `undelivered` counts the events that were not published.
#[derive(Debug)]
#[must_use]
pub struct Execution<T> {
    pub outcome: Outcome<T>,
    pub undelivered: usize,
    pub publish_error: Option<PublishError>,
}

impl<T> Execution<T> {
    /// Returns true when every collected event reached the publisher.
    pub fn is_delivered(&self) -> bool {
        self.publish_error.is_none()
    }

    pub fn into_outcome(self) -> Outcome<T> {
        self.outcome
    }
}

/// Runs commands inside a transaction and publishes their domain events
/// after commit.
///
/// A success outcome commits and a failure outcome rolls back; either way
/// the command's outcome is returned unchanged. Events collected through
/// [`UnitOfWork::save`] reach the publisher only after a successful commit
/// and are discarded on rollback.
///
/// Transient transaction errors re-run the whole unit: a new transaction and
/// a new unit of work, with the command invoked again from the start.
#[derive(Clone)]
pub struct TransactionExecutor<D, P> {
    database: D,
    publisher: P,
    retry: RetryPolicy,
}

impl<D, P> TransactionExecutor<D, P>
where
    D: Database,
    P: EventPublisher,
{
    pub fn new(database: D, publisher: P) -> Self {
        Self {
            database,
            publisher,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn database(&self) -> &D {
        &self.database
    }

    /// Executes `command` in a transaction.
    ///
    /// Business failures come back in [`Execution::outcome`]. `Err` is
    /// reserved for a transaction that did not commit: exhausted or
    /// non-transient transaction errors, and cancellation before commit.
    ///
    /// Once committed, every collected event is offered to the publisher
    /// even if `cancel` fires; publishing failures are reported on the
    /// returned [`Execution`].
    #[tracing::instrument(skip(self, cancel, command))]
    pub async fn execute_in_transaction<T, F, Fut>(
        &self,
        command_name: &'static str,
        cancel: &CancellationToken,
        mut command: F,
    ) -> Result<Execution<T>, ExecutionError>
    where
        F: FnMut(UnitOfWork<D::Transaction>) -> Fut + Send,
        Fut: Future<Output = Outcome<T>> + Send,
        T: Send,
    {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        let (outcome, events) = loop {
            attempts += 1;

            match self.run_attempt(cancel, &mut command).await {
                Ok(completed) => break completed,
                Err(AttemptError::Cancelled) => {
                    tracing::info!(attempts, "command cancelled");
                    return Err(ExecutionError::Cancelled);
                }
                Err(AttemptError::Transaction(source))
                    if source.is_transient() && attempts <= self.retry.max_retries =>
                {
                    let delay = self.retry.delay_for_retry(attempts - 1);
                    metrics::counter!("transaction_retries_total", "command" => command_name)
                        .increment(1);
                    tracing::warn!(
                        attempt = attempts,
                        ?delay,
                        error = %source,
                        "transient transaction failure, retrying"
                    );

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(ExecutionError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(AttemptError::Transaction(source)) => {
                    tracing::error!(attempts, error = %source, "transaction failed");
                    return Err(ExecutionError::Transaction { attempts, source });
                }
            }
        };

        metrics::histogram!("command_duration_seconds", "command" => command_name)
            .record(started.elapsed().as_secs_f64());

        Ok(self.publish_committed(outcome, events).await)
    }

    async fn publish_committed<T>(
        &self,
        outcome: Outcome<T>,
        events: Vec<Arc<dyn DomainEvent>>,
    ) -> Execution<T> {
        // Committed facts are not subject to the command's cancellation.
        let publish_cancel = CancellationToken::new();
        let mut execution = Execution {
            outcome,
            undelivered: 0,
            publish_error: None,
        };

        for event in events {
            let event_type = event.event_type();
            if let Err(e) = self.publisher.publish(event, &publish_cancel).await {
                metrics::counter!("domain_events_undelivered_total", "event_type" => event_type)
                    .increment(1);
                tracing::error!(event_type, error = %e, "committed domain event was not published");
                execution.undelivered += 1;
                execution.publish_error.get_or_insert(e);
            }
        }

        execution
    }

    async fn run_attempt<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        command: &mut F,
    ) -> Result<(Outcome<T>, Vec<Arc<dyn DomainEvent>>), AttemptError>
    where
        F: FnMut(UnitOfWork<D::Transaction>) -> Fut + Send,
        Fut: Future<Output = Outcome<T>> + Send,
        T: Send,
    {
        if cancel.is_cancelled() {
            return Err(AttemptError::Cancelled);
        }

        let transaction = self.database.begin().await?;
        let unit = UnitOfWork::new(transaction);

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            outcome = command(unit.clone()) => Some(outcome),
        };

        let transaction = unit
            .take_transaction()
            .await
            .ok_or(TransactionError::Finished)?;

        match outcome {
            None => {
                if let Err(e) = transaction.rollback().await {
                    tracing::warn!(error = %e, "rollback after cancellation failed");
                }
                Err(AttemptError::Cancelled)
            }
            Some(Ok(value)) => {
                transaction.commit().await?;
                metrics::counter!("transactions_committed_total").increment(1);

                let events = unit.take_events().await;
                tracing::debug!(events = events.len(), "transaction committed");
                Ok((Ok(value), events))
            }
            Some(Err(failure)) => {
                transaction.rollback().await?;
                metrics::counter!("transactions_rolled_back_total").increment(1);

                let discarded = unit.take_events().await.len();
                tracing::info!(failure = %failure, discarded_events = discarded, "transaction rolled back");
                Ok((Err(failure), Vec::new()))
            }
        }
    }
}
