//! Per-element execution protocol.
//!
//! Build the statement, lease a session, run, release. The statement is
//! always built first so malformed elements never touch the pool, and the
//! session lease is closed on every exit path (including cancellation of the
//! returned future, through the lease's drop).

use std::sync::Arc;
use std::time::Instant;

use graphsink_core::{InvokeError, SinkError, Statement};
use graphsink_graph::{ConnectionManager, GraphBackend};

use crate::mapping::{DeserializationMappingStrategy, MappingStrategy};
use crate::observer::{StatementObserver, TracingObserver};

pub struct SinkExecutor<T, B: GraphBackend> {
    strategy: DeserializationMappingStrategy<T>,
    connections: Arc<ConnectionManager<B>>,
    observer: Arc<dyn StatementObserver>,
}

impl<T, B: GraphBackend> SinkExecutor<T, B> {
    pub fn new(
        strategy: DeserializationMappingStrategy<T>,
        connections: Arc<ConnectionManager<B>>,
    ) -> Self {
        Self {
            strategy,
            connections,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn StatementObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn strategy(&self) -> &DeserializationMappingStrategy<T> {
        &self.strategy
    }

    pub fn connections(&self) -> &Arc<ConnectionManager<B>> {
        &self.connections
    }

    /// Execute one element as one statement in one round trip.
    ///
    /// `sequence` is the element's delivery ordinal, carried into the error.
    pub async fn execute(&self, sequence: u64, element: &T) -> Result<(), InvokeError> {
        let fail = |e: SinkError| InvokeError::new(sequence, self.strategy.template().id(), e);

        let statement = self.strategy.statement(element).map_err(fail)?;
        let mut session = self.connections.session().await.map_err(|e| fail(e.into()))?;

        self.observer.before_execute(&statement);
        let started = Instant::now();
        let outcome = session.run(&statement).await;
        session.release();
        self.observer
            .after_execute(&statement, outcome.as_ref().copied(), started.elapsed());

        outcome.map_err(|e| fail(e.into()))
    }

    /// Execute several elements in delivery order within one transaction.
    ///
    /// Every statement is built before a session is requested; the first
    /// element that fails to convert aborts the whole batch.
    pub async fn execute_batch(
        &self,
        first_sequence: u64,
        elements: &[T],
    ) -> Result<(), InvokeError> {
        let statements = elements
            .iter()
            .enumerate()
            .map(|(offset, element)| {
                self.strategy.statement(element).map_err(|e| {
                    InvokeError::new(
                        first_sequence + offset as u64,
                        self.strategy.template().id(),
                        e,
                    )
                })
            })
            .collect::<Result<Vec<Statement>, _>>()?;

        self.execute_statements(first_sequence, &statements).await
    }

    /// Run already built statements in order within one transaction.
    ///
    /// Failures are attributed to `first_sequence`, the first element of the
    /// batch.
    pub async fn execute_statements(
        &self,
        first_sequence: u64,
        statements: &[Statement],
    ) -> Result<(), InvokeError> {
        if statements.is_empty() {
            return Ok(());
        }

        let fail = |e: SinkError| InvokeError::new(first_sequence, self.strategy.template().id(), e);
        let mut session = self.connections.session().await.map_err(|e| fail(e.into()))?;

        for statement in statements {
            self.observer.before_execute(statement);
        }
        let started = Instant::now();
        let outcome = session.run_batch(statements).await;
        session.release();
        let elapsed = started.elapsed();
        for statement in statements {
            self.observer
                .after_execute(statement, outcome.as_ref().copied(), elapsed);
        }

        tracing::debug!(
            first_sequence,
            size = statements.len(),
            ok = outcome.is_ok(),
            "Batch executed"
        );
        outcome.map_err(|e| fail(e.into()))
    }
}
