//! Statement observers, invoked around every execution.

use std::sync::Arc;
use std::time::Duration;

use graphsink_core::{ExecutionError, Statement};

/// Hooks called by the executor around each statement it runs.
pub trait StatementObserver: Send + Sync {
    fn before_execute(&self, _statement: &Statement) {}

    fn after_execute(
        &self,
        _statement: &Statement,
        _outcome: Result<(), &ExecutionError>,
        _elapsed: Duration,
    ) {
    }
}

/// Debug trace of executed statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StatementObserver for TracingObserver {
    fn before_execute(&self, statement: &Statement) {
        tracing::debug!(
            template = %statement.template().id(),
            params = statement.params().len(),
            "running {}",
            statement.text()
        );
    }

    fn after_execute(
        &self,
        statement: &Statement,
        outcome: Result<(), &ExecutionError>,
        elapsed: Duration,
    ) {
        let elapsed_ms = elapsed.as_millis() as u64;
        match outcome {
            Ok(()) => tracing::debug!(
                template = %statement.template().id(),
                elapsed_ms,
                "Statement executed"
            ),
            Err(e) => tracing::warn!(
                template = %statement.template().id(),
                elapsed_ms,
                retryable = e.is_retryable(),
                error = %e,
                "Statement failed"
            ),
        }
    }
}

/// Observes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StatementObserver for NoopObserver {}

/// Fans every event out to several observers, in order.
#[derive(Clone, Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn StatementObserver>>,
}

impl CompositeObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: impl StatementObserver + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl StatementObserver for CompositeObserver {
    fn before_execute(&self, statement: &Statement) {
        for observer in &self.observers {
            observer.before_execute(statement);
        }
    }

    fn after_execute(
        &self,
        statement: &Statement,
        outcome: Result<(), &ExecutionError>,
        elapsed: Duration,
    ) {
        for observer in &self.observers {
            observer.after_execute(statement, outcome, elapsed);
        }
    }
}
