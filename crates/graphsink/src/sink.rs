//! The sink: composition root and lifecycle state machine.
//!
//! `Created → Opened → Closed`, driven by the host engine through
//! [`StreamSink`]. The database driver is process-local: it is created in
//! `open` and never part of the sink's configuration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use graphsink_core::{ConnectionConfig, InvokeError, SinkError, Statement};
use graphsink_graph::{ConnectionManager, Connector, Neo4jConnector, PoolStats};

use crate::executor::SinkExecutor;
use crate::mapping::{DeserializationMappingStrategy, MappingStrategy};
use crate::observer::{StatementObserver, TracingObserver};

/// The lifecycle contract the host stream engine drives.
///
/// `invoke` is called serially, in delivery order, between `open` and
/// `close`.
#[async_trait]
pub trait StreamSink<T: Send + 'static>: Send {
    async fn open(&mut self, config: &HashMap<String, String>) -> Result<(), SinkError>;

    async fn invoke(&mut self, element: T) -> Result<(), InvokeError>;

    /// Never fails; problems during shutdown are logged.
    async fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Created,
    Opened,
    /// Only reachable with [`FailurePolicy::FailSink`].
    Failed,
    Closed,
}

impl fmt::Display for SinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Opened => "opened",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What a failed invocation does to the sink itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Report the error for that element only.
    #[default]
    Surface,
    /// Non-retryable errors move the sink to [`SinkState::Failed`].
    FailSink,
}

/// Persists each stream element into the graph through a mapping strategy.
pub struct Sink<T, C: Connector = Neo4jConnector> {
    id: Uuid,
    strategy: DeserializationMappingStrategy<T>,
    connector: C,
    observer: Arc<dyn StatementObserver>,
    batch_size: usize,
    failure_policy: FailurePolicy,
    state: SinkState,
    executor: Option<SinkExecutor<T, C::Backend>>,
    pending: Vec<Statement>,
    pending_start: u64,
    next_sequence: u64,
}

impl<T> Sink<T, Neo4jConnector> {
    pub fn new(strategy: DeserializationMappingStrategy<T>) -> Self {
        Self::with_connector(strategy, Neo4jConnector)
    }
}

impl<T, C: Connector> Sink<T, C> {
    pub fn with_connector(strategy: DeserializationMappingStrategy<T>, connector: C) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy,
            connector,
            observer: Arc::new(TracingObserver),
            batch_size: 1,
            failure_policy: FailurePolicy::default(),
            state: SinkState::Created,
            executor: None,
            pending: Vec::new(),
            pending_start: 0,
            next_sequence: 0,
        }
    }

    pub fn with_observer(mut self, observer: impl StatementObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Group up to `batch_size` elements per transaction. `1` disables batching.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    pub fn strategy(&self) -> &DeserializationMappingStrategy<T> {
        &self.strategy
    }

    /// Elements buffered for the next batch.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.executor.as_ref().map(|e| e.connections().stats())
    }

    /// Execute buffered elements now. A no-op when batching is disabled.
    ///
    /// After a retryable failure the batch stays buffered, in order, and the
    /// next flush runs it again. After any other failure it is dropped and
    /// the host engine replays it from its last checkpoint.
    pub async fn flush(&mut self) -> Result<(), InvokeError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let Some(executor) = self.executor.as_ref() else {
            return Err(self.state_error("flush", self.pending_start));
        };

        let batch = std::mem::take(&mut self.pending);
        let result = executor.execute_statements(self.pending_start, &batch).await;
        if let Err(e) = &result {
            if e.is_retryable() {
                self.pending = batch;
            } else {
                tracing::warn!(
                    sink_id = %self.id,
                    first_sequence = self.pending_start,
                    dropped = batch.len(),
                    error = %e,
                    "Dropping failed batch"
                );
            }
        }
        result
    }

    /// Convert and buffer one element, flushing when the batch is full.
    ///
    /// A conversion failure rejects only this element. If the flush fails
    /// and the batch is kept for another attempt, this element is taken back
    /// out so that an `Err` always means it was not accepted.
    async fn buffer(&mut self, sequence: u64, element: &T) -> Result<(), InvokeError> {
        let statement = self
            .strategy
            .statement(element)
            .map_err(|e| InvokeError::new(sequence, self.strategy.template().id(), e))?;

        if self.pending.is_empty() {
            self.pending_start = sequence;
        }
        self.pending.push(statement);
        if self.pending.len() < self.batch_size {
            return Ok(());
        }

        let result = self.flush().await;
        if result.is_err() && !self.pending.is_empty() {
            self.pending.pop();
        }
        result
    }

    fn state_error(&self, operation: &'static str, sequence: u64) -> InvokeError {
        InvokeError::new(
            sequence,
            self.strategy.template().id(),
            SinkError::InvalidState {
                operation,
                state: self.state.to_string(),
            },
        )
    }

    fn apply_failure_policy(&mut self, result: &Result<(), InvokeError>) {
        if let Err(e) = result {
            if self.failure_policy == FailurePolicy::FailSink && !e.is_retryable() {
                tracing::error!(sink_id = %self.id, error = %e, "Sink failed");
                self.state = SinkState::Failed;
            }
        }
    }
}

#[async_trait]
impl<T, C> StreamSink<T> for Sink<T, C>
where
    T: Send + Sync + 'static,
    C: Connector + 'static,
{
    async fn open(&mut self, config: &HashMap<String, String>) -> Result<(), SinkError> {
        if self.state != SinkState::Created {
            return Err(SinkError::InvalidState {
                operation: "open",
                state: self.state.to_string(),
            });
        }

        let connection_config = ConnectionConfig::from_map(config)?;
        let connections = ConnectionManager::open(&self.connector, &connection_config).await?;

        self.executor = Some(
            SinkExecutor::new(self.strategy.clone(), Arc::new(connections))
                .with_observer(self.observer.clone()),
        );
        self.state = SinkState::Opened;

        tracing::info!(
            sink_id = %self.id,
            uri = %connection_config.uri,
            template = %self.strategy.template().id(),
            batch_size = self.batch_size,
            "Sink opened"
        );
        Ok(())
    }

    async fn invoke(&mut self, element: T) -> Result<(), InvokeError> {
        let sequence = self.next_sequence;
        if self.state != SinkState::Opened {
            return Err(self.state_error("invoke", sequence));
        }
        self.next_sequence += 1;

        let result = if self.batch_size > 1 {
            self.buffer(sequence, &element).await
        } else {
            match self.executor.as_ref() {
                Some(executor) => executor.execute(sequence, &element).await,
                None => Err(self.state_error("invoke", sequence)),
            }
        };

        self.apply_failure_policy(&result);
        result
    }

    async fn close(&mut self) {
        match self.state {
            SinkState::Closed => {
                tracing::debug!(sink_id = %self.id, "Sink already closed");
                return;
            }
            SinkState::Opened => {
                if let Err(e) = self.flush().await {
                    tracing::error!(sink_id = %self.id, error = %e, "Dropping pending batch on close");
                }
            }
            SinkState::Created | SinkState::Failed => {}
        }

        if !self.pending.is_empty() {
            tracing::warn!(
                sink_id = %self.id,
                state = %self.state,
                first_sequence = self.pending_start,
                dropped = self.pending.len(),
                "Discarding buffered elements on close"
            );
            self.pending.clear();
        }
        if let Some(executor) = self.executor.take() {
            executor.connections().close().await;
        }
        self.state = SinkState::Closed;
        tracing::info!(sink_id = %self.id, processed = self.next_sequence, "Sink closed");
    }
}
