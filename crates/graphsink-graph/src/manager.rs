//! Connection manager: backend lifecycle and bounded session leasing.
//!
//! A semaphore with `pool_size` permits bounds the number of live sessions.
//! Closing the manager closes the semaphore, so tasks waiting for a permit
//! are woken immediately with [`SessionError::PoolClosed`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use graphsink_core::{
    ConnectionConfig, ConnectionError, ExecutionError, Record, SessionError, Statement,
};

use crate::backend::{Connector, GraphBackend, GraphSession};

/// Snapshot of pool usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: usize,
    pub in_use: usize,
    pub closed: bool,
}

/// Owns the database backend for one sink instance.
pub struct ConnectionManager<B: GraphBackend> {
    backend: B,
    permits: Arc<Semaphore>,
    pool_size: usize,
    acquire_timeout: Duration,
    closed: AtomicBool,
    uri: String,
}

impl<B: GraphBackend> ConnectionManager<B> {
    /// Connect through `connector` and verify the endpoint. Fails fast.
    pub async fn open<C>(connector: &C, config: &ConnectionConfig) -> Result<Self, ConnectionError>
    where
        C: Connector<Backend = B>,
    {
        let backend = connector.connect(config).await?;
        tracing::info!(
            uri = %config.uri,
            pool_size = config.pool_size,
            "Connection manager opened"
        );
        Ok(Self::with_backend(backend, config))
    }

    /// Wrap an already connected backend.
    pub fn with_backend(backend: B, config: &ConnectionConfig) -> Self {
        let pool_size = config.pool_size.max(1);
        Self {
            backend,
            permits: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            acquire_timeout: config.acquire_timeout,
            closed: AtomicBool::new(false),
            uri: config.uri.clone(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Lease a session, waiting at most the configured acquire timeout.
    pub async fn session(&self) -> Result<Session<B::Session>, SessionError> {
        if self.is_closed() {
            return Err(SessionError::PoolClosed);
        }

        let acquire = self.permits.clone().acquire_owned();
        let permit = match tokio::time::timeout(self.acquire_timeout, acquire).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(SessionError::PoolClosed),
            Err(_) => {
                let waited_ms = self.acquire_timeout.as_millis() as u64;
                tracing::warn!(uri = %self.uri, waited_ms, "Session pool exhausted");
                return Err(SessionError::Timeout { waited_ms });
            }
        };

        let inner = self.backend.session().await?;
        tracing::trace!(uri = %self.uri, "Session acquired");
        Ok(Session::new(inner, permit))
    }

    /// Release all resources. Idempotent; never fails.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(uri = %self.uri, "Connection manager already closed");
            return;
        }

        self.permits.close();
        if let Err(e) = self.backend.shutdown().await {
            tracing::warn!(uri = %self.uri, error = %e, "Error while closing connections");
        }
        tracing::debug!(uri = %self.uri, "All resources held by the driver released");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool_size,
            in_use: self
                .pool_size
                .saturating_sub(self.permits.available_permits()),
            closed: self.is_closed(),
        }
    }
}

/// A leased session. The underlying session is closed exactly once: by
/// [`Session::release`], or on drop if the holder never got that far.
pub struct Session<S: GraphSession> {
    inner: S,
    released: bool,
    // Dropped after `Drop::drop` has closed `inner`.
    _permit: OwnedSemaphorePermit,
}

impl<S: GraphSession> Session<S> {
    fn new(inner: S, permit: OwnedSemaphorePermit) -> Self {
        Self {
            inner,
            released: false,
            _permit: permit,
        }
    }

    pub async fn run(&mut self, statement: &Statement) -> Result<(), ExecutionError> {
        self.inner.run(statement).await
    }

    pub async fn run_batch(&mut self, statements: &[Statement]) -> Result<(), ExecutionError> {
        self.inner.run_batch(statements).await
    }

    pub async fn query(&mut self, statement: &Statement) -> Result<Vec<Record>, ExecutionError> {
        self.inner.query(statement).await
    }

    /// Close the session and return its pool slot.
    pub fn release(mut self) {
        self.close_inner();
    }

    fn close_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.inner.close();
        }
    }
}

impl<S: GraphSession> Drop for Session<S> {
    fn drop(&mut self) {
        if !self.released {
            tracing::debug!("Session dropped without release, closing");
            self.close_inner();
        }
    }
}
