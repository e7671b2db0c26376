//! Backend abstraction: the narrow capability the sink needs from a driver.

use async_trait::async_trait;

use graphsink_core::{
    ConnectionConfig, ConnectionError, ExecutionError, Record, SessionError, Statement,
};

/// One logical conversation with the database.
#[async_trait]
pub trait GraphSession: Send {
    /// Execute a write statement in auto-commit mode.
    async fn run(&mut self, statement: &Statement) -> Result<(), ExecutionError>;

    /// Execute statements in order as a single unit of work.
    ///
    /// The default runs them one by one; backends with transactions should
    /// commit them together.
    async fn run_batch(&mut self, statements: &[Statement]) -> Result<(), ExecutionError> {
        for statement in statements {
            self.run(statement).await?;
        }
        Ok(())
    }

    /// Execute a read statement and collect every returned row.
    async fn query(&mut self, statement: &Statement) -> Result<Vec<Record>, ExecutionError>;

    /// Release the session. Called exactly once by the owning lease.
    fn close(&mut self);
}

/// A live, process-local handle to a database (driver plus its pool).
#[async_trait]
pub trait GraphBackend: Send + Sync + 'static {
    type Session: GraphSession + 'static;

    async fn session(&self) -> Result<Self::Session, SessionError>;

    /// Tear down all driver resources.
    async fn shutdown(&self) -> Result<(), ConnectionError>;
}

/// Creates a backend from configuration. Must verify connectivity before
/// returning so that failures surface at open time.
#[async_trait]
pub trait Connector: Send + Sync {
    type Backend: GraphBackend;

    async fn connect(&self, config: &ConnectionConfig) -> Result<Self::Backend, ConnectionError>;
}
