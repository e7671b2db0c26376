//! Neo4j backend over `neo4rs`.
//!
//! `neo4rs::Graph` already pools Bolt connections internally; a
//! [`Neo4jSession`] is a cheap clone of that handle scoped to one lease.

use std::collections::HashMap;

use async_trait::async_trait;
use neo4rs::{
    query, BoltNull, BoltType, ConfigBuilder, Graph, Neo4jClientErrorKind, Neo4jErrorKind, Query,
};

use graphsink_core::{
    ConnectionConfig, ConnectionError, ExecutionError, ParamValue, Record, SessionError,
    Statement,
};

use crate::backend::{Connector, GraphBackend, GraphSession};

/// Connects to Neo4j and verifies the endpoint with `RETURN 1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Neo4jConnector;

#[async_trait]
impl Connector for Neo4jConnector {
    type Backend = Neo4jBackend;

    async fn connect(&self, config: &ConnectionConfig) -> Result<Neo4jBackend, ConnectionError> {
        Neo4jBackend::connect(config).await
    }
}

/// Thread-safe Neo4j handle with connection pooling.
///
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct Neo4jBackend {
    graph: Graph,
    uri: String,
}

impl Neo4jBackend {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, ConnectionError> {
        let connect_err = |e: neo4rs::Error| ConnectionError::Connect {
            uri: config.uri.clone(),
            reason: e.to_string(),
        };

        let mut builder = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.pool_size)
            .fetch_size(config.fetch_size);
        if let Some(db) = &config.database {
            builder = builder.db(db.as_str());
        }
        let neo_config = builder.build().map_err(connect_err)?;

        let graph = Graph::connect(neo_config).await.map_err(connect_err)?;

        // The driver connects lazily; force a round trip so bad endpoints and
        // credentials fail here rather than on the first element.
        graph.run(query("RETURN 1")).await.map_err(connect_err)?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self {
            graph,
            uri: config.uri.clone(),
        })
    }

    /// Get a reference to the underlying neo4rs Graph for direct operations.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }
}

#[async_trait]
impl GraphBackend for Neo4jBackend {
    type Session = Neo4jSession;

    async fn session(&self) -> Result<Neo4jSession, SessionError> {
        Ok(Neo4jSession {
            graph: Some(self.graph.clone()),
        })
    }

    async fn shutdown(&self) -> Result<(), ConnectionError> {
        // Pooled connections are released when the last Graph clone drops.
        tracing::debug!(uri = %self.uri, "Neo4j backend shut down");
        Ok(())
    }
}

/// A single lease on the Neo4j connection pool.
pub struct Neo4jSession {
    graph: Option<Graph>,
}

impl Neo4jSession {
    fn graph(&self) -> Result<&Graph, ExecutionError> {
        self.graph
            .as_ref()
            .ok_or_else(|| ExecutionError::Transient("session already closed".to_string()))
    }
}

#[async_trait]
impl GraphSession for Neo4jSession {
    async fn run(&mut self, statement: &Statement) -> Result<(), ExecutionError> {
        self.graph()?
            .run(to_query(statement))
            .await
            .map_err(classify_error)
    }

    /// Runs all statements in one explicit transaction, in order.
    async fn run_batch(&mut self, statements: &[Statement]) -> Result<(), ExecutionError> {
        let mut txn = self.graph()?.start_txn().await.map_err(classify_error)?;

        for statement in statements {
            if let Err(e) = txn.run(to_query(statement)).await {
                let err = classify_error(e);
                if let Err(rollback) = txn.rollback().await {
                    tracing::warn!(error = %rollback, "Rollback after failed batch failed");
                }
                return Err(err);
            }
        }

        txn.commit().await.map_err(classify_error)
    }

    async fn query(&mut self, statement: &Statement) -> Result<Vec<Record>, ExecutionError> {
        let mut stream = self
            .graph()?
            .execute(to_query(statement))
            .await
            .map_err(classify_error)?;

        let mut records = Vec::new();
        while let Some(row) = stream.next().await.map_err(classify_error)? {
            let record: Record = row.to().map_err(|e| {
                ExecutionError::Rejected(format!("Failed to deserialize row: {e}"))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    fn close(&mut self) {
        self.graph = None;
    }
}

/// Bind a statement's parameters onto a neo4rs query. The text is passed
/// through untouched.
pub fn to_query(statement: &Statement) -> Query {
    statement
        .params()
        .iter()
        .fold(query(statement.text()), |q, (name, value)| {
            q.param(name, to_bolt(value))
        })
}

fn to_bolt(value: &ParamValue) -> BoltType {
    match value {
        ParamValue::Null => BoltType::Null(BoltNull),
        ParamValue::Boolean(b) => BoltType::from(*b),
        ParamValue::Integer(i) => BoltType::from(*i),
        ParamValue::Float(f) => BoltType::from(*f),
        ParamValue::String(s) => BoltType::from(s.as_str()),
        ParamValue::List(items) => BoltType::from(items.iter().map(to_bolt).collect::<Vec<_>>()),
        ParamValue::Map(fields) => BoltType::from(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), to_bolt(v)))
                .collect::<HashMap<String, BoltType>>(),
        ),
    }
}

/// Map a driver error onto the execution error taxonomy.
///
/// Server failures are classified by their Neo4j status; broken transports
/// are transient; anything else the driver reports is a rejection.
pub fn classify_error(err: neo4rs::Error) -> ExecutionError {
    match err {
        neo4rs::Error::Neo4j(e) => classify_status(e.kind(), e.code(), e.message()),
        e @ (neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError) => {
            ExecutionError::Transient(e.to_string())
        }
        e => ExecutionError::Rejected(e.to_string()),
    }
}

const SYNTAX_ERROR: &str = "Neo.ClientError.Statement.SyntaxError";

fn classify_status(kind: Neo4jErrorKind, code: &str, message: &str) -> ExecutionError {
    let detail = format!("{code}: {message}");
    match kind {
        _ if code == SYNTAX_ERROR => ExecutionError::Syntax(detail),
        Neo4jErrorKind::Transient | Neo4jErrorKind::Client(Neo4jClientErrorKind::SessionExpired) => {
            ExecutionError::Transient(detail)
        }
        _ => ExecutionError::Rejected(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: &str, message: &str) -> ExecutionError {
        classify_status(Neo4jErrorKind::from(code), code, message)
    }

    #[test]
    fn test_classify_syntax() {
        let err = status(SYNTAX_ERROR, "Invalid input 'CRATE'");
        assert!(matches!(err, ExecutionError::Syntax(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_classify_transient() {
        let deadlock = status(
            "Neo.TransientError.Transaction.DeadlockDetected",
            "ForsetiClient can't acquire lock",
        );
        assert!(matches!(deadlock, ExecutionError::Transient(_)));

        let leader = status("Neo.ClientError.Cluster.NotALeader", "No write operations");
        assert!(leader.is_retryable());

        let io = classify_error(neo4rs::Error::from(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "broken pipe",
        )));
        assert!(matches!(io, ExecutionError::Transient(_)));
        assert!(classify_error(neo4rs::Error::ConnectionError).is_retryable());
    }

    #[test]
    fn test_classify_rejected() {
        let missing = status(
            "Neo.ClientError.Statement.ParameterMissing",
            "Expected parameter(s): name",
        );
        assert!(matches!(missing, ExecutionError::Rejected(_)));

        // Words in the server message must not change the classification.
        let constraint = status(
            "Neo.ClientError.Schema.ConstraintValidationFailed",
            "Node(12) already exists with label `Connection` and property `id` = 'a'",
        );
        assert!(matches!(constraint, ExecutionError::Rejected(_)));
        assert!(!constraint.is_retryable());

        let conversion = classify_error(neo4rs::Error::ConversionError);
        assert!(matches!(conversion, ExecutionError::Rejected(_)));
    }

    #[test]
    fn test_to_bolt_scalars() {
        assert_eq!(to_bolt(&ParamValue::Null), BoltType::Null(BoltNull));
        assert_eq!(to_bolt(&ParamValue::Integer(7)), BoltType::from(7i64));
        assert_eq!(to_bolt(&ParamValue::String("Bob".into())), BoltType::from("Bob"));
    }
}
