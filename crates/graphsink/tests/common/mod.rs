//! In-memory graph backend for exercising the sink without a database.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use graphsink_core::{
    ConnectionConfig, ConnectionError, ConversionError, ExecutionError, ParameterBinding, Record,
    SessionError, Statement,
};
use graphsink_graph::{Connector, GraphBackend, GraphSession};

pub const CREATE_PERSON: &str = "CREATE (n:Person {name: {name}})";

/// Everything the mock database observed, plus failure injection knobs.
#[derive(Default)]
pub struct MockState {
    pub executed: Mutex<Vec<Statement>>,
    pub batch_sizes: Mutex<Vec<usize>>,
    pub rows: Mutex<Vec<Record>>,
    pub configs: Mutex<Vec<ConnectionConfig>>,
    pub sessions_opened: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub shutdowns: AtomicUsize,
    /// Returned (once) by the next `run` / `run_batch`.
    pub next_failure: Mutex<Option<ExecutionError>>,
    /// Fail session creation with a transport error.
    pub broken_transport: AtomicBool,
    /// Make `run` wait forever.
    pub hang: AtomicBool,
    /// Fail `connect`.
    pub unreachable: AtomicBool,
}

impl MockState {
    pub fn executed_names(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| s.params().get("name").and_then(|v| v.as_str()).map(str::to_string))
            .collect()
    }

    pub fn opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.sessions_closed.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, err: ExecutionError) {
        *self.next_failure.lock().unwrap() = Some(err);
    }

    fn take_failure(&self) -> Option<ExecutionError> {
        self.next_failure.lock().unwrap().take()
    }
}

#[derive(Clone, Default)]
pub struct MockConnector {
    pub state: Arc<MockState>,
}

pub struct MockBackend {
    state: Arc<MockState>,
}

pub struct MockSession {
    state: Arc<MockState>,
}

#[async_trait]
impl Connector for MockConnector {
    type Backend = MockBackend;

    async fn connect(&self, config: &ConnectionConfig) -> Result<MockBackend, ConnectionError> {
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(ConnectionError::Connect {
                uri: config.uri.clone(),
                reason: "connection refused".to_string(),
            });
        }
        self.state.configs.lock().unwrap().push(config.clone());
        Ok(MockBackend {
            state: self.state.clone(),
        })
    }
}

#[async_trait]
impl GraphBackend for MockBackend {
    type Session = MockSession;

    async fn session(&self) -> Result<MockSession, SessionError> {
        if self.state.broken_transport.load(Ordering::SeqCst) {
            return Err(SessionError::Transport("connection reset".to_string()));
        }
        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            state: self.state.clone(),
        })
    }

    async fn shutdown(&self) -> Result<(), ConnectionError> {
        self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl GraphSession for MockSession {
    async fn run(&mut self, statement: &Statement) -> Result<(), ExecutionError> {
        if self.state.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(err) = self.state.take_failure() {
            return Err(err);
        }
        self.state.executed.lock().unwrap().push(statement.clone());
        Ok(())
    }

    async fn run_batch(&mut self, statements: &[Statement]) -> Result<(), ExecutionError> {
        if let Some(err) = self.state.take_failure() {
            return Err(err);
        }
        self.state.batch_sizes.lock().unwrap().push(statements.len());
        self.state
            .executed
            .lock()
            .unwrap()
            .extend(statements.iter().cloned());
        Ok(())
    }

    async fn query(&mut self, _statement: &Statement) -> Result<Vec<Record>, ExecutionError> {
        if let Some(err) = self.state.take_failure() {
            return Err(err);
        }
        Ok(self.state.rows.lock().unwrap().clone())
    }

    fn close(&mut self) {
        self.state.sessions_closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// `"Bob"` → `{"name": "Bob"}`; `None` fails like a null element.
pub fn name_converter(element: &Option<String>) -> Result<ParameterBinding, ConversionError> {
    match element {
        Some(name) => Ok(ParameterBinding::new().with("name", name.as_str())),
        None => Err(ConversionError::Invalid("element is null".to_string())),
    }
}

pub fn config(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn db1_config() -> HashMap<String, String> {
    config(&[("host", "db1"), ("pool-size", "2")])
}
