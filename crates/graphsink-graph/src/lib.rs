//! graphsink-graph: session management for the graph database.
//!
//! The [`ConnectionManager`] owns the database backend for the lifetime of a
//! sink instance and hands out pooled [`Session`] leases. Backends plug in
//! through the [`Connector`] / [`GraphBackend`] / [`GraphSession`] traits;
//! [`neo4j`] provides the production implementation over `neo4rs`.

pub mod backend;
pub mod manager;
pub mod neo4j;

pub use backend::{Connector, GraphBackend, GraphSession};
pub use manager::{ConnectionManager, PoolStats, Session};
pub use neo4j::{Neo4jBackend, Neo4jConnector, Neo4jSession};
