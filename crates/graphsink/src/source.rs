//! Graph source: the database → stream direction.

use std::sync::Arc;

use graphsink_core::SinkError;
use graphsink_graph::{ConnectionManager, GraphBackend};

use crate::mapping::{MappingStrategy, SerializationMappingStrategy};

/// Reads elements out of the graph with a serialization mapping strategy.
pub struct GraphSource<T, B: GraphBackend> {
    strategy: SerializationMappingStrategy<T>,
    connections: Arc<ConnectionManager<B>>,
}

impl<T, B: GraphBackend> GraphSource<T, B> {
    pub fn new(
        strategy: SerializationMappingStrategy<T>,
        connections: Arc<ConnectionManager<B>>,
    ) -> Self {
        Self {
            strategy,
            connections,
        }
    }

    /// Run the read statement and map every row, preserving row order.
    pub async fn fetch(&self) -> Result<Vec<T>, SinkError> {
        let statement = self.strategy.statement();
        let mut session = self.connections.session().await?;
        let rows = session.query(&statement).await;
        session.release();
        let rows = rows?;

        tracing::debug!(
            template = %self.strategy.template().id(),
            rows = rows.len(),
            "Source query returned"
        );

        rows.iter()
            .map(|row| self.strategy.map_record(row).map_err(SinkError::from))
            .collect()
    }
}
