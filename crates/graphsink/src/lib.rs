//! graphsink: persist stream elements into a graph database.
//!
//! Each element is turned into a [`Statement`](graphsink_core::Statement) by
//! a [`DeserializationMappingStrategy`] (template + [`ValueConverter`]) and
//! executed over a pooled session by the [`SinkExecutor`]. The [`Sink`] wires
//! these together behind the host engine's open / invoke / close lifecycle.

pub mod converter;
pub mod executor;
pub mod mapping;
pub mod observer;
pub mod retry;
pub mod settings;
pub mod sink;
pub mod source;

pub use converter::{JsonFieldConverter, RecordMapper, ValueConverter};
pub use executor::SinkExecutor;
pub use mapping::{
    DeserializationMappingStrategy, MappingStrategy, SerializationMappingStrategy, ValidationMode,
};
pub use observer::{CompositeObserver, NoopObserver, StatementObserver, TracingObserver};
pub use retry::{invoke_with_retry, RetryPolicy};
pub use sink::{FailurePolicy, Sink, SinkState, StreamSink};
pub use source::GraphSource;
