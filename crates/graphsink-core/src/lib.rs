//! graphsink-core: Statement model, error taxonomy, and connection configuration.
//!
//! This crate provides the foundational types shared by the sink crates:
//! - Parameter values, bindings, query templates, and statements
//! - The per-stage error taxonomy with retry classification
//! - Connection configuration parsed from the host's string map

pub mod config;
pub mod error;
pub mod types;

pub use config::ConnectionConfig;
pub use error::{
    ConnectionError, ConversionError, ExecutionError, InvokeError, MappingError, SessionError,
    SinkError,
};
pub use types::{ParamValue, ParameterBinding, QueryTemplate, Record, Statement};
