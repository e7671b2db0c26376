//! Connection configuration.
//!
//! The host engine hands the sink an opaque string map. [`ConnectionConfig`]
//! is the typed view of it; keys may be written `kebab-case` or `snake_case`.
//!
//! For standalone use the map can be loaded (in priority order) from:
//! 1. Environment variables (`GRAPHSINK__NEO4J__` prefix)
//! 2. Config file (`graphsink.toml`, `[neo4j]` table)

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConnectionError;

pub const DEFAULT_PORT: u16 = 7687;
pub const DEFAULT_POOL_SIZE: usize = 16;
pub const DEFAULT_FETCH_SIZE: usize = 256;
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;

/// Typed connection parameters for the graph database.
#[derive(Clone, PartialEq)]
pub struct ConnectionConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    /// Upper bound on concurrently leased sessions.
    pub pool_size: usize,
    pub fetch_size: usize,
    /// How long `session()` may wait for a free pool slot.
    pub acquire_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: format!("bolt://localhost:{DEFAULT_PORT}"),
            user: "neo4j".to_string(),
            password: String::new(),
            database: None,
            pool_size: DEFAULT_POOL_SIZE,
            fetch_size: DEFAULT_FETCH_SIZE,
            acquire_timeout: Duration::from_millis(DEFAULT_ACQUIRE_TIMEOUT_MS),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("pool_size", &self.pool_size)
            .field("fetch_size", &self.fetch_size)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl ConnectionConfig {
    /// Build from the host-supplied string map.
    ///
    /// Recognised keys: `uri`, or `host` + `port` (+ `scheme`); `username`
    /// or `user`; `password`; `database`; `pool-size`; `fetch-size`;
    /// `acquire-timeout-ms`. Unknown keys are ignored.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ConnectionError> {
        let defaults = Self::default();

        let uri = match (lookup(map, "uri"), lookup(map, "host")) {
            (Some(uri), _) => uri.to_string(),
            (None, Some(host)) if !host.trim().is_empty() => {
                let scheme = lookup(map, "scheme").unwrap_or("bolt");
                let port: u16 = parse_or(map, "port", DEFAULT_PORT)?;
                format!("{scheme}://{}:{port}", host.trim())
            }
            _ => {
                return Err(ConnectionError::InvalidConfig(
                    "either `uri` or `host` must be set".to_string(),
                ))
            }
        };

        let pool_size: usize = parse_or(map, "pool-size", DEFAULT_POOL_SIZE)?;
        if pool_size == 0 {
            return Err(ConnectionError::InvalidConfig(
                "`pool-size` must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            uri,
            user: lookup(map, "username")
                .or_else(|| lookup(map, "user"))
                .map(str::to_string)
                .unwrap_or(defaults.user),
            password: lookup(map, "password")
                .map(str::to_string)
                .unwrap_or_default(),
            database: lookup(map, "database").map(str::to_string),
            pool_size,
            fetch_size: parse_or(map, "fetch-size", DEFAULT_FETCH_SIZE)?,
            acquire_timeout: Duration::from_millis(parse_or(
                map,
                "acquire-timeout-ms",
                DEFAULT_ACQUIRE_TIMEOUT_MS,
            )?),
        })
    }
}

/// Look a key up under its kebab-case and snake_case spellings.
fn lookup<'a>(map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    map.get(key)
        .or_else(|| map.get(&key.replace('-', "_")))
        .map(String::as_str)
}

fn parse_or<T: FromStr>(
    map: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConnectionError> {
    match lookup(map, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            ConnectionError::InvalidConfig(format!("`{key}` is not a valid number: {raw:?}"))
        }),
    }
}

/// Load the `[neo4j]` connection map from `<file_prefix>.toml` (optional) and
/// `GRAPHSINK__NEO4J__*` environment variables.
pub fn load_connection_map(file_prefix: &str) -> Result<HashMap<String, String>, ConnectionError> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(config::Environment::with_prefix("GRAPHSINK").separator("__"))
        .build()
        .map_err(|e| ConnectionError::InvalidConfig(e.to_string()))?;

    match cfg.get::<HashMap<String, String>>("neo4j") {
        Ok(map) => Ok(map),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::debug!(file_prefix, "No [neo4j] section found, using empty map");
            Ok(HashMap::new())
        }
        Err(e) => Err(ConnectionError::InvalidConfig(e.to_string())),
    }
}
