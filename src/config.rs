use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://graphs.db";
pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

/// Runtime settings for the graph store service, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Base pool of 5 plus 10 overflow connections.
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub max_lifetime: Duration,
    /// Drop and recreate every graph table at startup.
    pub reset_schema: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            max_connections: 15,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(1800),
            reset_schema: false,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);

        let bind = lookup("GRAPH_STORE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr: SocketAddr = bind
            .parse()
            .with_context(|| format!("invalid GRAPH_STORE_BIND '{}'", bind))?;

        let max_connections = match lookup("GRAPH_STORE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("invalid GRAPH_STORE_MAX_CONNECTIONS '{}'", raw))?
                .max(1),
            None => defaults.max_connections,
        };

        let acquire_timeout = parse_secs(&lookup, "GRAPH_STORE_ACQUIRE_TIMEOUT_SECS")?
            .unwrap_or(defaults.acquire_timeout);
        let max_lifetime = parse_secs(&lookup, "GRAPH_STORE_MAX_LIFETIME_SECS")?
            .unwrap_or(defaults.max_lifetime);

        let reset_schema = lookup("GRAPH_STORE_RESET_SCHEMA")
            .map(|value| is_truthy(&value))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
            acquire_timeout,
            max_lifetime,
            reset_schema,
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &str) -> anyhow::Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .with_context(|| format!("invalid {} '{}'", key, raw))
        })
        .transpose()
}

fn is_truthy(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    normalized == "1" || normalized == "true" || normalized == "yes"
}
