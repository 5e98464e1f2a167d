//! Store client contract used by the pool and everything above it.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

pub use crate::error::StoreError;
pub use memory::InMemoryStore;
pub use self::redis::RedisStore;

use crate::value::Bytes;

/// Default port used when an endpoint has no `:port` suffix.
pub const DEFAULT_PORT: u16 = 6379;

/// Where a side lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Plain `host[:port]`.
    HostPort { host: String, port: u16 },
    /// A full `redis://` or `rediss://` URL, used as-is.
    Url(String),
}

impl Endpoint {
    /// Parse `host`, `host:port` or a URL.
    pub fn parse(input: &str, default_port: u16) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        if input.starts_with("redis://") || input.starts_with("rediss://") {
            return Some(Endpoint::Url(input.to_string()));
        }

        // Bracketed IPv6: [::1]:6380
        if let Some(rest) = input.strip_prefix('[') {
            let (host, tail) = rest.split_once(']')?;
            let port = match tail.strip_prefix(':') {
                Some(p) => p.parse().ok()?,
                None if tail.is_empty() => default_port,
                None => return None,
            };
            return Some(Endpoint::HostPort {
                host: format!("[{}]", host),
                port,
            });
        }

        match input.rsplit_once(':') {
            Some((host, port)) => {
                if host.is_empty() || host.contains(':') {
                    return None;
                }
                Some(Endpoint::HostPort {
                    host: host.to_string(),
                    port: port.parse().ok()?,
                })
            }
            None => Some(Endpoint::HostPort {
                host: input.to_string(),
                port: default_port,
            }),
        }
    }

    /// Connection URL for the redis client.
    pub fn url(&self) -> String {
        match self {
            Endpoint::HostPort { host, port } => format!("redis://{}:{}/", host, port),
            Endpoint::Url(url) => url.clone(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::HostPort { host, port } => write!(f, "{}:{}", host, port),
            Endpoint::Url(url) => f.write_str(url),
        }
    }
}

/// One live handle to one store.
///
/// Keys are text; values are raw bytes, as Redis strings are binary-safe.
/// Every call answers exactly once. Implementations map connection
/// problems to [`StoreError::Transport`] and per-key rejections to
/// [`StoreError::Command`].
#[async_trait]
pub trait KvStore: Send + Sync {
    // ========== Reads ==========

    /// Full keyspace listing matching a glob pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Raw type name of a key (`string`, `list`, `set`, `hash`, `none`, ...).
    async fn key_type(&self, key: &str) -> Result<String, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Whole list, in order.
    async fn lrange_all(&self, key: &str) -> Result<Vec<Bytes>, StoreError>;

    async fn smembers(&self, key: &str) -> Result<Vec<Bytes>, StoreError>;

    async fn hgetall(&self, key: &str) -> Result<HashMap<Bytes, Bytes>, StoreError>;

    // ========== Writes ==========

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Append one element to the tail of a list.
    async fn rpush(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    async fn sadd(&self, key: &str, member: &[u8]) -> Result<(), StoreError>;

    async fn hset(&self, key: &str, field: &[u8], value: &[u8]) -> Result<(), StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;

    // ========== Info ==========

    /// Display name of the store this handle talks to.
    fn endpoint(&self) -> &str;
}
