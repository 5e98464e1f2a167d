//! Redis-backed store handle.
//!
//! Each `RedisStore` owns one multiplexed connection. The pool creates
//! several of these per side and hands them out per operation.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{Endpoint, KvStore, StoreError};
use crate::value::Bytes;

pub struct RedisStore {
    connection: MultiplexedConnection,
    endpoint: String,
}

impl RedisStore {
    /// Open a connection and wait until the server answers `PING`.
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, StoreError> {
        let name = endpoint.to_string();

        let client = Client::open(endpoint.url())
            .map_err(|e| StoreError::transport(&name, e.to_string()))?;

        let mut connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::transport(&name, e.to_string()))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| StoreError::transport(&name, e.to_string()))?;
        debug!(endpoint = %name, reply = %pong, "handle ready");

        Ok(Self {
            connection,
            endpoint: name,
        })
    }

    /// Classify a redis error: connection-level problems are fatal transport
    /// faults, anything else belongs to the key.
    fn classify(&self, command: &'static str, key: &str, err: RedisError) -> StoreError {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            StoreError::transport(&self.endpoint, err.to_string())
        } else {
            StoreError::command(command, key, err.to_string())
        }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Vec<Vec<u8>> = conn
            .keys(pattern)
            .await
            .map_err(|e| self.classify("keys", pattern, e))?;

        // Commands address keys as text; a key that is not UTF-8 cannot be diffed
        let mut keys = Vec::with_capacity(raw.len());
        for bytes in raw {
            match String::from_utf8(bytes) {
                Ok(key) => keys.push(key),
                Err(e) => warn!(
                    endpoint = %self.endpoint,
                    key = %String::from_utf8_lossy(e.as_bytes()),
                    "leaving out key that is not valid UTF-8"
                ),
            }
        }
        Ok(keys)
    }

    async fn key_type(&self, key: &str) -> Result<String, StoreError> {
        let mut conn = self.connection.clone();
        let t: String = redis::cmd("TYPE")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| self.classify("type", key, e))?;
        Ok(t)
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let mut conn = self.connection.clone();
        let data: Option<Bytes> = conn
            .get(key)
            .await
            .map_err(|e| self.classify("get", key, e))?;
        Ok(data)
    }

    async fn lrange_all(&self, key: &str) -> Result<Vec<Bytes>, StoreError> {
        let mut conn = self.connection.clone();
        let items: Vec<Bytes> = conn
            .lrange(key, 0, -1)
            .await
            .map_err(|e| self.classify("lrange", key, e))?;
        Ok(items)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<Bytes>, StoreError> {
        let mut conn = self.connection.clone();
        let members: Vec<Bytes> = conn
            .smembers(key)
            .await
            .map_err(|e| self.classify("smembers", key, e))?;
        Ok(members)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<Bytes, Bytes>, StoreError> {
        let mut conn = self.connection.clone();
        let fields: HashMap<Bytes, Bytes> = conn
            .hgetall(key)
            .await
            .map_err(|e| self.classify("hgetall", key, e))?;
        Ok(fields)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .set(key, value)
            .await
            .map_err(|e| self.classify("set", key, e))?;
        Ok(())
    }

    async fn rpush(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .rpush(key, value)
            .await
            .map_err(|e| self.classify("rpush", key, e))?;
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .sadd(key, member)
            .await
            .map_err(|e| self.classify("sadd", key, e))?;
        Ok(())
    }

    async fn hset(&self, key: &str, field: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .hset(key, field, value)
            .await
            .map_err(|e| self.classify("hset", key, e))?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| self.classify("del", key, e))?;
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
