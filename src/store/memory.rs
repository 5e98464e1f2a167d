use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use globset::Glob;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{KvStore, StoreError};
use crate::value::{Bytes, Value};

/// In-process store with Redis-like typing rules.
///
/// Besides holding data it can simulate faults: a dropped transport
/// (every call fails) or per-key command errors. It also counts value
/// reads and writes so callers can check which I/O actually happened.
pub struct InMemoryStore {
    name: String,
    data: DashMap<String, Value>,
    /// Keys holding a type outside the four supported shapes, e.g. `zset`.
    exotic: DashMap<String, String>,
    failing_keys: DashSet<String>,
    /// Keys whose value reads fail while `TYPE` still answers.
    failing_reads: DashSet<String>,
    transport_down: AtomicBool,
    value_reads: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryStore {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: DashMap::new(),
            exotic: DashMap::new(),
            failing_keys: DashSet::new(),
            failing_reads: DashSet::new(),
            transport_down: AtomicBool::new(false),
            value_reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Seed a key. Markers with no container type are not storable and are ignored.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        if value.container_type().is_some() {
            let key = key.into();
            self.exotic.remove(&key);
            self.data.insert(key, value);
        }
    }

    /// Seed a key whose type the comparator does not support.
    pub fn insert_unsupported(&self, key: impl Into<String>, type_name: impl Into<String>) {
        let key = key.into();
        self.data.remove(&key);
        self.exotic.insert(key, type_name.into());
    }

    /// Current value of a key, if any.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<Value> {
        self.data.get(key).map(|r| r.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() + self.exotic.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent call fail as if the connection dropped.
    pub fn set_transport_down(&self, down: bool) {
        self.transport_down.store(down, Ordering::SeqCst);
    }

    /// Make every command touching `key` fail.
    pub fn fail_key(&self, key: impl Into<String>) {
        self.failing_keys.insert(key.into());
    }

    /// Make value reads of `key` fail, as a real server does when a reply
    /// cannot be decoded. Type queries and writes still succeed.
    pub fn fail_reads(&self, key: impl Into<String>) {
        self.failing_reads.insert(key.into());
    }

    /// Number of get/lrange/smembers/hgetall calls served.
    #[must_use]
    pub fn value_reads(&self) -> usize {
        self.value_reads.load(Ordering::SeqCst)
    }

    /// Number of write commands served.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self, command: &'static str, key: &str) -> Result<(), StoreError> {
        if self.transport_down.load(Ordering::SeqCst) {
            return Err(StoreError::transport(&self.name, "connection reset by peer"));
        }
        if self.failing_keys.contains(key) {
            return Err(StoreError::command(command, key, "injected failure"));
        }
        Ok(())
    }

    fn wrong_type(command: &'static str, key: &str) -> StoreError {
        StoreError::command(
            command,
            key,
            "WRONGTYPE Operation against a key holding the wrong kind of value",
        )
    }

    fn read(&self, command: &'static str, key: &str) -> Result<Option<Value>, StoreError> {
        self.check(command, key)?;
        self.value_reads.fetch_add(1, Ordering::SeqCst);
        if self.failing_reads.contains(key) {
            return Err(StoreError::command(command, key, "reply could not be decoded"));
        }
        if self.exotic.contains_key(key) {
            return Err(Self::wrong_type(command, key));
        }
        Ok(self.data.get(key).map(|r| r.value().clone()))
    }

    fn write<F>(&self, command: &'static str, key: &str, empty: Value, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Value) -> bool,
    {
        self.check(command, key)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.exotic.contains_key(key) {
            return Err(Self::wrong_type(command, key));
        }
        let mut entry = self.data.entry(key.to_string()).or_insert(empty);
        if apply(entry.value_mut()) {
            Ok(())
        } else {
            Err(Self::wrong_type(command, key))
        }
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.check("keys", pattern)?;
        let matcher = Glob::new(pattern)
            .map_err(|e| StoreError::command("keys", pattern, e.to_string()))?
            .compile_matcher();

        let mut keys: Vec<String> = self
            .data
            .iter()
            .map(|r| r.key().clone())
            .chain(self.exotic.iter().map(|r| r.key().clone()))
            .filter(|k| matcher.is_match(k))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn key_type(&self, key: &str) -> Result<String, StoreError> {
        self.check("type", key)?;
        if let Some(t) = self.exotic.get(key) {
            return Ok(t.value().clone());
        }
        Ok(self
            .data
            .get(key)
            .and_then(|r| r.value().container_type())
            .map(|t| t.type_name().to_string())
            .unwrap_or_else(|| "none".to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        match self.read("get", key)? {
            None => Ok(None),
            Some(Value::Scalar(s)) => Ok(Some(s)),
            Some(_) => Err(Self::wrong_type("get", key)),
        }
    }

    async fn lrange_all(&self, key: &str) -> Result<Vec<Bytes>, StoreError> {
        match self.read("lrange", key)? {
            None => Ok(Vec::new()),
            Some(Value::List(items)) => Ok(items),
            Some(_) => Err(Self::wrong_type("lrange", key)),
        }
    }

    async fn smembers(&self, key: &str) -> Result<Vec<Bytes>, StoreError> {
        match self.read("smembers", key)? {
            None => Ok(Vec::new()),
            Some(Value::Set(members)) => Ok(members),
            Some(_) => Err(Self::wrong_type("smembers", key)),
        }
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<Bytes, Bytes>, StoreError> {
        match self.read("hgetall", key)? {
            None => Ok(HashMap::new()),
            Some(Value::Map(fields)) => Ok(fields),
            Some(_) => Err(Self::wrong_type("hgetall", key)),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.check("set", key)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        // SET replaces whatever type was there
        self.exotic.remove(key);
        self.data.insert(key.to_string(), Value::Scalar(value.to_vec()));
        Ok(())
    }

    async fn rpush(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.write("rpush", key, Value::List(Vec::new()), |v| match v {
            Value::List(items) => {
                items.push(value.to_vec());
                true
            }
            _ => false,
        })
    }

    async fn sadd(&self, key: &str, member: &[u8]) -> Result<(), StoreError> {
        self.write("sadd", key, Value::Set(Vec::new()), |v| match v {
            Value::Set(members) => {
                if !members.iter().any(|m| m.as_slice() == member) {
                    members.push(member.to_vec());
                }
                true
            }
            _ => false,
        })
    }

    async fn hset(&self, key: &str, field: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.write("hset", key, Value::Map(HashMap::new()), |v| match v {
            Value::Map(fields) => {
                fields.insert(field.to_vec(), value.to_vec());
                true
            }
            _ => false,
        })
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.check("del", key)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.data.remove(key);
        self.exotic.remove(key);
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.name
    }
}
