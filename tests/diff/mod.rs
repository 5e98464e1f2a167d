// Test module entry point for diff tests
// Shared fixtures for driving runs against in-process stores

mod keyset_props;
mod reconcile_tests;
mod sync_tests;

use rediff::store::{InMemoryStore, KvStore};
use rediff::{ConnectionPool, DiffConfig, SelectionPolicy, Value};
use std::sync::Arc;

pub fn stores() -> (Arc<InMemoryStore>, Arc<InMemoryStore>) {
    (Arc::new(InMemoryStore::new("mem-a")), Arc::new(InMemoryStore::new("mem-b")))
}

pub fn pool(a: &Arc<InMemoryStore>, b: &Arc<InMemoryStore>) -> Arc<ConnectionPool> {
    let a: Arc<dyn KvStore> = a.clone();
    let b: Arc<dyn KvStore> = b.clone();
    Arc::new(ConnectionPool::shared(a, b, 3, SelectionPolicy::Random).unwrap())
}

pub fn config() -> DiffConfig {
    DiffConfig {
        quiet: true,
        ..Default::default()
    }
}

pub fn scalar(s: &str) -> Value {
    Value::Scalar(s.as_bytes().to_vec())
}

pub fn list(items: &[&str]) -> Value {
    Value::List(items.iter().map(|s| s.as_bytes().to_vec()).collect())
}

pub fn set(items: &[&str]) -> Value {
    Value::Set(items.iter().map(|s| s.as_bytes().to_vec()).collect())
}

pub fn map(fields: &[(&str, &str)]) -> Value {
    Value::Map(fields.iter().map(|(k, v)| (k.as_bytes().to_vec(), v.as_bytes().to_vec())).collect())
}

pub fn keys(items: &[&str]) -> std::collections::BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}
