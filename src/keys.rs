//! Key enumeration and key-set partitioning.
//!
//! Both sides are listed concurrently, then split into keys unique to A,
//! keys unique to B and keys shared by both.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tracing::{info, warn};

use crate::error::DiffError;
use crate::pool::{ConnectionPool, Side};

/// Entries present on exactly one side. Also used for hash field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKeys<T = String> {
    pub unique_to_a: Vec<T>,
    pub unique_to_b: Vec<T>,
}

impl<T> Default for UniqueKeys<T> {
    fn default() -> Self {
        Self {
            unique_to_a: Vec::new(),
            unique_to_b: Vec::new(),
        }
    }
}

impl<T> UniqueKeys<T> {
    pub fn len(&self) -> usize {
        self.unique_to_a.len() + self.unique_to_b.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn dedup<T: Eq + Hash>(keys: &[T]) -> impl Iterator<Item = &T> {
    let mut seen = HashSet::new();
    keys.iter().filter(move |k| seen.insert(*k))
}

/// Symmetric difference of two key sets.
///
/// A presence flag is toggled for every key as each side is scanned, so a
/// key survives iff exactly one side has it. Output keeps first-seen order.
pub fn diff_keys<T: Eq + Hash + Clone>(a: &[T], b: &[T]) -> UniqueKeys<T> {
    let mut presence: HashMap<&T, bool> = HashMap::new();
    let mut order: Vec<&T> = Vec::new();

    for key in dedup(a).chain(dedup(b)) {
        let flag = presence.entry(key).or_insert_with(|| {
            order.push(key);
            false
        });
        *flag = !*flag;
    }

    let in_a: HashSet<&T> = a.iter().collect();
    let mut unique = UniqueKeys::default();
    for key in order.into_iter().filter(|k| presence[k]) {
        if in_a.contains(key) {
            unique.unique_to_a.push(key.clone());
        } else {
            unique.unique_to_b.push(key.clone());
        }
    }
    unique
}

/// De-duplicated union of both sides minus the unique keys.
pub fn shared_keys(a: &[String], b: &[String], unique: &UniqueKeys) -> Vec<String> {
    let unique: HashSet<&str> = unique
        .unique_to_a
        .iter()
        .chain(unique.unique_to_b.iter())
        .map(String::as_str)
        .collect();

    let mut seen = HashSet::new();
    a.iter()
        .chain(b.iter())
        .map(String::as_str)
        .filter(|k| !unique.contains(k) && seen.insert(*k))
        .map(str::to_string)
        .collect()
}

/// Three-way split of two key sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPartition {
    pub unique_to_a: Vec<String>,
    pub unique_to_b: Vec<String>,
    pub shared: Vec<String>,
}

impl KeyPartition {
    /// Sort both sides, then partition. Results come out in key order.
    pub fn compute(mut a: Vec<String>, mut b: Vec<String>) -> Self {
        a.sort();
        b.sort();
        let unique = diff_keys(&a, &b);
        let shared = shared_keys(&a, &b, &unique);
        Self {
            unique_to_a: unique.unique_to_a,
            unique_to_b: unique.unique_to_b,
            shared,
        }
    }
}

/// Glob-based key exclusion applied to both sides before diffing.
#[derive(Debug, Clone)]
pub struct KeyFilter {
    glob_set: GlobSet,
    patterns: Vec<String>,
}

impl Default for KeyFilter {
    fn default() -> Self {
        Self {
            glob_set: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }
}

impl KeyFilter {
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, DiffError> {
        let mut builder = GlobSetBuilder::new();
        let mut pattern_list = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = Glob::new(pattern)
                .map_err(|e| DiffError::Config(format!("bad exclude pattern '{}': {}", pattern, e)))?;
            builder.add(glob);
            pattern_list.push(pattern.to_string());
        }

        Ok(Self {
            glob_set: builder
                .build()
                .map_err(|e| DiffError::Config(e.to_string()))?,
            patterns: pattern_list,
        })
    }

    pub fn is_excluded(&self, key: &str) -> bool {
        self.glob_set.is_match(key)
    }

    pub fn apply(&self, keys: Vec<String>) -> Vec<String> {
        if self.patterns.is_empty() {
            return keys;
        }
        keys.into_iter().filter(|k| !self.is_excluded(k)).collect()
    }
}

/// Lists the keyspace of both sides.
pub struct KeyEnumerator;

impl KeyEnumerator {
    /// Scan both sides concurrently; returns once both scans are done.
    ///
    /// A command error on one side is logged and leaves that side empty.
    /// A transport error is fatal.
    pub async fn list_both(
        pool: &ConnectionPool,
        pattern: &str,
    ) -> Result<(Vec<String>, Vec<String>), DiffError> {
        info!("collecting keys from both instances");
        let (a, b) = tokio::join!(
            Self::list_keys(pool, Side::A, pattern),
            Self::list_keys(pool, Side::B, pattern),
        );
        Ok((a?, b?))
    }

    pub async fn list_keys(
        pool: &ConnectionPool,
        side: Side,
        pattern: &str,
    ) -> Result<Vec<String>, DiffError> {
        match pool.handle(side).keys(pattern).await {
            Ok(keys) => {
                let keys: Vec<String> = dedup(&keys).cloned().collect();
                info!(%side, count = keys.len(), "collected keys");
                Ok(keys)
            }
            Err(e) if e.is_fatal() => Err(DiffError::from_store(e)),
            Err(e) => {
                warn!(%side, error = %e, "error getting keys, continuing with an empty key set");
                Ok(Vec::new())
            }
        }
    }
}
