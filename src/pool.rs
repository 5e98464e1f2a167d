//! Fixed-size connection pools for both sides.

use futures::future::try_join_all;
use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::DiffError;
use crate::store::{Endpoint, KvStore, RedisStore};

/// Which store instance an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Side {
    /// The authoritative side.
    A,
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("A"),
            Side::B => f.write_str("B"),
        }
    }
}

/// How `handle()` picks a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Independent uniform draw per call.
    #[default]
    Random,
    /// Cycle through handles in order.
    RoundRobin,
}

struct SidePool {
    handles: Vec<Arc<dyn KvStore>>,
    cursor: AtomicUsize,
}

impl SidePool {
    fn new(handles: Vec<Arc<dyn KvStore>>) -> Self {
        Self {
            handles,
            cursor: AtomicUsize::new(0),
        }
    }

    fn pick(&self, policy: SelectionPolicy) -> Arc<dyn KvStore> {
        let index = match policy {
            SelectionPolicy::Random => rand::thread_rng().gen_range(0..self.handles.len()),
            SelectionPolicy::RoundRobin => {
                self.cursor.fetch_add(1, Ordering::Relaxed) % self.handles.len()
            }
        };
        Arc::clone(&self.handles[index])
    }
}

/// Live handles to side A and side B.
///
/// Handles are created once and never replaced; a handle that loses its
/// connection surfaces a transport error that ends the run.
pub struct ConnectionPool {
    a: SidePool,
    b: SidePool,
    policy: SelectionPolicy,
}

impl ConnectionPool {
    /// Connect `size` handles to each side and wait for all of them.
    pub async fn connect(
        endpoint_a: &Endpoint,
        endpoint_b: &Endpoint,
        size: usize,
        policy: SelectionPolicy,
    ) -> Result<Self, DiffError> {
        if size == 0 {
            return Err(DiffError::Config("pool size must be at least 1".to_string()));
        }

        info!(a = %endpoint_a, b = %endpoint_b, size, "connecting");

        let (a, b) = tokio::try_join!(
            Self::connect_side(Side::A, endpoint_a, size),
            Self::connect_side(Side::B, endpoint_b, size),
        )?;

        info!(handles = 2 * size, "all handles ready");
        Self::from_handles(a, b, policy)
    }

    async fn connect_side(
        side: Side,
        endpoint: &Endpoint,
        size: usize,
    ) -> Result<Vec<Arc<dyn KvStore>>, DiffError> {
        let attempts = (0..size).map(|i| async move {
            let store = RedisStore::connect(endpoint)
                .await
                .map_err(|source| DiffError::Connection { side, source })?;
            debug!(%side, handle = i, "connected");
            Ok::<Arc<dyn KvStore>, DiffError>(Arc::new(store))
        });
        try_join_all(attempts).await
    }

    /// Build a pool from ready-made handles.
    pub fn from_handles(
        a: Vec<Arc<dyn KvStore>>,
        b: Vec<Arc<dyn KvStore>>,
        policy: SelectionPolicy,
    ) -> Result<Self, DiffError> {
        if a.is_empty() || b.is_empty() {
            return Err(DiffError::Config("pool size must be at least 1".to_string()));
        }
        Ok(Self {
            a: SidePool::new(a),
            b: SidePool::new(b),
            policy,
        })
    }

    /// Pool of `size` clones of one store per side. Useful for in-process stores.
    pub fn shared(
        a: Arc<dyn KvStore>,
        b: Arc<dyn KvStore>,
        size: usize,
        policy: SelectionPolicy,
    ) -> Result<Self, DiffError> {
        Self::from_handles(vec![a; size], vec![b; size], policy)
    }

    /// One handle for `side`, chosen by the pool's policy.
    pub fn handle(&self, side: Side) -> Arc<dyn KvStore> {
        self.side(side).pick(self.policy)
    }

    /// Display name of a side's store.
    pub fn endpoint(&self, side: Side) -> String {
        self.side(side).handles[0].endpoint().to_string()
    }

    fn side(&self, side: Side) -> &SidePool {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }
}
