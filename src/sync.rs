//! One-way repair: make side B match side A.
//!
//! Keys only on B are deleted, keys only on A are copied, and keys whose
//! values differ are deleted on B and copied again. Copies are written one
//! element at a time, so a failure part-way through can leave a partially
//! written list or map on B.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{DiffError, StoreError};
use crate::pool::{ConnectionPool, Side};
use crate::progress::{Progress, ProgressReporter, RunPhase};
use crate::reconcile::DiffResult;
use crate::resolve::{TypeReport, TypeResolver, ValueFetcher};
use crate::schedule::DispatchLimiter;
use crate::value::Value;

/// Action to take for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Key exists only on B.
    DeleteFromB { key: String },
    /// Key exists only on A.
    CopyToB { key: String },
    /// Key differs: delete on B, then copy from A.
    OverwriteOnB { key: String },
}

impl SyncAction {
    pub fn key(&self) -> &str {
        match self {
            Self::DeleteFromB { key } => key,
            Self::CopyToB { key } => key,
            Self::OverwriteOnB { key } => key,
        }
    }
}

/// Actions derived from a diff result, in key order per category.
pub fn plan(result: &DiffResult) -> Vec<SyncAction> {
    let deletes = result
        .unique_to_b
        .iter()
        .map(|key| SyncAction::DeleteFromB { key: key.clone() });
    let copies = result
        .unique_to_a
        .iter()
        .map(|key| SyncAction::CopyToB { key: key.clone() });
    let overwrites = result
        .different
        .iter()
        .map(|key| SyncAction::OverwriteOnB { key: key.clone() });
    deletes.chain(copies).chain(overwrites).collect()
}

/// What happened to one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Deleted,
    Copied { elements: usize },
    Overwritten { elements: usize },
    /// Type unsupported on A, or the key vanished from A.
    Skipped,
    /// A per-key command failed. B is untouched if A could not be read,
    /// otherwise it may hold a partial copy.
    Failed,
}

/// A's value for a key about to be copied.
enum Source {
    Ready(Value),
    Absent,
    Unreadable,
}

/// Sync statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncStats {
    pub planned: usize,
    pub deleted: usize,
    pub copied: usize,
    pub overwritten: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Individual element writes issued against B.
    pub elements_written: usize,
}

impl SyncStats {
    fn record(&mut self, outcome: ActionOutcome) {
        match outcome {
            ActionOutcome::Deleted => self.deleted += 1,
            ActionOutcome::Copied { elements } => {
                self.copied += 1;
                self.elements_written += elements;
            }
            ActionOutcome::Overwritten { elements } => {
                self.overwritten += 1;
                self.elements_written += elements;
            }
            ActionOutcome::Skipped => self.skipped += 1,
            ActionOutcome::Failed => self.failed += 1,
        }
    }

    pub fn finished(&self) -> usize {
        self.deleted + self.copied + self.overwritten + self.skipped + self.failed
    }
}

/// Keep transport faults as errors, log and swallow per-key faults.
fn soft<T>(result: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(error = %e, "sync command failed");
            Ok(None)
        }
    }
}

/// Copies A onto B for every unique and different key.
pub struct Synchronizer {
    pool: Arc<ConnectionPool>,
    limiter: DispatchLimiter,
    show_progress: bool,
    progress_tx: Option<mpsc::Sender<Progress>>,
}

impl Synchronizer {
    pub fn new(pool: Arc<ConnectionPool>, limiter: DispatchLimiter) -> Self {
        Self {
            pool,
            limiter,
            show_progress: false,
            progress_tx: None,
        }
    }

    pub fn with_progress_visible(mut self, visible: bool) -> Self {
        self.show_progress = visible;
        self
    }

    /// Also publish progress on a channel.
    pub fn with_progress(mut self, tx: mpsc::Sender<Progress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Execute the plan for `result`. Returns once every action has finished.
    pub async fn run(&self, result: &DiffResult) -> Result<SyncStats, DiffError> {
        let actions = plan(result);
        let mut stats = SyncStats {
            planned: actions.len(),
            ..Default::default()
        };
        info!(
            delete = result.unique_to_b.len(),
            copy = result.unique_to_a.len(),
            overwrite = result.different.len(),
            "synchronizing B from A"
        );

        let mut progress = ProgressReporter::new(
            RunPhase::Syncing,
            actions.len(),
            self.show_progress,
            self.progress_tx.clone(),
        );
        let mut tasks: JoinSet<Result<ActionOutcome, StoreError>> = JoinSet::new();

        for action in actions {
            let ticket = self.limiter.acquire().await;
            let pool = Arc::clone(&self.pool);
            tasks.spawn(async move {
                let _ticket = ticket;
                Self::execute(&pool, &action).await
            });

            while let Some(joined) = tasks.try_join_next() {
                Self::absorb(&mut tasks, &mut stats, &mut progress, joined)?;
            }
        }

        while let Some(joined) = tasks.join_next().await {
            Self::absorb(&mut tasks, &mut stats, &mut progress, joined)?;
        }

        progress.finish();
        info!(
            deleted = stats.deleted,
            copied = stats.copied,
            overwritten = stats.overwritten,
            skipped = stats.skipped,
            failed = stats.failed,
            "synchronization complete"
        );
        Ok(stats)
    }

    fn absorb(
        tasks: &mut JoinSet<Result<ActionOutcome, StoreError>>,
        stats: &mut SyncStats,
        progress: &mut ProgressReporter,
        joined: Result<Result<ActionOutcome, StoreError>, tokio::task::JoinError>,
    ) -> Result<(), DiffError> {
        match joined {
            Ok(Ok(outcome)) => stats.record(outcome),
            Ok(Err(e)) => {
                error!(error = %e, "transport fault, aborting sync");
                tasks.abort_all();
                progress.finish();
                return Err(DiffError::from_store(e));
            }
            Err(e) => {
                error!(error = %e, "sync task failed");
                stats.record(ActionOutcome::Failed);
            }
        }
        progress.inc("");
        Ok(())
    }

    /// Run one action against the pool.
    ///
    /// A is read in full before B is touched, so a key that cannot be read
    /// on A is never deleted on B.
    pub async fn execute(pool: &ConnectionPool, action: &SyncAction) -> Result<ActionOutcome, StoreError> {
        let key = match action {
            SyncAction::DeleteFromB { key } => {
                debug!(key = %key, "deleting from B");
                return Ok(match soft(pool.handle(Side::B).del(key).await)? {
                    Some(()) => ActionOutcome::Deleted,
                    None => ActionOutcome::Failed,
                });
            }
            SyncAction::CopyToB { key } | SyncAction::OverwriteOnB { key } => key,
        };
        let overwrite = matches!(action, SyncAction::OverwriteOnB { .. });

        let value = match Self::read_source(pool, key).await? {
            Source::Ready(value) => value,
            Source::Absent => {
                warn!(key = %key, "unsupported type or key gone on A, not copying");
                return Ok(ActionOutcome::Skipped);
            }
            Source::Unreadable => {
                warn!(key = %key, "could not read A, leaving B untouched");
                return Ok(ActionOutcome::Failed);
            }
        };

        if overwrite {
            debug!(key = %key, "overwriting on B");
            if soft(pool.handle(Side::B).del(key).await)?.is_none() {
                return Ok(ActionOutcome::Failed);
            }
        }

        Ok(match Self::write_value(pool, key, &value).await? {
            Some(elements) if overwrite => ActionOutcome::Overwritten { elements },
            Some(elements) => ActionOutcome::Copied { elements },
            None => ActionOutcome::Failed,
        })
    }

    async fn read_source(pool: &ConnectionPool, key: &str) -> Result<Source, StoreError> {
        let ty = match TypeResolver::resolve_side(pool, Side::A, key).await? {
            TypeReport::Known(ty) => ty,
            TypeReport::Unsupported(_) => return Ok(Source::Absent),
            TypeReport::Failed => return Ok(Source::Unreadable),
        };

        Ok(match ValueFetcher::fetch_side(pool, Side::A, key, ty).await? {
            Value::Unreadable => Source::Unreadable,
            Value::Missing | Value::Mismatched => Source::Absent,
            value => Source::Ready(value),
        })
    }

    /// Write `value` to B element by element. `None` when a write failed
    /// part-way.
    async fn write_value(pool: &ConnectionPool, key: &str, value: &Value) -> Result<Option<usize>, StoreError> {
        debug!(key, elements = value.element_count(), "copying to B");

        let mut written = 0usize;
        let complete = match value {
            Value::Scalar(s) => {
                let ok = soft(pool.handle(Side::B).set(key, s).await)?.is_some();
                written += ok as usize;
                ok
            }
            Value::List(items) => {
                let mut ok = true;
                for item in items {
                    if soft(pool.handle(Side::B).rpush(key, item).await)?.is_none() {
                        ok = false;
                        break;
                    }
                    written += 1;
                }
                ok
            }
            Value::Set(members) => {
                let mut ok = true;
                for member in members {
                    if soft(pool.handle(Side::B).sadd(key, member).await)?.is_none() {
                        ok = false;
                        break;
                    }
                    written += 1;
                }
                ok
            }
            Value::Map(fields) => {
                let mut ok = true;
                for (field, v) in fields {
                    if soft(pool.handle(Side::B).hset(key, field, v).await)?.is_none() {
                        ok = false;
                        break;
                    }
                    written += 1;
                }
                ok
            }
            Value::Missing | Value::Unreadable | Value::Mismatched => true,
        };

        if complete {
            Ok(Some(written))
        } else {
            warn!(key, written, "copy stopped part-way, B holds a partial value");
            Ok(None)
        }
    }
}
