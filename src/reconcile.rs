//! Reconciler: drives a diff run from key enumeration to the final result.
//!
//! The reconciler owns all run state. Per-key comparison tasks are spawned
//! at a bounded rate and their results are folded back into that state
//! from the control loop only, so counters need no locking.

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::compare::ValueComparator;
use crate::config::DiffConfig;
use crate::error::{DiffError, StoreError};
use crate::keys::{KeyEnumerator, KeyFilter, KeyPartition};
use crate::pool::{ConnectionPool, Side};
use crate::progress::{Progress, ProgressReporter, RunPhase};
use crate::report::{DiffReport, PhaseTimings};
use crate::resolve::{TypeResolver, ValueFetcher};
use crate::schedule::{DispatchLimiter, DispatchRate, PhaseTimer};
use crate::sync::Synchronizer;
use crate::value::ContainerType;

/// Outcome of comparing one shared key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Identical,
    Different,
    /// Type unsupported on at least one side; not compared.
    Skipped,
}

/// Lifecycle of one shared key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pending,
    TypeResolving,
    Fetching,
    Compared(Verdict),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOutcome {
    pub key: String,
    pub container_type: ContainerType,
    pub verdict: Verdict,
}

impl KeyOutcome {
    pub fn state(&self) -> KeyState {
        KeyState::Compared(self.verdict)
    }
}

/// Partition of both keyspaces after comparison.
///
/// `unique_to_a`, `unique_to_b` and `shared` are pairwise disjoint and
/// cover every key seen; `different` and `skipped` are subsets of `shared`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DiffResult {
    pub keys_a: usize,
    pub keys_b: usize,
    pub unique_to_a: BTreeSet<String>,
    pub unique_to_b: BTreeSet<String>,
    pub shared: BTreeSet<String>,
    pub different: BTreeSet<String>,
    pub skipped: BTreeSet<String>,
}

impl DiffResult {
    /// True when B matches A for every compared key.
    pub fn is_clean(&self) -> bool {
        self.unique_to_a.is_empty() && self.unique_to_b.is_empty() && self.different.is_empty()
    }

    pub fn unique_count(&self) -> usize {
        self.unique_to_a.len() + self.unique_to_b.len()
    }
}

/// Folds finished key tasks into the run's result.
struct Tally {
    different: BTreeSet<String>,
    skipped: BTreeSet<String>,
    progress: ProgressReporter,
}

impl Tally {
    fn absorb(
        &mut self,
        joined: Result<Result<KeyOutcome, StoreError>, JoinError>,
    ) -> Result<(), StoreError> {
        match joined {
            Ok(Ok(outcome)) => {
                match outcome.verdict {
                    Verdict::Identical => {}
                    Verdict::Different => {
                        self.different.insert(outcome.key.clone());
                    }
                    Verdict::Skipped => {
                        self.skipped.insert(outcome.key.clone());
                    }
                }
                self.progress.inc(&outcome.key);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(e) => {
                // A panicked task still counts toward the join barrier
                error!(error = %e, "comparison task failed");
                self.progress.inc("");
                Ok(())
            }
        }
    }
}

/// Orchestrates enumeration, diffing, comparison and optional sync.
pub struct Reconciler {
    pool: Arc<ConnectionPool>,
    limiter: DispatchLimiter,
    filter: KeyFilter,
    pattern: String,
    write: bool,
    show_progress: bool,
    phase: RunPhase,
    progress_tx: Option<mpsc::Sender<Progress>>,
    timings: PhaseTimings,
}

impl Reconciler {
    pub fn new(pool: Arc<ConnectionPool>, config: &DiffConfig) -> Result<Self, DiffError> {
        Ok(Self {
            pool,
            limiter: DispatchLimiter::new(DispatchRate::new(config.interval()), config.max_in_flight),
            filter: KeyFilter::from_patterns(&config.exclude)?,
            pattern: config.pattern.clone(),
            write: config.write,
            show_progress: !config.quiet && !config.json,
            phase: RunPhase::Idle,
            progress_tx: None,
            timings: PhaseTimings::default(),
        })
    }

    /// Also publish progress on a channel.
    pub fn with_progress(mut self, tx: mpsc::Sender<Progress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn enter(&mut self, phase: RunPhase) {
        info!(?phase, "entering phase");
        self.phase = phase;
        if let Some(ref tx) = self.progress_tx {
            let _ = tx.try_send(Progress {
                phase,
                completed: 0,
                total: 0,
            });
        }
    }

    /// Full run: diff, then sync B from A when writing is enabled.
    pub async fn run(&mut self) -> Result<DiffReport, DiffError> {
        let result = self.diff().await?;

        let sync = if self.write {
            self.enter(RunPhase::Syncing);
            let mut timer = PhaseTimer::new();
            timer.start();
            let mut synchronizer = Synchronizer::new(Arc::clone(&self.pool), self.limiter.clone())
                .with_progress_visible(self.show_progress);
            if let Some(tx) = self.progress_tx.clone() {
                synchronizer = synchronizer.with_progress(tx);
            }
            let stats = synchronizer.run(&result).await?;
            timer.stop();
            self.timings.sync = Some(timer.elapsed());
            Some(stats)
        } else {
            None
        };

        self.enter(RunPhase::Done);
        Ok(DiffReport::new(
            result,
            sync,
            self.pool.endpoint(Side::A),
            self.pool.endpoint(Side::B),
            self.timings.clone(),
        ))
    }

    /// Enumerate, partition and compare. Leaves the run in `Comparing`
    /// until `run` moves it on.
    pub async fn diff(&mut self) -> Result<DiffResult, DiffError> {
        self.enter(RunPhase::EnumeratingKeys);
        let mut timer = PhaseTimer::new();
        timer.start();
        let (keys_a, keys_b) = KeyEnumerator::list_both(&self.pool, &self.pattern).await?;
        let keys_a = self.filter.apply(keys_a);
        let keys_b = self.filter.apply(keys_b);
        timer.stop();
        self.timings.enumerate = timer.elapsed();

        self.enter(RunPhase::Diffing);
        let (count_a, count_b) = (keys_a.len(), keys_b.len());
        let partition = KeyPartition::compute(keys_a, keys_b);
        info!(
            unique_a = partition.unique_to_a.len(),
            unique_b = partition.unique_to_b.len(),
            shared = partition.shared.len(),
            "key sets partitioned"
        );

        self.enter(RunPhase::Comparing);
        let mut timer = PhaseTimer::new();
        timer.start();
        let (different, skipped) = self.compare_keys(&partition.shared).await?;
        timer.record(partition.shared.len() as u64);
        timer.stop();
        self.timings.compare = timer.elapsed();
        self.timings.compare_rate = timer.rate();

        Ok(DiffResult {
            keys_a: count_a,
            keys_b: count_b,
            unique_to_a: partition.unique_to_a.into_iter().collect(),
            unique_to_b: partition.unique_to_b.into_iter().collect(),
            shared: partition.shared.into_iter().collect(),
            different,
            skipped,
        })
    }

    /// Compare every shared key, one task per key.
    ///
    /// Returns once every task has reported. A transport fault aborts the
    /// outstanding tasks and is returned.
    pub async fn compare_keys(
        &mut self,
        shared: &[String],
    ) -> Result<(BTreeSet<String>, BTreeSet<String>), DiffError> {
        let mut tally = Tally {
            different: BTreeSet::new(),
            skipped: BTreeSet::new(),
            progress: ProgressReporter::new(
                RunPhase::Comparing,
                shared.len(),
                self.show_progress,
                self.progress_tx.clone(),
            ),
        };
        let mut tasks: JoinSet<Result<KeyOutcome, StoreError>> = JoinSet::new();
        info!(total = shared.len(), rate = %self.limiter.rate().display(), "comparing shared keys");

        for key in shared {
            let ticket = self.limiter.acquire().await;
            let pool = Arc::clone(&self.pool);
            let key = key.clone();
            debug!(key = %key, state = ?KeyState::Pending, "dispatching");
            tasks.spawn(async move {
                let _ticket = ticket;
                Self::compare_key(&pool, key).await
            });

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = tally.absorb(joined) {
                    return Err(Self::abort(&mut tasks, &tally.progress, e));
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = tally.absorb(joined) {
                return Err(Self::abort(&mut tasks, &tally.progress, e));
            }
        }

        tally.progress.finish();
        debug_assert!(tally.progress.is_done());
        info!(
            checked = tally.progress.completed(),
            different = tally.different.len(),
            skipped = tally.skipped.len(),
            "comparison complete"
        );
        Ok((tally.different, tally.skipped))
    }

    fn abort<T: 'static>(tasks: &mut JoinSet<T>, progress: &ProgressReporter, e: StoreError) -> DiffError {
        error!(error = %e, "transport fault, aborting run");
        tasks.abort_all();
        progress.finish();
        DiffError::from_store(e)
    }

    /// Resolve, fetch and compare one key.
    ///
    /// Type resolution always completes before any value read. A type
    /// mismatch is classified as different without reading values.
    pub async fn compare_key(pool: &ConnectionPool, key: String) -> Result<KeyOutcome, StoreError> {
        debug!(key = %key, state = ?KeyState::TypeResolving);
        let container_type = TypeResolver::resolve(pool, &key).await?;

        let verdict = match container_type {
            ContainerType::Unknown => {
                warn!(key = %key, "[ISSUE] unsupported or unreadable type, skipping");
                Verdict::Skipped
            }
            ContainerType::Mismatch => Verdict::Different,
            ty => {
                debug!(key = %key, %ty, state = ?KeyState::Fetching);
                let (a, b) = ValueFetcher::fetch(pool, &key, ty).await?;
                if ValueComparator::identical(ty, &a, &b) {
                    Verdict::Identical
                } else {
                    Verdict::Different
                }
            }
        };

        debug!(key = %key, state = ?KeyState::Compared(verdict));
        Ok(KeyOutcome {
            key,
            container_type,
            verdict,
        })
    }
}
