//! Incremental `completed / total` reporting for the comparing and syncing phases.

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

/// Run-level state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RunPhase {
    Idle,
    EnumeratingKeys,
    Diffing,
    Comparing,
    Syncing,
    Done,
}

/// Progress update for library callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub phase: RunPhase,
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Get progress as a fraction (0.0 - 1.0).
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f32 / self.total as f32
    }
}

/// Drives the terminal bar and the optional progress channel together.
pub struct ProgressReporter {
    bar: ProgressBar,
    tx: Option<mpsc::Sender<Progress>>,
    phase: RunPhase,
    completed: usize,
    total: usize,
}

impl ProgressReporter {
    pub fn new(phase: RunPhase, total: usize, visible: bool, tx: Option<mpsc::Sender<Progress>>) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} keys ({percent}%) | {msg}")
                    .map(|style| style.progress_chars("=>-"))
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            bar,
            tx,
            phase,
            completed: 0,
            total,
        }
    }

    /// Count one finished task.
    pub fn inc(&mut self, message: &str) {
        self.completed += 1;
        self.bar.set_message(message.to_string());
        self.bar.inc(1);
        self.send();
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    // Never blocks the control loop; a full or closed channel drops the update
    fn send(&self) {
        if let Some(ref tx) = self.tx {
            let _ = tx.try_send(Progress {
                phase: self.phase,
                completed: self.completed,
                total: self.total,
            });
        }
    }
}
