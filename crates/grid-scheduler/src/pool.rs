//! Bounded worker pool shared by all sessions.
//!
//! ## Slots
//!
//! Concurrency is capped by a fair semaphore with `max_workers` permits.
//! The coordinator acquires a permit before submitting each task, so tasks
//! start in submission order across every session (first come, first served).
//!
//! ## Execution
//!
//! Each task runs on a blocking-pool OS thread and releases its permit when
//! it returns. Idle blocking threads are reclaimed by the runtime after its
//! keep-alive period.
//!
//! ## Failures and cancellation
//!
//! A task that errors or panics is logged and its output dropped; sibling
//! tasks are unaffected. Once the cancellation token fires, no further task
//! is submitted and the phase returns [`SchedulerError::Cancelled`]; tasks
//! already running finish on their own and their output is discarded.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{KernelError, Result, SchedulerError};

/// Pipeline phase a batch of tasks belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Boundary filter over cache misses.
    FilterMiss,
    /// Boundary filter over cache hits.
    FilterHit,
    /// Kernel execution over filtered misses.
    Execute,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::FilterMiss => "filter_miss",
            Phase::FilterHit => "filter_hit",
            Phase::Execute => "execute",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics for the worker pool.
///
/// All fields are atomic for lock-free reads from stats endpoints.
#[derive(Default)]
pub struct PoolStats {
    /// Tasks handed to a worker
    pub submitted: AtomicU64,
    /// Tasks that returned output
    pub completed: AtomicU64,
    /// Tasks that errored or panicked
    pub failed: AtomicU64,
    /// Phases abandoned because their session was cancelled
    pub cancelled_phases: AtomicU64,
}

impl PoolStats {
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatsSnapshot {
    pub max_workers: usize,
    pub busy_workers: usize,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled_phases: u64,
}

pub struct WorkerPool {
    permits: Arc<Semaphore>,
    max_workers: usize,
    stats: Arc<PoolStats>,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Number of tasks currently executing.
    pub fn busy_workers(&self) -> usize {
        self.max_workers - self.permits.available_permits()
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            max_workers: self.max_workers,
            busy_workers: self.busy_workers(),
            submitted: self.stats.submitted.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            cancelled_phases: self.stats.cancelled_phases.load(Ordering::Relaxed),
        }
    }

    /// Run every task of one phase and return the outputs of the tasks that
    /// succeeded, in submission order.
    pub async fn run_all<T, R, F>(
        &self,
        session: &str,
        phase: Phase,
        tasks: Vec<T>,
        cancel: &CancellationToken,
        work: F,
    ) -> Result<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> std::result::Result<R, KernelError> + Send + Sync + 'static,
    {
        let work = Arc::new(work);
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(self.abandon(session, phase));
                }
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    // the semaphore is never closed
                    Err(_) => return Err(self.abandon(session, phase)),
                },
            };

            self.stats.submitted.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("exposure_tasks_submitted_total", "phase" => phase.as_str())
                .increment(1);

            let work = work.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                (*work)(task)
            }));
        }

        let submitted = handles.len();
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(self.abandon(session, phase));
            }
            joined = join_all(handles) => joined,
        };

        let mut outputs = Vec::with_capacity(joined.len());
        for (i, result) in joined.into_iter().enumerate() {
            let err = match result {
                Ok(Ok(out)) => {
                    self.stats.completed.fetch_add(1, Ordering::Relaxed);
                    outputs.push(out);
                    continue;
                }
                Ok(Err(e)) => e,
                Err(join_err) => KernelError::Aborted(join_err.to_string()),
            };
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("exposure_tasks_failed_total", "phase" => phase.as_str())
                .increment(1);
            warn!(
                session = %session,
                phase = %phase,
                task = i,
                error = %err,
                "Task failed, dropping its output"
            );
        }

        debug!(
            session = %session,
            phase = %phase,
            submitted = submitted,
            succeeded = outputs.len(),
            "Phase complete"
        );
        Ok(outputs)
    }

    fn abandon(&self, session: &str, phase: Phase) -> SchedulerError {
        self.stats.cancelled_phases.fetch_add(1, Ordering::Relaxed);
        debug!(session = %session, phase = %phase, "Phase abandoned after cancellation");
        SchedulerError::Cancelled(session.to_string())
    }
}
