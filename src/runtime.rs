//! Batch runtime.
//!
//! A bounded pool of scoped worker threads drains a job channel; each job
//! is one problem, solved independently. Results are written back by input
//! index, so output order always matches input order. Cancellation is
//! cooperative: workers check the flag before starting a problem, and
//! problems that never started report `ExecutionError::Cancelled`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::ResultCache;
use crate::engine::{SolutionResult, SolveEngine};
use crate::error::{ExecutionError, SolveError, SolveResult};
use crate::problem::{Problem, ProblemSpec};
use crate::timeout::{call_with_timeout, CallError};

/// Batch runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Maximum queued problems.
    pub queue_capacity: usize,
    /// Per-problem wall-clock budget. `None` means unbounded.
    pub problem_budget_ms: Option<u64>,
    /// Share results between problems with the same fingerprint.
    pub use_cache: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
            problem_budget_ms: None,
            use_cache: true,
        }
    }
}

impl BatchConfig {
    /// Per-problem budget.
    #[must_use]
    pub fn problem_budget(&self) -> Option<Duration> {
        self.problem_budget_ms.map(Duration::from_millis)
    }
}

/// Stops a running batch after the in-flight problems finish.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a previous cancellation so the runtime accepts work again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Returns true once `cancel` was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Order-preserving parallel batch solver.
#[derive(Debug)]
pub struct BatchRuntime {
    engine: Arc<SolveEngine>,
    config: BatchConfig,
    cache: Arc<ResultCache>,
    cancel: CancelHandle,
}

impl BatchRuntime {
    /// Creates a runtime using the engine's batch configuration.
    #[must_use]
    pub fn new(engine: SolveEngine) -> Self {
        let config = engine.config().batch.clone();
        Self::with_config(Arc::new(engine), config)
    }

    /// Creates a runtime with an explicit configuration.
    #[must_use]
    pub fn with_config(engine: Arc<SolveEngine>, config: BatchConfig) -> Self {
        Self {
            engine,
            config,
            cache: Arc::new(ResultCache::new()),
            cancel: CancelHandle::default(),
        }
    }

    /// Handle for cancelling batches run by this runtime.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// The shared result cache.
    #[must_use]
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Solve every problem, returning one result per input in input order.
    #[must_use]
    pub fn solve_batch(&self, specs: Vec<ProblemSpec>) -> Vec<SolveResult<SolutionResult>> {
        let total = specs.len();
        if total == 0 {
            return Vec::new();
        }

        let workers = self.config.workers.max(1).min(total);
        let (job_tx, job_rx) = bounded::<(usize, ProblemSpec)>(self.config.queue_capacity.max(1));
        let (out_tx, out_rx) = unbounded::<(usize, SolveResult<SolutionResult>)>();
        let mut spawn_error = None;

        thread::scope(|scope| {
            let mut spawned = 0;
            for idx in 0..workers {
                let rx = job_rx.clone();
                let tx = out_tx.clone();
                let handle = thread::Builder::new()
                    .name(format!("stepwise-batch-{idx}"))
                    .spawn_scoped(scope, move || {
                        for (index, spec) in rx.iter() {
                            let result = if self.cancel.is_cancelled() {
                                Err(ExecutionError::Cancelled.into())
                            } else {
                                self.run_one(spec)
                            };
                            if tx.send((index, result)).is_err() {
                                break;
                            }
                        }
                    });
                match handle {
                    Ok(_) => spawned += 1,
                    Err(err) => {
                        warn!(worker = idx, error = %err, "failed to spawn batch worker");
                        spawn_error = Some(err.to_string());
                    }
                }
            }
            // Workers hold the remaining receivers; sends fail once they all exit.
            drop(job_rx);

            if spawned > 0 {
                for job in specs.into_iter().enumerate() {
                    if self.cancel.is_cancelled() || job_tx.send(job).is_err() {
                        break;
                    }
                }
            }
            drop(job_tx);
        });
        drop(out_tx);

        let mut slots: Vec<Option<SolveResult<SolutionResult>>> = (0..total).map(|_| None).collect();
        for (index, result) in out_rx.try_iter() {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(result);
            }
        }

        let cancelled = self.cancel.is_cancelled();
        let results: Vec<SolveResult<SolutionResult>> = slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(match (&spawn_error, cancelled) {
                        (Some(reason), _) => ExecutionError::WorkerSpawn { reason: reason.clone() },
                        (None, true) => ExecutionError::Cancelled,
                        (None, false) => ExecutionError::Disconnected {
                            path: "batch".to_string(),
                        },
                    }
                    .into())
                })
            })
            .collect();

        info!(
            total,
            workers,
            completed = results.iter().filter(|r| r.is_ok()).count(),
            cancelled = results.iter().filter(|r| r.as_ref().is_err_and(SolveError::is_cancelled)).count(),
            timed_out = results.iter().filter(|r| r.as_ref().is_err_and(SolveError::is_timeout)).count(),
            "batch finished"
        );
        results
    }

    fn run_one(&self, spec: ProblemSpec) -> SolveResult<SolutionResult> {
        let problem = Problem::try_from(spec)?;
        let id = problem.id;
        let engine = Arc::clone(&self.engine);
        let cache = self.config.use_cache.then(|| Arc::clone(&self.cache));

        let task = move || match cache {
            Some(cache) => cache.get_or_compute(problem.fingerprint(), || engine.solve(&problem)),
            None => Ok(engine.solve(&problem)),
        };

        match call_with_timeout("problem", self.config.problem_budget(), task) {
            Ok(result) => result,
            Err(CallError::TimedOut { duration_ms }) => {
                warn!(problem_id = %id, duration_ms, "problem exceeded its budget");
                Err(ExecutionError::Timeout { duration_ms }.into())
            }
            Err(CallError::Panicked) => Err(SolveError::internal(format!("solve of {id} panicked"))),
            Err(CallError::Spawn { reason }) => Err(ExecutionError::WorkerSpawn { reason }.into()),
        }
    }
}
