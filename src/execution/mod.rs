//! Worker pool that runs pipeline stages partition by partition.
//!
//! Each stage is a [`PartitionTask`]: an explicit object that turns one partition-sized input
//! into one output without touching any other partition. The [`ExecutionEngine`] schedules the
//! task over a rayon pool and provides:
//!
//! - bounded concurrency (in-flight partitions) on top of the thread count
//! - real-time metrics + observer hooks for monitoring
//! - order-independent reductions across partition outputs

mod observer;
mod semaphore;

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, ConvertResult};

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver, TracingExecutionObserver,
};

use semaphore::Semaphore;

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Number of worker threads used by the engine.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Upper bound on partitions processed at the same time.
    ///
    /// This is an additional throttle on top of `num_threads`; it bounds the working set when
    /// partitions are large.
    pub max_in_flight_partitions: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        let n = available_threads();
        Self {
            num_threads: Some(n),
            max_in_flight_partitions: n,
        }
    }
}

fn available_threads() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// A partition-local unit of work.
///
/// Implementations must not share mutable state between calls to [`PartitionTask::run`]; the
/// engine may run any number of them at once.
pub trait PartitionTask: Send + Sync {
    /// One partition's worth of input.
    type Input: Send;
    /// Result for that partition.
    type Output: Send;

    /// Stage name used in events and logs.
    fn name(&self) -> &'static str;

    /// Process one partition.
    fn run(&self, input: Self::Input) -> Self::Output;

    /// Number of rows in `input`, for metrics.
    fn rows(&self, _input: &Self::Input) -> usize {
        0
    }
}

/// Schedules [`PartitionTask`]s over a thread pool.
pub struct ExecutionEngine {
    pool: ThreadPool,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    pub fn new(opts: ExecutionOptions) -> ConvertResult<Self> {
        if opts.max_in_flight_partitions == 0 {
            return Err(ConvertError::Config {
                message: "max_in_flight_partitions must be > 0".to_string(),
            });
        }
        if opts.num_threads == Some(0) {
            return Err(ConvertError::Config {
                message: "num_threads must be > 0 when set".to_string(),
            });
        }

        let n_threads = opts.num_threads.unwrap_or_else(available_threads).max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("occurrence-worker-{i}"))
            .build()
            .map_err(|e| ConvertError::Config {
                message: format!("failed to build worker pool: {e}"),
            })?;

        Ok(Self {
            pool,
            opts,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Attach an observer for execution events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run `task` once per input. Outputs are returned in input order.
    pub fn run_tasks<T: PartitionTask>(&self, task: &T, inputs: Vec<T::Input>) -> Vec<T::Output> {
        self.pool.install(|| self.run_tasks_impl(task, inputs))
    }

    /// Run `task` once per input and fold the outputs with `merge`.
    ///
    /// `merge` must be commutative and associative so the result does not depend on which
    /// partition finishes first.
    pub fn reduce<T, I, M>(&self, task: &T, inputs: Vec<T::Input>, identity: I, merge: M) -> T::Output
    where
        T: PartitionTask,
        I: Fn() -> T::Output,
        M: Fn(T::Output, T::Output) -> T::Output,
    {
        self.run_tasks(task, inputs).into_iter().fold(identity(), merge)
    }

    fn run_tasks_impl<T: PartitionTask>(&self, task: &T, inputs: Vec<T::Input>) -> Vec<T::Output> {
        let start = Instant::now();
        let name = task.name();
        self.metrics.begin_run();
        self.emit(ExecutionEvent::RunStarted {
            task: name,
            partitions: inputs.len(),
        });

        let sem = Semaphore::new(self.opts.max_in_flight_partitions);

        let outputs: Vec<T::Output> = inputs
            .into_par_iter()
            .enumerate()
            .map(|(slot, input)| {
                let permit = sem.acquire();
                let waited = permit.waited();
                if waited > Duration::ZERO {
                    self.metrics.on_throttle_wait(waited);
                    self.emit(ExecutionEvent::ThrottleWaited { task: name, duration: waited });
                }

                let rows = task.rows(&input);
                self.metrics.on_task_start();
                self.emit(ExecutionEvent::TaskStarted { task: name, slot, rows });

                let out = task.run(input);

                self.metrics.on_rows_processed(rows);
                self.emit(ExecutionEvent::TaskFinished { task: name, slot });
                self.metrics.on_task_end();
                drop(permit);
                out
            })
            .collect();

        self.metrics.end_run(start.elapsed());
        self.emit(ExecutionEvent::RunFinished {
            task: name,
            elapsed: start.elapsed(),
            metrics: self.metrics.snapshot(),
        });

        outputs
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("opts", &self.opts)
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}
