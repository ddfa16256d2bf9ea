use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Execution events emitted by the engine.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted { task: &'static str, partitions: usize },
    ThrottleWaited { task: &'static str, duration: Duration },
    TaskStarted { task: &'static str, slot: usize, rows: usize },
    TaskFinished { task: &'static str, slot: usize },
    RunFinished {
        task: &'static str,
        elapsed: Duration,
        metrics: ExecutionMetricsSnapshot,
    },
}

/// Observer hook for execution events.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// Forwards execution events to `tracing` at debug level.
#[derive(Debug, Default)]
pub struct TracingExecutionObserver;

impl ExecutionObserver for TracingExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunFinished { task, elapsed, metrics } => {
                tracing::debug!(task, ?elapsed, %metrics, "stage finished");
            }
            other => tracing::trace!(event = ?other, "execution event"),
        }
    }
}

/// Live counters for the most recent [`crate::execution::ExecutionEngine::run_tasks`] call.
///
/// Reset at the start of every run; snapshot at any time, including mid-run.
#[derive(Default)]
pub struct ExecutionMetrics {
    rows: AtomicU64,
    started: AtomicU64,
    finished: AtomicU64,
    throttle_wait_ns: AtomicU64,
    elapsed_ns: AtomicU64,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_run(&self) {
        for counter in [&self.rows, &self.started, &self.finished, &self.throttle_wait_ns, &self.elapsed_ns] {
            counter.store(0, Ordering::SeqCst);
        }
        self.active.store(0, Ordering::SeqCst);
        self.peak_active.store(0, Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns.store(nanos(elapsed), Ordering::SeqCst);
    }

    pub fn on_rows_processed(&self, rows: usize) {
        self.rows.fetch_add(rows as u64, Ordering::SeqCst);
    }

    pub fn on_task_start(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(now, Ordering::SeqCst);
    }

    pub fn on_task_end(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn on_throttle_wait(&self, d: Duration) {
        self.throttle_wait_ns.fetch_add(nanos(d), Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        ExecutionMetricsSnapshot {
            elapsed: (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns)),
            rows_processed: self.rows.load(Ordering::SeqCst),
            tasks_started: self.started.load(Ordering::SeqCst),
            tasks_finished: self.finished.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_tasks: self.peak_active.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time copy of [`ExecutionMetrics`]. `elapsed` is `None` while a run is in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub elapsed: Option<Duration>,
    pub rows_processed: u64,
    pub tasks_started: u64,
    pub tasks_finished: u64,
    pub throttle_wait: Duration,
    pub max_active_tasks: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows in {}/{} tasks (peak {} in flight, throttled {:?})",
            self.rows_processed,
            self.tasks_finished,
            self.tasks_started,
            self.max_active_tasks,
            self.throttle_wait
        )?;
        if let Some(elapsed) = self.elapsed {
            write!(f, " in {elapsed:?}")?;
        }
        Ok(())
    }
}
