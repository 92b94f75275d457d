//! Chunk-parallel execution of a per-row transform.
//!
//! The row range is split into one contiguous chunk per worker. Each chunk
//! writes into its own slice of a pre-sized output buffer, so results land in
//! row order no matter which chunk finishes first, and no locking is needed.
//!
//! # Thread pools
//!
//! - `worker_threads == 0`: run on the current rayon pool. Called from inside
//!   a host engine's rayon pool, the work joins that pool instead of competing
//!   with it.
//! - `worker_threads > 0`: build a pool of that size for this call only. The
//!   pool and its threads are dropped before `run` returns.

pub mod partition;

pub use partition::split_offsets;

use common::EngineError;
use rayon::prelude::*;
use tracing::{debug, trace};

use partition::split_slices;

/// Results of one scheduled run.
///
/// `values[i]` is `None` for rows that produced no value (null input) and for
/// rows listed in `failures`.
#[derive(Debug)]
pub struct ScheduleOutcome<T, E> {
    pub values: Vec<Option<T>>,
    /// `(row, error)` pairs in ascending row order.
    pub failures: Vec<(usize, E)>,
}

/// Runs per-row work across a bounded set of workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler {
    worker_threads: usize,
}

impl Scheduler {
    pub fn new(worker_threads: usize) -> Self {
        Self { worker_threads }
    }

    /// Apply `row_fn` to every row index in `[0, len)`.
    ///
    /// `init(first_row)` builds each chunk's private state (e.g. its nonce
    /// stream) on the worker that processes the chunk. A row error is
    /// recorded and the remaining rows are still processed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if a dedicated pool cannot be built.
    pub fn run<S, T, E, I, F>(
        &self,
        len: usize,
        init: I,
        row_fn: F,
    ) -> Result<ScheduleOutcome<T, E>, EngineError>
    where
        I: Fn(usize) -> S + Sync,
        F: Fn(&mut S, usize) -> Result<Option<T>, E> + Sync,
        T: Send,
        E: Send,
    {
        if self.worker_threads == 0 {
            return Ok(run_in_current_pool(len, &init, &row_fn));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_threads)
            .thread_name(|i| format!("colcrypt-worker-{i}"))
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build worker pool: {e}")))?;
        Ok(pool.install(|| run_in_current_pool(len, &init, &row_fn)))
    }
}

fn run_in_current_pool<S, T, E, I, F>(len: usize, init: &I, row_fn: &F) -> ScheduleOutcome<T, E>
where
    I: Fn(usize) -> S + Sync,
    F: Fn(&mut S, usize) -> Result<Option<T>, E> + Sync,
    T: Send,
    E: Send,
{
    let workers = rayon::current_num_threads();
    let offsets = split_offsets(len, workers);
    debug!(rows = len, workers, chunks = offsets.len(), "scheduling column transform");

    let mut values: Vec<Option<T>> = Vec::with_capacity(len);
    values.resize_with(len, || None);

    let chunk_failures: Vec<Vec<(usize, E)>> = split_slices(&mut values, &offsets)
        .into_par_iter()
        .map(|(offset, slots)| {
            trace!(offset, rows = slots.len(), "chunk started");
            let mut state = init(offset);
            let mut failed = Vec::new();
            for (i, slot) in slots.iter_mut().enumerate() {
                let row = offset + i;
                match row_fn(&mut state, row) {
                    Ok(value) => *slot = value,
                    Err(e) => failed.push((row, e)),
                }
            }
            failed
        })
        .collect();

    ScheduleOutcome {
        values,
        failures: chunk_failures.into_iter().flatten().collect(),
    }
}
