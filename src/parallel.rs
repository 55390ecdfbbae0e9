//! # Parallel Fan-Out Execution
//!
//! This module partitions the record list into contiguous, near-equal slices
//! and runs the chunk loop concurrently over each slice, one worker thread
//! and one exclusively owned [`Sink`](crate::sink::Sink) per slice.
//!
//! ```text
//! records ──┬── slice 0 ── worker 0 ── sink 0 ──┐
//!           ├── slice 1 ── worker 1 ── sink 1 ──┼── merge (field-wise sum)
//!           ├── slice 2 ── worker 2 ── sink 2 ──┤
//!           └── slice 3 ── worker 3 ── sink 3 ──┘
//! ```
//!
//! ## Isolation
//!
//! Workers never share a Sink or its session, so there is no locking inside
//! a worker. A worker whose Sink acquisition fails, or that dies outright,
//! contributes an all-failed outcome for its slice; one broken backend node
//! must not block or invalidate the others.
//!
//! ## Ordering
//!
//! Within a slice, records are written in input order. Across slices no
//! ordering is guaranteed or needed: [`RunResult::merge`] is a commutative,
//! associative field-wise sum, so completion order cannot change the merged
//! totals. The merged `elapsed` is aggregate backend time across slices, not
//! wall clock.
//!
//! Workers block only while a Sink call is in flight; the coordinator blocks
//! only while waiting for the scope's workers to finish. The record list is
//! a shared read-only borrow for the duration of the run (`R: Sync`).

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::chunk::ChunkRunner;
use crate::error::{Error, Result};
use crate::sink::SinkFactory;
use crate::types::{Operation, RunResult};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for parallel fan-out.
#[derive(Debug, Clone, Copy)]
pub struct ParallelConfig {
    /// Number of slices, and therefore concurrent workers.
    pub parallelism: usize,
    /// Fixed chunk size each worker uses over its slice.
    pub chunk_size: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            chunk_size: crate::optimizer::DEFAULT_CHUNK_SIZE,
        }
    }
}

// =============================================================================
// Parallel Coordinator
// =============================================================================

/// Fans a run out across worker threads and merges their outcomes.
pub struct ParallelCoordinator<F> {
    factory: F,
    config: ParallelConfig,
    cancel: CancellationToken,
}

impl<F> ParallelCoordinator<F> {
    pub fn new(factory: F, config: ParallelConfig) -> Self {
        Self {
            factory,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Attaches a cancellation token, observed before each worker launch and
    /// between chunks inside every worker.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs `records` across `parallelism` workers and merges the outcomes.
    ///
    /// Slices are contiguous with `slice_size = ceil(total / parallelism)`;
    /// the final slice absorbs the remainder. Only non-empty slices get a
    /// worker. Requires `parallelism >= 1` and `chunk_size >= 1`.
    pub fn run<R>(&self, records: &[R], op: Operation) -> Result<RunResult>
    where
        F: SinkFactory<R>,
        R: Sync,
    {
        if self.config.parallelism == 0 {
            return Err(Error::InvalidConfig("parallelism must be at least 1".into()));
        }
        if self.config.chunk_size == 0 {
            return Err(Error::InvalidChunkSize);
        }
        if records.is_empty() {
            return Ok(RunResult::empty());
        }

        let slice_size = records.len().div_ceil(self.config.parallelism);
        let slices: Vec<&[R]> = records.chunks(slice_size).collect();

        let outcomes = std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(slices.len());

            for (index, slice) in slices.iter().copied().enumerate() {
                // Once cancelled, stop launching workers; their slices are
                // reported as never attempted.
                if self.cancel.is_cancelled() {
                    handles.push((slice.len() as u64, None));
                    continue;
                }

                let cancel = self.cancel.clone();
                let spawned = std::thread::Builder::new()
                    .name(format!("bulkline-worker-{}", index))
                    .spawn_scoped(scope, move || {
                        run_slice(&self.factory, slice, op, self.config.chunk_size, cancel)
                    });

                match spawned {
                    Ok(handle) => handles.push((slice.len() as u64, Some(handle))),
                    Err(err) => {
                        warn!(%err, index, "failed to spawn worker, slice reported all-failed");
                        handles.push((slice.len() as u64, None));
                    }
                }
            }

            handles
                .into_iter()
                .map(|(slice_len, handle)| match handle {
                    Some(handle) => handle.join().unwrap_or_else(|_| {
                        warn!(slice_len, "worker died, slice reported all-failed");
                        RunResult::all_failed(slice_len)
                    }),
                    None => RunResult::all_failed(slice_len),
                })
                .collect::<Vec<_>>()
        });

        Ok(outcomes
            .into_iter()
            .fold(RunResult::empty(), RunResult::merge))
    }
}

/// One worker's share of the run: acquire a sink, chunk through the slice.
fn run_slice<F, R>(
    factory: &F,
    slice: &[R],
    op: Operation,
    chunk_size: usize,
    cancel: CancellationToken,
) -> RunResult
where
    F: SinkFactory<R>,
{
    let sink = match factory.acquire() {
        Ok(sink) => sink,
        Err(err) => {
            warn!(%err, slice_len = slice.len(), "sink acquisition failed, slice reported all-failed");
            return RunResult::all_failed(slice.len() as u64);
        }
    };

    let mut runner = ChunkRunner::new(sink).with_cancellation(cancel);
    match runner.run(slice, op, chunk_size) {
        Ok(result) => result,
        // chunk_size was validated by the coordinator; any error here means
        // the slice produced nothing durable.
        Err(err) => {
            warn!(%err, slice_len = slice.len(), "slice run failed, reported all-failed");
            RunResult::all_failed(slice.len() as u64)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
