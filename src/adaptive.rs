//! # Adaptive Chunk Sizing
//!
//! This module wraps the chunk loop in a throughput feedback loop: after
//! each chunk it compares measured throughput against the previous chunk and
//! grows or shrinks the next chunk size within configured bounds.
//!
//! ```text
//! throughput vs previous chunk        next chunk size
//! ──────────────────────────────      ─────────────────────────────
//! > 1.1× (clear improvement)          size × 2, clamped to max_size
//! < 0.9× (clear regression)           size ÷ 2, clamped to min_size
//! within ±10%                         unchanged (noise, not signal)
//! ```
//!
//! Doubling on improvement finds the backend's sweet spot in few steps;
//! halving on regression backs off quickly when the backend starts choking.
//! The ±10% band keeps measurement noise from oscillating the size. No
//! adaptation happens until two chunks have been measured, since a single
//! sample carries no signal.
//!
//! ## Metric History
//!
//! The controller records one [`SizeMetric`] per chunk into an instance-owned
//! history, cleared at the start of each run and readable afterwards via
//! [`AdaptiveRunner::metrics`]. It is the input the
//! [`BatchOptimizer`](crate::optimizer::BatchOptimizer) analyzes
//! retrospectively. The history is never shared across runs, which makes a
//! controller instance single-run-at-a-time by contract.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::chunk::ChunkRunner;
use crate::error::{Error, Result};
use crate::sink::Sink;
use crate::types::{Operation, RunResult, SizeMetric};

// =============================================================================
// Tunables
// =============================================================================

/// Throughput ratio above which the chunk size doubles.
const GROWTH_TRIGGER: f64 = 1.1;

/// Throughput ratio below which the chunk size halves.
const SHRINK_TRIGGER: f64 = 0.9;

// =============================================================================
// Configuration
// =============================================================================

/// Bounds for the adaptive control loop.
#[derive(Debug, Clone, Copy)]
pub struct AdaptiveConfig {
    /// Chunk size for the first chunk.
    pub initial_size: usize,
    /// Hard lower clamp; halving never steps below this.
    pub min_size: usize,
    /// Hard upper clamp; doubling never steps above this.
    pub max_size: usize,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            initial_size: 100,
            min_size: 10,
            max_size: 10_000,
        }
    }
}

impl AdaptiveConfig {
    fn validate(&self) -> Result<()> {
        if self.min_size == 0 {
            return Err(Error::InvalidConfig("min_size must be at least 1".into()));
        }
        if self.min_size > self.max_size {
            return Err(Error::InvalidConfig(format!(
                "min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.initial_size < self.min_size || self.initial_size > self.max_size {
            return Err(Error::InvalidConfig(format!(
                "initial_size ({}) outside [{}, {}]",
                self.initial_size, self.min_size, self.max_size
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Adaptive Runner
// =============================================================================

/// Chunked execution with throughput-driven size adaptation.
///
/// Built on [`ChunkRunner`]'s single-chunk path; inherits its commit
/// boundary and abort-on-failure semantics.
pub struct AdaptiveRunner<S> {
    chunks: ChunkRunner<S>,
    config: AdaptiveConfig,
    history: Vec<SizeMetric>,
    cancel: CancellationToken,
}

impl<S> AdaptiveRunner<S> {
    pub fn new(sink: S, config: AdaptiveConfig) -> Self {
        Self {
            chunks: ChunkRunner::new(sink),
            config,
            history: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Attaches a cancellation token, observed between chunks.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Size metrics recorded during the most recent run, one per chunk.
    pub fn metrics(&self) -> &[SizeMetric] {
        &self.history
    }

    /// Consumes the runner, returning the sink.
    pub fn into_sink(self) -> S {
        self.chunks.into_sink()
    }

    /// Runs over `records`, tuning the chunk size as it goes.
    ///
    /// Clears the metric history, then executes chunks starting at
    /// `initial_size`, adapting after every chunk once two measurements
    /// exist. A chunk-level backend failure aborts the run with the
    /// remainder counted as failed, exactly like the fixed-size path.
    pub fn run<R>(&mut self, records: &[R], op: Operation) -> Result<RunResult>
    where
        S: Sink<R>,
    {
        self.config.validate()?;
        self.history.clear();

        if records.is_empty() {
            return Ok(RunResult::empty());
        }

        let total = records.len() as u64;
        let mut successful = 0u64;
        let mut failed = 0u64;
        let mut elapsed = std::time::Duration::ZERO;
        let mut size = self.config.initial_size;
        let mut offset = 0usize;

        while offset < records.len() {
            if self.cancel.is_cancelled() {
                debug!(offset, total, "adaptive run cancelled between chunks");
                break;
            }

            let end = (offset + size).min(records.len());
            let chunk = &records[offset..end];

            match self.chunks.write_chunk(chunk, op) {
                Ok(outcome) => {
                    successful += outcome.records_accepted;
                    failed += outcome.records_rejected();
                    elapsed += outcome.elapsed;
                    offset = end;

                    self.history.push(SizeMetric {
                        chunk_size: chunk.len(),
                        elapsed: outcome.elapsed,
                        throughput: outcome.throughput(),
                    });
                    size = self.adapt(size);
                }
                Err(err) => {
                    warn!(%err, offset, size, "chunk failed, aborting adaptive run");
                    break;
                }
            }
        }

        let remainder = total - successful - failed;
        Ok(RunResult::from_counts(total, successful, failed + remainder, elapsed))
    }

    /// Picks the next chunk size from the last two measurements.
    fn adapt(&self, current: usize) -> usize {
        let n = self.history.len();
        if n < 2 {
            return current;
        }

        let previous = self.history[n - 2].throughput;
        let latest = self.history[n - 1].throughput;

        let next = if latest > previous * GROWTH_TRIGGER {
            (current * 2).min(self.config.max_size)
        } else if latest < previous * SHRINK_TRIGGER {
            (current / 2).max(self.config.min_size)
        } else {
            current
        };

        if next != current {
            debug!(
                previous_throughput = previous,
                latest_throughput = latest,
                from = current,
                to = next,
                "adapted chunk size"
            );
        }
        next
    }
}

// =============================================================================
// Tests
// =============================================================================
