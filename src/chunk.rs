//! # Chunked Execution with Per-Chunk Commit
//!
//! This module implements the basic execution strategy: split the input list
//! into bounded chunks, write each through the [`Sink`] with its own commit
//! boundary, and accumulate counts into one [`RunResult`].
//!
//! ```text
//! records: [r0 r1 r2 r3 r4 r5 r6 r7 r8 r9]      chunk_size = 4
//!
//! chunk 1: [r0 r1 r2 r3] → write → COMMIT
//! chunk 2: [r4 r5 r6 r7] → write → COMMIT
//! chunk 3: [r8 r9]       → write → COMMIT       (min(chunk_size, remaining))
//! ```
//!
//! ## Commit Boundary
//!
//! Each chunk is all-or-nothing: a successful write is committed before the
//! next chunk starts, and a failed write is rolled back. A chunk-level
//! backend failure aborts the run: committed chunks stay committed, the
//! failed chunk and everything after it count as failed, and the caller
//! still receives a [`RunResult`] rather than an error.
//!
//! ## Cancellation
//!
//! The runner checks its cancellation token between chunks. An in-flight
//! write always runs to its commit or rollback, so cancellation never leaves
//! a chunk in an ambiguous commit state; records never attempted count as
//! failed in the partial result.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::sink::Sink;
use crate::types::{ChunkOutcome, Operation, RunResult};

// =============================================================================
// Chunk Runner
// =============================================================================

/// Executes a record list in bounded chunks with a commit boundary per chunk.
///
/// Owns its [`Sink`] exclusively for the duration of the run; the adaptive
/// controller and the parallel coordinator's workers are both built on top of
/// this type. Single-threaded within one run.
pub struct ChunkRunner<S> {
    sink: S,
    cancel: CancellationToken,
}

impl<S> ChunkRunner<S> {
    /// Creates a runner over an exclusively owned sink.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            cancel: CancellationToken::new(),
        }
    }

    /// Attaches a cancellation token, observed between chunks.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Consumes the runner, returning the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Runs the full chunk loop over `records`.
    ///
    /// Requires `chunk_size >= 1`; [`Error::InvalidChunkSize`] otherwise, and
    /// that is the only way this method errors. Empty input returns an all-zero
    /// result without invoking the sink.
    pub fn run<R>(&mut self, records: &[R], op: Operation, chunk_size: usize) -> Result<RunResult>
    where
        S: Sink<R>,
    {
        if chunk_size == 0 {
            return Err(Error::InvalidChunkSize);
        }
        if records.is_empty() {
            return Ok(RunResult::empty());
        }

        let total = records.len() as u64;
        let mut successful = 0u64;
        let mut failed = 0u64;
        let mut elapsed = std::time::Duration::ZERO;
        let mut offset = 0usize;

        while offset < records.len() {
            if self.cancel.is_cancelled() {
                debug!(offset, total, "run cancelled between chunks");
                break;
            }

            let end = (offset + chunk_size).min(records.len());
            match self.write_chunk(&records[offset..end], op) {
                Ok(outcome) => {
                    successful += outcome.records_accepted;
                    failed += outcome.records_rejected();
                    elapsed += outcome.elapsed;
                    offset = end;
                }
                Err(err) => {
                    warn!(%err, offset, chunk_len = end - offset, "chunk failed, aborting run");
                    break;
                }
            }
        }

        // Everything not accepted by a committed chunk counts as failed:
        // rejected rows, the aborted chunk, and the unconsumed remainder.
        let remainder = total - successful - failed;
        Ok(RunResult::from_counts(total, successful, failed + remainder, elapsed))
    }

    /// Writes and commits a single chunk.
    ///
    /// This is the single-chunk path the adaptive controller drives directly.
    /// On a write or commit failure the chunk is rolled back; a rollback
    /// failure during that recovery is logged and suppressed so it never
    /// masks the primary error.
    pub fn write_chunk<R>(&mut self, chunk: &[R], op: Operation) -> Result<ChunkOutcome>
    where
        S: Sink<R>,
    {
        match self.sink.write(chunk, op) {
            Ok(outcome) => {
                if let Err(err) = self.sink.commit() {
                    self.rollback_suppressed::<R>();
                    return Err(err);
                }
                Ok(outcome)
            }
            Err(err) => {
                self.rollback_suppressed::<R>();
                Err(err)
            }
        }
    }

    fn rollback_suppressed<R>(&mut self)
    where
        S: Sink<R>,
    {
        if let Err(err) = self.sink.rollback() {
            warn!(%err, "rollback during error recovery failed, keeping primary error");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
