//! # Resilient (Partial-Failure) Execution
//!
//! This mode abandons chunk-level atomicity and gives every record its own
//! commit boundary. A rejected record is rolled back, classified, and
//! captured as a structured [`FailedRecord`]; surrounding records are never
//! re-ordered or dropped.
//!
//! ```text
//! chunked:                      resilient:
//! [r0 r1 r2 r3] → COMMIT       r0 → COMMIT
//!      all-or-nothing          r1 → ROLLBACK   (captured: index 1, code, message)
//!                              r2 → COMMIT
//!                              r3 → COMMIT
//! ```
//!
//! This trades throughput for fault isolation (one Sink round trip and one
//! commit per record) and is the right choice exactly when partial success
//! is valuable, e.g. best-effort ingestion of a batch from an untrusted
//! source where one bad record must not sink the other ten thousand.
//!
//! ## Error Recovery
//!
//! A rollback failure during error handling is logged and suppressed: the
//! primary rejection has already been captured, and a secondary failure must
//! not mask it.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, FailureCode, Result};
use crate::sink::Sink;
use crate::types::{DetailedRunResult, FailedRecord, Operation, RunResult};

// =============================================================================
// Resilient Processor
// =============================================================================

/// Executes a run one record at a time, capturing classified failures.
///
/// Requires `R: Clone` because rejected payloads are carried in the result.
/// Single-threaded within one run, like the chunked paths.
pub struct ResilientProcessor<S> {
    sink: S,
    cancel: CancellationToken,
}

impl<S> ResilientProcessor<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            cancel: CancellationToken::new(),
        }
    }

    /// Attaches a cancellation token, observed between records.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Consumes the processor, returning the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Runs over `records`, committing each record individually.
    ///
    /// Always returns a result: backend rejections become [`FailedRecord`]
    /// entries (in ascending input order), never errors. Records skipped by
    /// cancellation are captured with [`FailureCode::Cancelled`] so the
    /// `failures.len() == failed_records` invariant holds for partial runs.
    pub fn run<R>(&mut self, records: &[R], op: Operation) -> Result<DetailedRunResult<R>>
    where
        S: Sink<R>,
        R: Clone,
    {
        let total = records.len() as u64;
        let mut successful = 0u64;
        let mut elapsed = std::time::Duration::ZERO;
        let mut failures: Vec<FailedRecord<R>> = Vec::new();

        for (index, record) in records.iter().enumerate() {
            if self.cancel.is_cancelled() {
                debug!(index, total, "resilient run cancelled between records");
                for (skipped, record) in records[index..].iter().enumerate() {
                    failures.push(FailedRecord {
                        index: index + skipped,
                        record: record.clone(),
                        code: FailureCode::Cancelled,
                        message: "run cancelled before this record was attempted".to_string(),
                    });
                }
                break;
            }

            match self.sink.write(std::slice::from_ref(record), op) {
                Ok(outcome) if outcome.records_accepted > 0 => {
                    elapsed += outcome.elapsed;
                    match self.sink.commit() {
                        Ok(()) => successful += 1,
                        Err(err) => {
                            self.rollback_suppressed::<R>();
                            failures.push(classified_failure(index, record, &err));
                        }
                    }
                }
                Ok(outcome) => {
                    // Backend accepted the call but silently rejected the row.
                    elapsed += outcome.elapsed;
                    self.rollback_suppressed::<R>();
                    failures.push(FailedRecord {
                        index,
                        record: record.clone(),
                        code: FailureCode::Unclassified,
                        message: "record rejected without a backend error".to_string(),
                    });
                }
                Err(err) => {
                    self.rollback_suppressed::<R>();
                    failures.push(classified_failure(index, record, &err));
                }
            }
        }

        let summary = RunResult::from_counts(total, successful, failures.len() as u64, elapsed);
        Ok(DetailedRunResult { summary, failures })
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

/// Builds a classified failure entry from a backend error.
fn classified_failure<R: Clone>(index: usize, record: &R, err: &Error) -> FailedRecord<R> {
    let message = match err {
        Error::Backend { message, .. } => message.clone(),
        other => other.to_string(),
    };
    FailedRecord {
        index,
        record: record.clone(),
        code: err.classification(),
        message,
    }
}

// =============================================================================
// Tests
// =============================================================================
