//! # Sink: the Backend Write Capability
//!
//! The engine is storage-agnostic: it depends only on the [`Sink`] trait,
//! which performs one bounded write and reports an outcome. The surrounding
//! system supplies an implementation per backend: a relational adapter that
//! executes a prepared statement per record, a bulk-load adapter that
//! serializes records into a transfer format, or an in-memory double in
//! tests.
//!
//! ## Session Exclusivity
//!
//! A Sink is bound to one exclusive connection or session for the duration
//! of a run. No locking exists inside the engine's workers because no two
//! workers ever share a Sink instance; the parallel coordinator acquires a
//! fresh one per worker through [`SinkFactory`].
//!
//! ## Commit Boundaries
//!
//! `write` stages a chunk; `commit` makes it durable; `rollback` discards it.
//! The chunked path calls `commit` once per chunk (all-or-nothing per chunk),
//! the resilient path once per record. Backends without transactional
//! semantics keep the no-op defaults and make `write` itself durable.
//!
//! ## Atomicity
//!
//! A write is atomic at the backend's discretion. The engine does not assume
//! partial acceptance within a chunk; when partial success matters, the
//! resilient processor pins the chunk size at one record.

use crate::error::Result;
use crate::types::{ChunkOutcome, Operation};

// =============================================================================
// Sink
// =============================================================================

/// One bounded write against the backing store.
///
/// Implementations report their own elapsed time in the returned
/// [`ChunkOutcome`]: the backend knows how long its write took, and test
/// doubles can script it.
pub trait Sink<R> {
    /// Writes `records` using `op`, returning counts and elapsed time.
    ///
    /// Fails with [`Error::Backend`](crate::error::Error::Backend) when the
    /// store rejects the whole chunk (constraint violation, lost
    /// connection). An `Ok` outcome may still report
    /// `records_accepted < records_attempted` for backends that accept a
    /// call while rejecting individual rows.
    fn write(&mut self, records: &[R], op: Operation) -> Result<ChunkOutcome>;

    /// Makes the writes since the last commit boundary durable.
    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    /// Discards the writes since the last commit boundary.
    fn rollback(&mut self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Sink Factory
// =============================================================================

/// Acquires an exclusive [`Sink`] session per worker.
///
/// The parallel coordinator calls `acquire` once per slice, from the worker's
/// own thread, so the factory must be shareable but the produced Sink need
/// not be. An acquisition failure fails only that worker's slice.
pub trait SinkFactory<R>: Send + Sync {
    type Sink: Sink<R>;

    /// Opens a new exclusive session against the backing store.
    fn acquire(&self) -> Result<Self::Sink>;
}

impl<R, T: SinkFactory<R>> SinkFactory<R> for &T {
    type Sink = T::Sink;

    fn acquire(&self) -> Result<Self::Sink> {
        (**self).acquire()
    }
}

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod test_util {
    //! Scripted sink double shared by the execution-mode unit tests.

    use std::time::Duration;

    use super::*;
    use crate::error::Error;

    /// Per-call behavior for [`ScriptedSink`].
    #[derive(Debug, Clone)]
    pub(crate) enum Step {
        /// Accept every record, reporting this elapsed time.
        Ok(Duration),
        /// Accept only this many records, reporting this elapsed time.
        Partial(u64, Duration),
        /// Fail the whole call with this backend code and message.
        Err(Option<&'static str>, &'static str),
    }

    /// A sink whose write behavior follows a script, one step per call.
    ///
    /// When the script runs out, the last step repeats. Records every
    /// attempted size plus commit/rollback counts so tests can assert on the
    /// exact call pattern.
    pub(crate) struct ScriptedSink {
        script: Vec<Step>,
        next: usize,
        pub(crate) writes: Vec<u64>,
        pub(crate) commits: usize,
        pub(crate) rollbacks: usize,
        pub(crate) fail_commit: bool,
        pub(crate) fail_rollback: bool,
    }

    impl ScriptedSink {
        pub(crate) fn new(script: Vec<Step>) -> Self {
            assert!(!script.is_empty(), "script needs at least one step");
            Self {
                script,
                next: 0,
                writes: Vec::new(),
                commits: 0,
                rollbacks: 0,
                fail_commit: false,
                fail_rollback: false,
            }
        }

        /// A sink that accepts everything, always reporting `elapsed`.
        pub(crate) fn accept_all(elapsed: Duration) -> Self {
            Self::new(vec![Step::Ok(elapsed)])
        }

        fn step(&mut self) -> Step {
            let idx = self.next.min(self.script.len() - 1);
            self.next += 1;
            self.script[idx].clone()
        }
    }

    impl<R> Sink<R> for ScriptedSink {
        fn write(&mut self, records: &[R], _op: Operation) -> Result<ChunkOutcome> {
            let attempted = records.len() as u64;
            self.writes.push(attempted);
            match self.step() {
                Step::Ok(elapsed) => Ok(ChunkOutcome::new(attempted, attempted, elapsed)),
                Step::Partial(accepted, elapsed) => {
                    Ok(ChunkOutcome::new(attempted, accepted.min(attempted), elapsed))
                }
                Step::Err(code, message) => Err(Error::backend(code, message)),
            }
        }

        fn commit(&mut self) -> Result<()> {
            self.commits += 1;
            if self.fail_commit {
                return Err(Error::backend(None::<String>, "commit failed"));
            }
            Ok(())
        }

        fn rollback(&mut self) -> Result<()> {
            self.rollbacks += 1;
            if self.fail_rollback {
                return Err(Error::backend(None::<String>, "rollback failed"));
            }
            Ok(())
        }
    }
}
