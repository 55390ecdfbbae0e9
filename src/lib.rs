//! # Bulkline - Adaptive Batch-Execution Engine
//!
//! Bulkline takes a large in-memory collection of records and writes it to a
//! backing store through a sequence of bounded-size operations. It provides:
//!
//! - **Chunked execution**: bounded writes with an all-or-nothing commit
//!   boundary per chunk
//! - **Adaptive sizing**: a throughput feedback loop that doubles or halves
//!   the chunk size within configured bounds
//! - **Parallel fan-out**: disjoint slices across workers, one exclusive
//!   backend session each, order-independent result merging
//! - **Resilient mode**: per-record commit boundaries with classified,
//!   structured failure capture
//! - **Batch optimization**: a stateless advisor for starting sizes and
//!   execution plans
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Async API Layer (Engine)                    │
//! │        (run_chunked, run_adaptive, run_parallel, run_resilient) │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Execution Modes                           │
//! │                                                                 │
//! │  ┌──────────────┐  ┌─────────────┐  ┌────────────────────────┐ │
//! │  │  Adaptive    │  │  Parallel   │  │  Resilient             │ │
//! │  │  sizing loop │  │  fan-out    │  │  per-record commits    │ │
//! │  └──────┬───────┘  └──────┬──────┘  └───────────┬────────────┘ │
//! │         └─────────────────┼─────────────────────┘              │
//! │                           ▼                                    │
//! │                 ┌───────────────────┐                          │
//! │                 │   Chunk Runner    │                          │
//! │                 │ (commit per chunk)│                          │
//! │                 └─────────┬─────────┘                          │
//! └───────────────────────────┼────────────────────────────────────┘
//!                             ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Sink (caller-supplied)                     │
//! │          one bounded write per call, exclusive session          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is storage-agnostic and generic over the record type: it
//! depends only on the [`Sink`] capability, never inspects record contents,
//! and assumes the full record set fits in memory.
//!
//! ## Core Invariants
//!
//! 1. **Complete accounting**: `successful + failed == total` in every
//!    returned result
//! 2. **Commit boundaries**: a chunk (or, in resilient mode, a record) is
//!    committed or rolled back as a unit, never left in between
//! 3. **Input order within a worker**: records are written in input order
//!    inside each slice; merge across slices is order-independent
//! 4. **Bounded sizes**: the adaptive loop never steps outside
//!    `[min_size, max_size]`
//! 5. **Primary errors win**: a failure during rollback recovery is logged
//!    and suppressed, never allowed to mask the original error
//!
//! ## Module Organization
//!
//! - [`error`]: error enum and backend-failure classification
//! - [`types`]: operations, outcomes, run results, size metrics
//! - [`sink`]: the backend write capability the engine depends on
//! - [`chunk`]: chunked execution with per-chunk commit
//! - [`adaptive`]: throughput-driven chunk sizing
//! - [`optimizer`]: stateless size/plan advisor
//! - [`parallel`]: fan-out across workers with result merging
//! - [`resilient`]: per-record failure isolation
//! - [`api`]: async engine handle (main entry point)

// =============================================================================
// Module Declarations
// =============================================================================

/// Error types and backend-failure classification.
pub mod error;

/// Value types exchanged between the engine and its callers.
pub mod types;

/// The backend write capability and per-worker acquisition.
pub mod sink;

/// Chunked execution with a commit boundary per chunk.
pub mod chunk;

/// Throughput-driven adaptive chunk sizing.
pub mod adaptive;

/// Stateless batch-size and execution-plan advisor.
pub mod optimizer;

/// Parallel fan-out across workers with order-independent merging.
pub mod parallel;

/// Per-record execution with classified failure capture.
pub mod resilient;

/// Async API over a dedicated engine thread.
pub mod api;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::{spawn_engine, Engine};
pub use error::{Error, FailureCode, Result};
pub use sink::{Sink, SinkFactory};

pub use adaptive::{AdaptiveConfig, AdaptiveRunner};
pub use chunk::ChunkRunner;
pub use optimizer::{BatchOptimizer, Constraints, ExecutionPlan, OptimizationReport};
pub use parallel::{ParallelConfig, ParallelCoordinator};
pub use resilient::ResilientProcessor;

pub use types::{
    ChunkOutcome, DetailedRunResult, FailedRecord, Operation, RunResult, SizeMetric,
};
