//! # Async API for Bulkline
//!
//! This module provides the public async interface for the engine. It wraps
//! the synchronous execution modes with Tokio's async primitives, enabling
//! non-blocking usage from async applications.
//!
//! ## The Blocking-Backend Challenge
//!
//! Sinks are synchronous and often `!Sync` (a relational driver's connection
//! usually cannot be shared across threads). Our solution is the dedicated
//! worker thread with async channels:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Tokio Runtime                            │
//! │                                                             │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │              Async Tasks (clients)                  │   │
//! │  │  task1 ─┐                              ┌─ task4     │   │
//! │  │  task2 ─┼─ tokio::sync::mpsc ─────────┼─ task5     │   │
//! │  │  task3 ─┘    (async send)             └─ task6     │   │
//! │  └─────────────────────┬───────────────────────────────┘   │
//! │                        │                                    │
//! └────────────────────────┼────────────────────────────────────┘
//!                          │
//!                          ▼
//!              ┌───────────────────────┐
//!              │  Dedicated OS Thread  │  ← std::thread::spawn
//!              │                       │
//!              │  ┌─────────────────┐  │
//!              │  │  SinkFactory    │  │  ← owned by the thread;
//!              │  │  + run loops    │  │    sinks acquired per run
//!              │  └─────────────────┘  │
//!              └───────────────────────┘
//! ```
//!
//! Each request carries a `oneshot` response channel; the engine thread
//! executes runs one at a time, in arrival order. The parallel mode fans out
//! from within the engine thread using its own scoped workers.
//!
//! ## Cancellation
//!
//! The engine owns one [`CancellationToken`] covering its lifetime, exposed
//! via [`Engine::cancellation_token`]. Cancelling it makes every in-flight
//! and subsequent run return a partial result; it does not tear the engine
//! down; use [`Engine::shutdown`] for that.

use std::thread;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adaptive::{AdaptiveConfig, AdaptiveRunner};
use crate::chunk::ChunkRunner;
use crate::error::{Error, Result};
use crate::parallel::{ParallelConfig, ParallelCoordinator};
use crate::resilient::ResilientProcessor;
use crate::sink::SinkFactory;
use crate::types::{DetailedRunResult, Operation, RunResult, SizeMetric};

// =============================================================================
// Configuration
// =============================================================================

/// Size of the request channel between handles and the engine thread.
const REQUEST_CHANNEL_SIZE: usize = 64;

// =============================================================================
// Request Types
// =============================================================================

/// A request sent to the engine thread.
enum EngineRequest<R> {
    RunChunked {
        records: Vec<R>,
        op: Operation,
        chunk_size: usize,
        response: oneshot::Sender<Result<RunResult>>,
    },
    RunAdaptive {
        records: Vec<R>,
        op: Operation,
        config: AdaptiveConfig,
        response: oneshot::Sender<Result<RunResult>>,
    },
    RunParallel {
        records: Vec<R>,
        op: Operation,
        config: ParallelConfig,
        response: oneshot::Sender<Result<RunResult>>,
    },
    RunResilient {
        records: Vec<R>,
        op: Operation,
        response: oneshot::Sender<Result<DetailedRunResult<R>>>,
    },
    /// Metric history of the most recent adaptive run.
    AdaptiveMetrics {
        response: oneshot::Sender<Vec<SizeMetric>>,
    },
    Shutdown,
}

// =============================================================================
// Engine Handle
// =============================================================================

/// Async handle to a batch-execution engine running on a dedicated thread.
///
/// `Engine` is cheap to clone; all clones talk to the same engine thread and
/// share its cancellation token. Dropping every clone shuts the engine down.
pub struct Engine<R> {
    tx: mpsc::Sender<EngineRequest<R>>,
    cancel: CancellationToken,
}

impl<R> Clone for Engine<R> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<R: Send + 'static> Engine<R> {
    /// Runs the fixed-size chunk loop over `records`.
    pub async fn run_chunked(
        &self,
        records: Vec<R>,
        op: Operation,
        chunk_size: usize,
    ) -> Result<RunResult> {
        let (response, rx) = oneshot::channel();
        self.send(EngineRequest::RunChunked {
            records,
            op,
            chunk_size,
            response,
        })
        .await?;
        rx.await.map_err(|_| Error::EngineClosed)?
    }

    /// Runs with adaptive chunk sizing.
    pub async fn run_adaptive(
        &self,
        records: Vec<R>,
        op: Operation,
        config: AdaptiveConfig,
    ) -> Result<RunResult> {
        let (response, rx) = oneshot::channel();
        self.send(EngineRequest::RunAdaptive {
            records,
            op,
            config,
            response,
        })
        .await?;
        rx.await.map_err(|_| Error::EngineClosed)?
    }

    /// Runs across parallel workers, one sink per slice.
    pub async fn run_parallel(
        &self,
        records: Vec<R>,
        op: Operation,
        config: ParallelConfig,
    ) -> Result<RunResult> {
        let (response, rx) = oneshot::channel();
        self.send(EngineRequest::RunParallel {
            records,
            op,
            config,
            response,
        })
        .await?;
        rx.await.map_err(|_| Error::EngineClosed)?
    }

    /// Runs in resilient mode, one commit boundary per record.
    pub async fn run_resilient(
        &self,
        records: Vec<R>,
        op: Operation,
    ) -> Result<DetailedRunResult<R>> {
        let (response, rx) = oneshot::channel();
        self.send(EngineRequest::RunResilient {
            records,
            op,
            response,
        })
        .await?;
        rx.await.map_err(|_| Error::EngineClosed)?
    }

    /// Returns the size metrics recorded by the most recent adaptive run.
    ///
    /// Empty if no adaptive run has completed yet.
    pub async fn adaptive_metrics(&self) -> Result<Vec<SizeMetric>> {
        let (response, rx) = oneshot::channel();
        self.send(EngineRequest::AdaptiveMetrics { response }).await?;
        rx.await.map_err(|_| Error::EngineClosed)
    }

    /// The engine's cancellation token.
    ///
    /// Cancelling it turns in-flight and subsequent runs into partial
    /// results; the engine itself keeps serving requests.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Asks the engine thread to exit after the current request.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(EngineRequest::Shutdown).await;
    }

    async fn send(&self, request: EngineRequest<R>) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| Error::EngineClosed)
    }
}

// =============================================================================
// Engine Loop
// =============================================================================

/// Serves requests until shutdown or until every handle is dropped.
///
/// Sinks are acquired from the factory per run, so each run gets a fresh
/// exclusive session; an acquisition failure fails that run only.
async fn run_engine<F, R>(
    factory: F,
    mut rx: mpsc::Receiver<EngineRequest<R>>,
    cancel: CancellationToken,
) where
    F: SinkFactory<R>,
    R: Send + Sync + Clone + 'static,
{
    let mut last_adaptive_metrics: Vec<SizeMetric> = Vec::new();

    while let Some(request) = rx.recv().await {
        match request {
            EngineRequest::RunChunked {
                records,
                op,
                chunk_size,
                response,
            } => {
                let result = factory.acquire().and_then(|sink| {
                    ChunkRunner::new(sink)
                        .with_cancellation(cancel.clone())
                        .run(&records, op, chunk_size)
                });
                let _ = response.send(result);
            }
            EngineRequest::RunAdaptive {
                records,
                op,
                config,
                response,
            } => {
                let result = factory.acquire().and_then(|sink| {
                    let mut runner = AdaptiveRunner::new(sink, config)
                        .with_cancellation(cancel.clone());
                    let result = runner.run(&records, op);
                    last_adaptive_metrics = runner.metrics().to_vec();
                    result
                });
                let _ = response.send(result);
            }
            EngineRequest::RunParallel {
                records,
                op,
                config,
                response,
            } => {
                let coordinator = ParallelCoordinator::new(&factory, config)
                    .with_cancellation(cancel.clone());
                let _ = response.send(coordinator.run(&records, op));
            }
            EngineRequest::RunResilient {
                records,
                op,
                response,
            } => {
                let result = factory.acquire().and_then(|sink| {
                    ResilientProcessor::new(sink)
                        .with_cancellation(cancel.clone())
                        .run(&records, op)
                });
                let _ = response.send(result);
            }
            EngineRequest::AdaptiveMetrics { response } => {
                let _ = response.send(last_adaptive_metrics.clone());
            }
            EngineRequest::Shutdown => {
                debug!("engine shutdown requested");
                break;
            }
        }
    }
}

// =============================================================================
// Spawning
// =============================================================================

/// Spawns the engine on a dedicated thread, returning an async handle.
///
/// The thread owns the factory and runs a current-thread Tokio runtime to
/// await requests; all backend work happens off the caller's runtime.
pub fn spawn_engine<F, R>(factory: F) -> Result<Engine<R>>
where
    F: SinkFactory<R> + 'static,
    R: Send + Sync + Clone + 'static,
{
    let (tx, rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);
    let cancel = CancellationToken::new();
    let engine_cancel = cancel.clone();

    thread::Builder::new()
        .name("bulkline-engine".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(err) => {
                    warn!(%err, "failed to build engine runtime");
                    return;
                }
            };

            rt.block_on(run_engine(factory, rx, engine_cancel));
        })
        .map_err(|e| Error::EngineThread(e.to_string()))?;

    Ok(Engine { tx, cancel })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::sink::test_util::ScriptedSink;

    /// Factory handing out accept-all sinks with a scripted 5ms per write.
    struct AcceptFactory;

    impl SinkFactory<u32> for AcceptFactory {
        type Sink = ScriptedSink;

        fn acquire(&self) -> Result<ScriptedSink> {
            Ok(ScriptedSink::accept_all(Duration::from_millis(5)))
        }
    }

    /// Factory whose sessions can never be opened.
    struct UnreachableFactory;

    impl SinkFactory<u32> for UnreachableFactory {
        type Sink = ScriptedSink;

        fn acquire(&self) -> Result<ScriptedSink> {
            Err(Error::backend(Some("08001"), "no route to backend"))
        }
    }

    #[tokio::test]
    async fn test_chunked_round_trip() {
        let engine = spawn_engine(AcceptFactory).unwrap();
        let records: Vec<u32> = (0..100).collect();

        let result = engine
            .run_chunked(records, Operation::Insert, 30)
            .await
            .unwrap();

        assert_eq!(result.total_records, 100);
        assert_eq!(result.successful_records, 100);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_adaptive_metrics_reflect_last_run() {
        let engine = spawn_engine(AcceptFactory).unwrap();

        assert!(engine.adaptive_metrics().await.unwrap().is_empty());

        let records: Vec<u32> = (0..250).collect();
        engine
            .run_adaptive(records, Operation::Insert, AdaptiveConfig::default())
            .await
            .unwrap();

        // 100 + 100 + 50 at the default initial size.
        let metrics = engine.adaptive_metrics().await.unwrap();
        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[0].chunk_size, 100);

        let records: Vec<u32> = (0..100).collect();
        engine
            .run_adaptive(records, Operation::Insert, AdaptiveConfig::default())
            .await
            .unwrap();
        assert_eq!(engine.adaptive_metrics().await.unwrap().len(), 1);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_parallel_round_trip() {
        let engine = spawn_engine(AcceptFactory).unwrap();
        let records: Vec<u32> = (0..1000).collect();

        let result = engine
            .run_parallel(
                records,
                Operation::Upsert,
                ParallelConfig {
                    parallelism: 4,
                    chunk_size: 50,
                },
            )
            .await
            .unwrap();

        assert_eq!(result.total_records, 1000);
        assert_eq!(result.successful_records, 1000);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_resilient_round_trip() {
        let engine = spawn_engine(AcceptFactory).unwrap();
        let records: Vec<u32> = (0..50).collect();

        let result = engine
            .run_resilient(records, Operation::Insert)
            .await
            .unwrap();

        assert_eq!(result.summary.successful_records, 50);
        assert!(result.failures.is_empty());
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_acquisition_failure_surfaces() {
        let engine = spawn_engine(UnreachableFactory).unwrap();
        let records: Vec<u32> = (0..10).collect();

        let err = engine
            .run_chunked(records, Operation::Insert, 5)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Backend { .. }));
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_fail() {
        let engine = spawn_engine(AcceptFactory).unwrap();
        engine.shutdown().await;

        // Give the engine thread a moment to drain and exit.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = engine
            .run_chunked(vec![1, 2, 3], Operation::Insert, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EngineClosed));
    }

    #[tokio::test]
    async fn test_cancellation_token_yields_partial_runs() {
        let engine = spawn_engine(AcceptFactory).unwrap();
        engine.cancellation_token().cancel();

        let records: Vec<u32> = (0..40).collect();
        let result = engine
            .run_chunked(records, Operation::Insert, 10)
            .await
            .unwrap();

        assert_eq!(result.total_records, 40);
        assert_eq!(result.successful_records, 0);
        assert_eq!(result.failed_records, 40);
        engine.shutdown().await;
    }
}
