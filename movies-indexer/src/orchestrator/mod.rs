//! Orchestrator module for the movies indexer.
//!
//! Runs sync passes on a fixed interval. Each pass walks the states
//! `Idle -> Extracting -> Transforming -> Loading -> Checkpointing -> Idle`,
//! or drops to `Failed` (and back to `Idle`) when a stage errors.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use movies_indexer_repository::CheckpointStore;
use movies_indexer_shared::Watermark;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, instrument, warn};

use crate::errors::SyncError;
use crate::extractor::ChangeExtractor;
use crate::loader::IndexLoader;
use crate::transformer::RecordTransformer;

/// Default pause between two passes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Pause between the end of one pass and the start of the next.
    pub interval: Duration,
    /// Stop on Ctrl-C / SIGTERM in addition to the shutdown handle.
    pub handle_signals: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL,
            handle_signals: true,
        }
    }
}

/// Stage a pass is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Extracting,
    Transforming,
    Loading,
    Checkpointing,
    Failed,
}

impl fmt::Display for PassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::Transforming => "transforming",
            Self::Loading => "loading",
            Self::Checkpointing => "checkpointing",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a successful pass did.
#[derive(Debug, Clone, PartialEq)]
pub struct PassOutcome {
    /// Rows read from the source.
    pub extracted: usize,
    /// Rows dropped by validation.
    pub rejected: usize,
    /// Documents written to the search indices.
    pub indexed: usize,
    /// Watermark in effect after the pass.
    pub watermark: Option<Watermark>,
}

/// Totals since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub passes: u64,
    pub failed_passes: u64,
    pub documents_indexed: u64,
    pub rows_rejected: u64,
}

#[derive(Debug, Default)]
struct Counters {
    passes: AtomicU64,
    failed_passes: AtomicU64,
    documents_indexed: AtomicU64,
    rows_rejected: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> SyncStats {
        SyncStats {
            passes: self.passes.load(Ordering::Relaxed),
            failed_passes: self.failed_passes.load(Ordering::Relaxed),
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            rows_rejected: self.rows_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Requests a graceful stop of a running orchestrator.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    shutdown_tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    /// Ask the orchestrator to stop after the pass in progress, if any.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Orchestrator that coordinates the sync stages.
///
/// The orchestrator:
/// - Loads the watermark and runs one pass at a time
/// - Persists the new watermark only after a fully successful load
/// - Sleeps between passes and handles shutdown signals
/// - Tracks progress counters
pub struct Orchestrator {
    extractor: ChangeExtractor,
    transformer: RecordTransformer,
    loader: IndexLoader,
    checkpoint: Arc<dyn CheckpointStore>,
    config: OrchestratorConfig,
    state: PassState,
    shutdown_tx: broadcast::Sender<()>,
    // Subscribed at construction so a shutdown requested before `run` is not lost.
    shutdown_rx: broadcast::Receiver<()>,
    counters: Arc<Counters>,
}

impl Orchestrator {
    /// Create a new orchestrator with the given components.
    pub fn new(
        extractor: ChangeExtractor,
        transformer: RecordTransformer,
        loader: IndexLoader,
        checkpoint: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self::with_config(
            extractor,
            transformer,
            loader,
            checkpoint,
            OrchestratorConfig::default(),
        )
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        extractor: ChangeExtractor,
        transformer: RecordTransformer,
        loader: IndexLoader,
        checkpoint: Arc<dyn CheckpointStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            extractor,
            transformer,
            loader,
            checkpoint,
            config,
            state: PassState::Idle,
            shutdown_tx,
            shutdown_rx,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Current pass state.
    pub fn state(&self) -> PassState {
        self.state
    }

    /// Progress counters since startup.
    pub fn stats(&self) -> SyncStats {
        self.counters.snapshot()
    }

    /// The loader, for reading documents back from the index.
    pub fn loader(&self) -> &IndexLoader {
        &self.loader
    }

    /// A handle that can stop [`run`](Self::run) from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    fn enter(&mut self, state: PassState) {
        debug!(from = %self.state, to = %state, "Pass state transition");
        self.state = state;
    }

    fn shutdown_requested(&mut self) -> bool {
        match self.shutdown_rx.try_recv() {
            Ok(()) => true,
            Err(broadcast::error::TryRecvError::Empty) => false,
            Err(_) => true,
        }
    }

    /// Run passes until shutdown.
    ///
    /// Failed passes are logged and retried after the interval; they never
    /// end the loop. A pass in progress is always finished before stopping.
    #[instrument(skip(self))]
    pub async fn run(&mut self) -> Result<(), SyncError> {
        let watermark = self.checkpoint.load().await;
        info!(
            watermark = ?watermark.map(|w| w.to_string()),
            interval_secs = self.config.interval.as_secs_f64(),
            "Starting movies indexer orchestrator"
        );

        // Installed before the first pass so a signal during it is handled too.
        let signals = self
            .config
            .handle_signals
            .then(|| forward_shutdown(termination_signal(), self.shutdown_tx.clone()));

        loop {
            if self.shutdown_requested() {
                info!("Shutdown requested");
                break;
            }

            // Errors are logged inside and counted; the loop carries on.
            let _ = self.run_pass().await;

            let stats = self.stats();
            info!(
                passes = stats.passes,
                failed_passes = stats.failed_passes,
                documents_indexed = stats.documents_indexed,
                rows_rejected = stats.rows_rejected,
                "Sync progress"
            );

            tokio::select! {
                _ = sleep(self.config.interval) => {}
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        if let Some(signals) = signals {
            signals.abort();
        }

        let stats = self.stats();
        info!(
            passes = stats.passes,
            failed_passes = stats.failed_passes,
            documents_indexed = stats.documents_indexed,
            "Orchestrator shutdown complete"
        );
        Ok(())
    }

    /// Run a single pass.
    ///
    /// On error the state machine goes through `Failed` back to `Idle` and the
    /// stored watermark is left as it was.
    #[instrument(skip(self))]
    pub async fn run_pass(&mut self) -> Result<PassOutcome, SyncError> {
        self.counters.passes.fetch_add(1, Ordering::Relaxed);

        match self.execute_pass().await {
            Ok(outcome) => {
                self.enter(PassState::Idle);
                Ok(outcome)
            }
            Err(e) => {
                let failed_in = self.state;
                self.enter(PassState::Failed);
                self.counters.failed_passes.fetch_add(1, Ordering::Relaxed);
                error!(stage = %failed_in, error = %e, "Sync pass failed, keeping watermark");
                self.enter(PassState::Idle);
                Err(e)
            }
        }
    }

    async fn execute_pass(&mut self) -> Result<PassOutcome, SyncError> {
        // Local fallback, taken before reading, for sources that do not report their clock.
        let started = Watermark::now();
        let previous = self.checkpoint.load().await;

        self.enter(PassState::Extracting);
        let changes = self.extractor.fetch(previous).await?;
        let extracted = changes.len();
        let observed = match changes.observed_at {
            Some(observed) => observed,
            None => {
                debug!("Source did not report its clock, using local pass start");
                started
            }
        };

        if changes.is_empty() {
            debug!("No changes since last watermark");
            return Ok(PassOutcome {
                extracted: 0,
                rejected: 0,
                indexed: 0,
                watermark: previous,
            });
        }

        self.enter(PassState::Transforming);
        let transformed = self.transformer.transform_counted(changes);
        self.counters
            .rows_rejected
            .fetch_add(transformed.rejected as u64, Ordering::Relaxed);
        if transformed.rejected > 0 {
            warn!(rejected = transformed.rejected, "Some rows were skipped");
        }

        self.enter(PassState::Loading);
        let report = self.loader.load(&transformed.batch).await?;
        self.counters
            .documents_indexed
            .fetch_add(report.total() as u64, Ordering::Relaxed);

        self.enter(PassState::Checkpointing);
        let watermark = match previous {
            Some(previous) => previous.advance_to(observed),
            None => observed,
        };
        self.checkpoint.save(watermark).await?;

        info!(
            extracted = extracted,
            rejected = transformed.rejected,
            indexed = report.total(),
            watermark = %watermark,
            "Sync pass complete"
        );

        Ok(PassOutcome {
            extracted,
            rejected: transformed.rejected,
            indexed: report.total(),
            watermark: Some(watermark),
        })
    }
}

/// Broadcast a shutdown request once `signal` resolves.
fn forward_shutdown<F>(signal: F, shutdown_tx: broadcast::Sender<()>) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        signal.await;
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    })
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
