//! The running Tidemark node: wires the orchestrator to its event loop.

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::events::StageCommand;
use crate::metrics::NodeMetrics;
use crate::orchestrator::{DispatchOutcome, Gateways, Orchestrator};
use crate::shutdown::ShutdownController;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Timeout for waiting on the handler task during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A running Tidemark orchestrator node.
///
/// External actors submit commands through [`submit`](Self::submit) (or a
/// sender from [`command_sender`](Self::command_sender)); stage handlers
/// emit next-stage events onto the same channel, consumed by one dedicated
/// handler task.
pub struct TidemarkNode {
    pub config: NodeConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub metrics: Arc<NodeMetrics>,
    pub shutdown: Arc<ShutdownController>,
    events_tx: mpsc::Sender<StageCommand>,
    events_rx: Option<mpsc::Receiver<StageCommand>>,
    task: Option<JoinHandle<()>>,
}

impl TidemarkNode {
    /// Create a node with the given collaborators. Call
    /// [`start`](Self::start) to recover persisted state and begin
    /// consuming events.
    pub fn new(config: NodeConfig, gateways: Gateways) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity);
        let metrics = Arc::new(NodeMetrics::new());
        let orchestrator = Arc::new(Orchestrator::new(
            config.scoring.clone(),
            config.orchestrator.clone(),
            config.submission_history_limit,
            gateways,
            Arc::clone(&metrics),
            events_tx.clone(),
        ));

        Self {
            config,
            orchestrator,
            metrics,
            shutdown: Arc::new(ShutdownController::new()),
            events_tx,
            events_rx: Some(events_rx),
            task: None,
        }
    }

    /// Recover persisted workflows and spawn the event-handler task.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        self.orchestrator.recover().await?;

        let mut events_rx = self
            .events_rx
            .take()
            .ok_or_else(|| NodeError::Config("node already started".to_string()))?;
        let orchestrator = Arc::clone(&self.orchestrator);
        let mut shutdown_rx = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                let command = tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::info!("event handler task shutting down");
                        break;
                    }
                    command = events_rx.recv() => match command {
                        Some(command) => command,
                        None => {
                            tracing::info!("event channel closed, handler task exiting");
                            break;
                        }
                    },
                };

                let project = command.project_id().clone();
                let name = command.name();
                if let Err(err) = orchestrator.dispatch(command).await {
                    tracing::warn!(
                        project = %project,
                        command = name,
                        error = %err,
                        "internally emitted event failed"
                    );
                }
            }
        });
        self.task = Some(handle);
        tracing::info!("tidemark node started");
        Ok(())
    }

    /// Submit a command and wait for its outcome.
    pub async fn submit(&self, command: StageCommand) -> Result<DispatchOutcome, NodeError> {
        self.orchestrator.dispatch(command).await
    }

    /// A sender external transports can push commands through.
    pub fn command_sender(&self) -> mpsc::Sender<StageCommand> {
        self.events_tx.clone()
    }

    /// Stop the handler task, waiting up to the shutdown timeout.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        self.shutdown.shutdown();
        if let Some(handle) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
                tracing::warn!("handler task did not stop within the shutdown timeout");
            }
        }
        tracing::info!("tidemark node stopped");
        Ok(())
    }
}
