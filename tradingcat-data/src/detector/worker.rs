//! Runs a [`Detector`] on a dedicated tokio task.
//!
//! Every call into the [`Detector`] is serialised through one command queue, so ingestion
//! and session control never race. Detections are delivered on a bounded channel.

use super::{Detection, Detector, SessionId};
use crate::{error::DataError, exchange::StockExchangeId, filter::UserConfig, kline::KLine};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

/// Detector worker configuration
#[derive(Debug, Clone)]
pub struct DetectorWorkerConfig {
    /// Maximum channel buffer size for detections
    pub channel_buffer_size: usize,
}

impl Default for DetectorWorkerConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
        }
    }
}

impl DetectorWorkerConfig {
    /// Set channel buffer size
    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size.max(1);
        self
    }
}

/// Commands processed in order by the worker.
#[derive(Debug, Clone)]
pub enum DetectorCommand {
    AddKLines {
        stock_exchange_id: StockExchangeId,
        klines: Vec<KLine>,
    },
    UserOnline {
        session_id: SessionId,
        config: UserConfig,
    },
    UserOffline {
        session_id: SessionId,
    },
}

/// Cloneable handle used to feed a running [`DetectorWorker`].
///
/// The worker stops once every handle has been dropped.
#[derive(Debug, Clone)]
pub struct DetectorHandle {
    command_tx: mpsc::UnboundedSender<DetectorCommand>,
}

impl DetectorHandle {
    pub fn add_klines(
        &self,
        stock_exchange_id: StockExchangeId,
        klines: Vec<KLine>,
    ) -> Result<(), DataError> {
        self.send(DetectorCommand::AddKLines {
            stock_exchange_id,
            klines,
        })
    }

    pub fn user_online(&self, session_id: SessionId, config: UserConfig) -> Result<(), DataError> {
        self.send(DetectorCommand::UserOnline { session_id, config })
    }

    pub fn user_offline(&self, session_id: SessionId) -> Result<(), DataError> {
        self.send(DetectorCommand::UserOffline { session_id })
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    fn send(&self, command: DetectorCommand) -> Result<(), DataError> {
        self.command_tx
            .send(command)
            .map_err(|_| DataError::WorkerTerminated)
    }
}

/// Owns a [`Detector`] until [`DetectorWorker::start`] moves it onto a tokio task.
#[derive(Debug)]
pub struct DetectorWorker {
    detector: Detector,
    config: DetectorWorkerConfig,
}

impl DetectorWorker {
    /// Create a new worker with default configuration
    pub fn new(detector: Detector) -> Self {
        Self {
            detector,
            config: DetectorWorkerConfig::default(),
        }
    }

    /// Use a custom configuration
    pub fn with_config(mut self, config: DetectorWorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Spawn the worker task.
    ///
    /// Returns a handle to send commands, a receiver for detections and the task's
    /// [`JoinHandle`], which resolves once every handle is dropped or the detection receiver
    /// goes away.
    pub fn start(self) -> (DetectorHandle, mpsc::Receiver<Detection>, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (detection_tx, detection_rx) = mpsc::channel(self.config.channel_buffer_size);

        let task = tokio::spawn(run_detector_loop(self.detector, command_rx, detection_tx));

        (DetectorHandle { command_tx }, detection_rx, task)
    }
}

async fn run_detector_loop(
    mut detector: Detector,
    mut command_rx: mpsc::UnboundedReceiver<DetectorCommand>,
    detection_tx: mpsc::Sender<Detection>,
) {
    info!("Starting Detector worker");

    while let Some(command) = command_rx.recv().await {
        match command {
            DetectorCommand::AddKLines {
                stock_exchange_id,
                klines,
            } => {
                for detection in detector.add_klines(&stock_exchange_id, &klines) {
                    if detection_tx.send(detection).await.is_err() {
                        warn!("Detection receiver dropped, stopping Detector worker");
                        return;
                    }
                }
            }
            DetectorCommand::UserOnline { session_id, config } => {
                detector.user_online(session_id, config);
            }
            DetectorCommand::UserOffline { session_id } => {
                detector.user_offline(session_id);
            }
        }
    }

    debug!(sessions = detector.sessions(), "all DetectorHandles dropped");
    info!("Detector worker stopped");
}
