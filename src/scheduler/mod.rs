//! Transmission scheduler
//!
//! Drives the two independent traffic flows towards the drone:
//!
//! 1. [`immediate`] - one datagram per button press, sent from a background task
//! 2. [`periodic`] - the latest control vector as `move`, every `period`
//!
//! # Architecture
//!
//! ```text
//!  press(action) ──► CommandEncoder ──► TaskTracker task ──┐
//!                                                          ├──► Transport ──► drone
//!  SharedControlVector ──► tick (100ms) ──► CommandEncoder ┘
//! ```
//!
//! Both flows share one transport and one encoder. Neither ever blocks the calling
//! (UI) thread on network I/O, and no ordering is promised between their datagrams.
//! Transport failures are logged and counted in [`TransmissionStats`]; the next tick
//! or press is the retry.

pub mod immediate;
pub mod periodic;
pub mod stats;

pub use immediate::ActionDispatcher;
pub use periodic::PeriodicSender;
pub use stats::{StatsSnapshot, TransmissionStats};

use crate::command::{Action, Command, CommandEncoder, CommandError};
use crate::input::{ControlVector, SharedControlVector};
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Timing for both flows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Interval between two periodic `move` datagrams
    pub period: Duration,
    /// Longest any single send may block before it is reported as failed
    pub send_timeout: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(100),
            send_timeout: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Periodic flow is already running")]
    AlreadyRunning,

    #[error("Periodic flow is not running")]
    NotRunning,

    #[error("Scheduler has been shut down")]
    ShutDown,

    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    #[error("Send task failed: {0}")]
    TaskPanicked(String),

    #[error("Encoding error: {0}")]
    Encode(#[from] CommandError),
}

/// Owns both flows for one endpoint
pub struct TransmissionScheduler<T: Transport> {
    vector: Arc<SharedControlVector>,
    stats: Arc<TransmissionStats>,
    periodic: PeriodicSender<T>,
    immediate: ActionDispatcher<T>,
    shut_down: bool,
}

impl<T: Transport> TransmissionScheduler<T> {
    /// Builds a scheduler on the current tokio runtime
    pub fn new(
        transport: Arc<T>,
        encoder: Arc<CommandEncoder>,
        settings: SchedulerSettings,
    ) -> Result<Self, SchedulerError> {
        Self::with_vector(
            transport,
            encoder,
            Arc::new(SharedControlVector::default()),
            settings,
        )
    }

    /// Builds a scheduler that reads an existing shared control vector
    pub fn with_vector(
        transport: Arc<T>,
        encoder: Arc<CommandEncoder>,
        vector: Arc<SharedControlVector>,
        settings: SchedulerSettings,
    ) -> Result<Self, SchedulerError> {
        info!(
            "Creating transmission scheduler for {} with settings: {:?}",
            transport.endpoint(),
            settings
        );
        let stats = Arc::new(TransmissionStats::default());
        let immediate = ActionDispatcher::new(
            transport.clone(),
            encoder.clone(),
            stats.clone(),
            settings.send_timeout,
        )?;
        let periodic = PeriodicSender::new(
            transport,
            encoder,
            vector.clone(),
            stats.clone(),
            settings,
        );

        Ok(Self {
            vector,
            stats,
            periodic,
            immediate,
            shut_down: false,
        })
    }

    /// Seeds the control vector and starts the periodic flow
    pub fn start(&mut self, initial: ControlVector) -> Result<(), SchedulerError> {
        if self.shut_down {
            warn!("Refusing to start periodic flow, scheduler is shut down");
            return Err(SchedulerError::ShutDown);
        }
        if self.periodic.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        debug!("Seeding control vector with {:?}", initial);
        self.vector.store(initial);
        self.periodic.start()
    }

    /// Stops the periodic flow; no `move` goes out after this returns
    pub async fn stop(&mut self) -> Result<(), SchedulerError> {
        self.periodic.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.periodic.is_running()
    }

    /// Sends the command for a button press without waiting for the network
    pub fn press(&self, action: Action) -> Result<Command, SchedulerError> {
        self.immediate.dispatch(action)
    }

    /// Waits for outstanding one-shot sends
    pub async fn flush(&self) {
        self.immediate.flush().await;
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stops both flows; afterwards nothing is sent and presses and restarts are rejected
    pub async fn shutdown(&mut self) {
        self.shut_down = true;
        if self.periodic.is_running() {
            if let Err(e) = self.periodic.stop().await {
                error!("Periodic flow did not stop cleanly: {}", e);
            }
        }
        self.immediate.shutdown().await;
        let stats = self.stats.snapshot();
        info!(
            "Transmission scheduler shut down: {} sent, {} failed",
            stats.total_sent(),
            stats.failed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::RecordingTransport;
    use tokio::time::sleep;

    fn scheduler(transport: Arc<RecordingTransport>) -> TransmissionScheduler<RecordingTransport> {
        TransmissionScheduler::new(
            transport,
            Arc::new(CommandEncoder::default()),
            SchedulerSettings::default(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn button_press_is_independent_of_periodic_flow() {
        let transport = Arc::new(RecordingTransport::new());
        let scheduler = scheduler(transport.clone());

        scheduler.press(Action::Up).unwrap();
        scheduler.flush().await;
        sleep(Duration::from_millis(500)).await;

        assert_eq!(transport.commands(), vec![Command::Up]);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_press_then_stream() {
        let transport = Arc::new(RecordingTransport::new());
        let mut scheduler = scheduler(transport.clone());

        scheduler.press(Action::Up).unwrap();
        scheduler.flush().await;
        assert_eq!(transport.commands(), vec![Command::Up]);

        scheduler.start(ControlVector::new(0.5, -0.3)).unwrap();
        sleep(Duration::from_millis(350)).await;
        scheduler.stop().await.unwrap();

        let moves: Vec<_> = transport
            .commands()
            .into_iter()
            .filter(|c| matches!(c, Command::Move { .. }))
            .collect();
        assert!((3..=4).contains(&moves.len()), "got {} moves", moves.len());
        for command in moves {
            if let Command::Move {
                forward_back,
                left_right,
            } = command
            {
                assert!((forward_back - 0.05).abs() < 1e-6);
                assert!((left_right + 0.03).abs() < 1e-6);
            }
        }

        let stats = scheduler.stats();
        assert_eq!(stats.immediate_sent, 1);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_everything() {
        let transport = Arc::new(RecordingTransport::new());
        let mut scheduler = scheduler(transport.clone());

        scheduler.start(ControlVector::centered()).unwrap();
        sleep(Duration::from_millis(120)).await;
        scheduler.shutdown().await;
        let at_shutdown = transport.count();

        sleep(Duration::from_secs(1)).await;
        assert_eq!(transport.count(), at_shutdown);
        assert!(matches!(
            scheduler.press(Action::Up),
            Err(SchedulerError::ShutDown)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_shutdown_is_rejected() {
        let transport = Arc::new(RecordingTransport::new());
        let mut scheduler = scheduler(transport.clone());

        scheduler.shutdown().await;
        assert!(matches!(
            scheduler.start(ControlVector::new(0.5, 0.5)),
            Err(SchedulerError::ShutDown)
        ));
        assert!(!scheduler.is_running());

        sleep(Duration::from_millis(500)).await;
        assert_eq!(transport.count(), 0);
    }

    #[test]
    fn construction_needs_a_runtime() {
        let result = TransmissionScheduler::new(
            Arc::new(RecordingTransport::new()),
            Arc::new(CommandEncoder::default()),
            SchedulerSettings::default(),
        );
        assert!(matches!(result, Err(SchedulerError::NoRuntime(_))));
    }
}
