//! Fixed-rate `move` stream
//!
//! While running, every period the latest control vector is encoded and pushed to
//! the transport. There is no queue: if the stick did not move since the last tick
//! the same vector goes out again.
//!
//! # Lifecycle
//!
//! ```text
//! Stopped ──start()──► Running ──stop().await──► Stopped
//! ```
//!
//! `stop()` cancels the loop and waits for the task to finish, so once it returns no
//! further datagram can leave.

use super::stats::TransmissionStats;
use super::{SchedulerError, SchedulerSettings};
use crate::command::CommandEncoder;
use crate::input::SharedControlVector;
use crate::transport::{Transport, TransportError};
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
enum FlowState {
    Stopped,
    Running {
        cancel: CancellationToken,
        task: JoinHandle<()>,
    },
}

/// Owns the periodic send task
pub struct PeriodicSender<T: Transport> {
    transport: Arc<T>,
    encoder: Arc<CommandEncoder>,
    vector: Arc<SharedControlVector>,
    stats: Arc<TransmissionStats>,
    settings: SchedulerSettings,
    state: FlowState,
}

impl<T: Transport> PeriodicSender<T> {
    pub fn new(
        transport: Arc<T>,
        encoder: Arc<CommandEncoder>,
        vector: Arc<SharedControlVector>,
        stats: Arc<TransmissionStats>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            transport,
            encoder,
            vector,
            stats,
            settings,
            state: FlowState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, FlowState::Running { .. })
    }

    /// Spawns the send loop on the current tokio runtime
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.is_running() {
            warn!("Periodic flow already running");
            return Err(SchedulerError::AlreadyRunning);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SchedulerError::NoRuntime(e.to_string()))?;

        let cancel = CancellationToken::new();
        let task = runtime.spawn(run_periodic_loop(
            self.transport.clone(),
            self.encoder.clone(),
            self.vector.clone(),
            self.stats.clone(),
            self.settings.clone(),
            cancel.clone(),
        ));

        info!(
            "Periodic flow started: every {}ms to {}",
            self.settings.period.as_millis(),
            self.transport.endpoint()
        );
        self.state = FlowState::Running { cancel, task };
        Ok(())
    }

    /// Cancels the send loop and waits for it to exit
    pub async fn stop(&mut self) -> Result<(), SchedulerError> {
        let (cancel, task) = match std::mem::replace(&mut self.state, FlowState::Stopped) {
            FlowState::Running { cancel, task } => (cancel, task),
            FlowState::Stopped => {
                debug!("Periodic flow already stopped");
                return Err(SchedulerError::NotRunning);
            }
        };

        debug!("Sending cancellation to periodic flow");
        cancel.cancel();

        match task.await {
            Ok(()) => {
                info!("Periodic flow stopped");
                Ok(())
            }
            Err(e) => {
                error!("Periodic flow task failed: {}", e);
                Err(SchedulerError::TaskPanicked(e.to_string()))
            }
        }
    }
}

impl<T: Transport> Drop for PeriodicSender<T> {
    fn drop(&mut self) {
        if let FlowState::Running { cancel, .. } = &self.state {
            warn!("Periodic flow dropped while running, cancelling");
            cancel.cancel();
        }
    }
}

async fn run_periodic_loop<T: Transport>(
    transport: Arc<T>,
    encoder: Arc<CommandEncoder>,
    vector: Arc<SharedControlVector>,
    stats: Arc<TransmissionStats>,
    settings: SchedulerSettings,
    cancel: CancellationToken,
) {
    let mut ticker = interval(settings.period);
    // a slow send delays the next tick but never drops one
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    let mut last_stats_time = Local::now();
    let stats_interval = chrono::Duration::seconds(30);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        stats.record_tick();
        let current = vector.snapshot();
        let payload = match encoder.encode_vector(current) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Could not encode control vector {:?}: {}", current, e);
                stats.record_failure();
                continue;
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Cancelled while a periodic send was in flight");
                break;
            }
            result = send_capped(transport.as_ref(), &payload, settings.send_timeout) => {
                match result {
                    Ok(()) => stats.record_periodic_sent(),
                    Err(e) => {
                        warn!("Periodic send failed ({:?}): {}", e.kind(), e);
                        stats.record_failure();
                    }
                }
            }
        }

        let now = Local::now();
        if now - last_stats_time > stats_interval {
            let snapshot = stats.snapshot();
            info!(
                "Transmission stats: {} ticks, {} periodic sent, {} immediate sent, {} failed",
                snapshot.ticks, snapshot.periodic_sent, snapshot.immediate_sent, snapshot.failed
            );
            last_stats_time = now;
        }
    }

    debug!("Periodic loop exited");
}

/// Sends one payload, giving up after `cap`
pub(crate) async fn send_capped<T: Transport>(
    transport: &T,
    payload: &[u8],
    cap: Duration,
) -> Result<(), TransportError> {
    match timeout(cap, transport.send(payload)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::SendFailed {
            endpoint: transport.endpoint().to_string(),
            reason: format!("send did not complete within {}ms", cap.as_millis()),
        }),
    }
}
