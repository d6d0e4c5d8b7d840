//! One-shot sends for button presses
//!
//! Each press is encoded on the caller's thread (so the power toggle happens in press
//! order) and the datagram is pushed from a tracked background task. The caller never
//! waits on the network.

use super::periodic::send_capped;
use super::stats::TransmissionStats;
use super::SchedulerError;
use crate::command::{Action, Command, CommandEncoder};
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

pub struct ActionDispatcher<T: Transport> {
    transport: Arc<T>,
    encoder: Arc<CommandEncoder>,
    stats: Arc<TransmissionStats>,
    send_timeout: Duration,
    runtime: Handle,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl<T: Transport> ActionDispatcher<T> {
    /// Creates a dispatcher bound to the current tokio runtime
    pub fn new(
        transport: Arc<T>,
        encoder: Arc<CommandEncoder>,
        stats: Arc<TransmissionStats>,
        send_timeout: Duration,
    ) -> Result<Self, SchedulerError> {
        let runtime =
            Handle::try_current().map_err(|e| SchedulerError::NoRuntime(e.to_string()))?;
        Ok(Self {
            transport,
            encoder,
            stats,
            send_timeout,
            runtime,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Encodes the action and sends it in the background
    ///
    /// Returns the command that was chosen, which for `Power` reflects the new power
    /// state.
    pub fn dispatch(&self, action: Action) -> Result<Command, SchedulerError> {
        if self.cancel.is_cancelled() {
            warn!("Dropping {} press, dispatcher is shut down", action);
            return Err(SchedulerError::ShutDown);
        }
        let command = self.encoder.command_for_action(action);
        self.dispatch_command(command)?;
        Ok(command)
    }

    fn dispatch_command(&self, command: Command) -> Result<(), SchedulerError> {
        if self.cancel.is_cancelled() {
            warn!("Dropping {}, dispatcher is shut down", command);
            return Err(SchedulerError::ShutDown);
        }

        let payload = self.encoder.encode(&command)?;
        let transport = self.transport.clone();
        let stats = self.stats.clone();
        let cancel = self.cancel.clone();
        let cap = self.send_timeout;

        debug!("Dispatching {}", command);
        self.tracker.spawn_on(
            async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("One-shot {} cancelled before it went out", command);
                    }
                    result = send_capped(transport.as_ref(), &payload, cap) => {
                        match result {
                            Ok(()) => {
                                debug!("One-shot {} sent", command);
                                stats.record_immediate_sent();
                            }
                            Err(e) => {
                                warn!("One-shot {} failed ({:?}): {}", command, e.kind(), e);
                                stats.record_failure();
                            }
                        }
                    }
                }
            },
            &self.runtime,
        );
        Ok(())
    }

    /// Number of one-shot sends still in flight
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until all one-shot sends dispatched so far have finished
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Cancels outstanding sends and refuses new ones
    pub async fn shutdown(&self) {
        info!("Shutting down action dispatcher ({} in flight)", self.tracker.len());
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
