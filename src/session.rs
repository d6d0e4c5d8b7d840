//! Operator session with statum state machine
//!
//! Ties the input samplers, the command encoder and the transmission scheduler to
//! the lifetime of the operator surface. The periodic `move` stream only exists while
//! the session is attached.
//!
//! # State Machine
//!
//! ```text
//! Detached ──attach()──► Attached ──detach().await──► Detached
//! ```
//!
//! Power state is owned by the session and survives detach/attach cycles; only a
//! fresh session starts with the motors off.

use crate::command::{Action, ActionObserver, Command, CommandEncoder, PowerState};
use crate::input::{
    AxisWriter, ControlVector, InputSampler, JoystickGeometry, JoystickRole, PointerEvent,
    SharedControlVector,
};
use crate::scheduler::{SchedulerError, SchedulerSettings, StatsSnapshot, TransmissionScheduler};
use crate::transport::{Endpoint, UdpTransport};
use chrono::{DateTime, Local};
use statum::{machine, state};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Transient message for the operator
///
/// Confirms that a command was handed to the transport, not that it arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub issued_at: DateTime<Local>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Emergency,
    Power { on: bool },
}

impl Notice {
    fn new(kind: NoticeKind) -> Self {
        let message = match kind {
            NoticeKind::Emergency => "Emergency Stop activated!".to_string(),
            NoticeKind::Power { on: true } => "Motors started".to_string(),
            NoticeKind::Power { on: false } => "Motors stopped".to_string(),
        };
        Self {
            kind,
            message,
            issued_at: Local::now(),
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Detached, // No traffic, sticks centred
    Attached, // Periodic flow running, presses accepted
}

#[machine]
pub struct ControlSession<S: SessionState> {
    transport: Arc<UdpTransport>,
    settings: SchedulerSettings,
    encoder: Arc<CommandEncoder>,
    vector: Arc<SharedControlVector>,
    vertical: InputSampler,
    horizontal: InputSampler,
    scheduler: Option<TransmissionScheduler<UdpTransport>>,
    notices: Option<mpsc::Sender<Notice>>,
}

impl<S: SessionState> ControlSession<S> {
    pub fn endpoint(&self) -> &Endpoint {
        crate::transport::Transport::endpoint(self.transport.as_ref())
    }

    pub fn power_on(&self) -> bool {
        self.encoder.power().is_on()
    }

    /// Current stick state as the periodic flow would send it (before attenuation)
    pub fn control_vector(&self) -> ControlVector {
        self.vector.snapshot()
    }

    /// Knob position of one stick for drawing
    pub fn hat_position(&self, role: JoystickRole) -> (f32, f32) {
        self.sampler(role).hat_position()
    }

    pub fn is_touching(&self, role: JoystickRole) -> bool {
        self.sampler(role).is_touching()
    }

    pub fn geometry(&self, role: JoystickRole) -> &JoystickGeometry {
        self.sampler(role).geometry()
    }

    fn sampler(&self, role: JoystickRole) -> &InputSampler {
        match role {
            JoystickRole::Vertical => &self.vertical,
            JoystickRole::Horizontal => &self.horizontal,
        }
    }
}

impl<S: SessionState> fmt::Debug for ControlSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlSession")
            .field("endpoint", self.endpoint())
            .field("settings", &self.settings)
            .field("power_on", &self.power_on())
            .field("control_vector", &self.control_vector())
            .field("scheduler_running", &self.scheduler.is_some())
            .finish()
    }
}

impl ControlSession<Detached> {
    /// Creates a detached session for one endpoint
    pub fn create(endpoint: Endpoint, settings: SchedulerSettings, geometry: JoystickGeometry) -> Self {
        info!("Creating control session for {}", endpoint);
        let transport = Arc::new(UdpTransport::with_timeout(endpoint, settings.send_timeout));
        let vector = Arc::new(SharedControlVector::default());
        let vertical = InputSampler::with_observer(
            geometry,
            Box::new(AxisWriter::new(JoystickRole::Vertical, vector.clone())),
        );
        let horizontal = InputSampler::with_observer(
            geometry,
            Box::new(AxisWriter::new(JoystickRole::Horizontal, vector.clone())),
        );

        Self::new(
            transport,
            settings,
            Arc::new(CommandEncoder::new(PowerState::default())),
            vector,
            vertical,
            horizontal,
            None, // scheduler
            None, // notices
        )
    }

    /// Routes operator notices (emergency, power changes) to the UI
    pub fn with_notices(mut self, notices: mpsc::Sender<Notice>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// Starts the transmission core; must be called from within a tokio runtime
    ///
    /// On failure the detached session comes back with the error, power state intact.
    pub fn attach(
        mut self,
        initial: ControlVector,
    ) -> Result<ControlSession<Attached>, (SchedulerError, ControlSession<Detached>)> {
        info!("Attaching control session to {}", self.endpoint());

        let scheduler = TransmissionScheduler::with_vector(
            self.transport.clone(),
            self.encoder.clone(),
            self.vector.clone(),
            self.settings.clone(),
        )
        .and_then(|mut scheduler| scheduler.start(initial).map(|()| scheduler));
        match scheduler {
            Ok(scheduler) => self.scheduler = Some(scheduler),
            Err(e) => {
                error!("Could not attach to {}: {}", self.endpoint(), e);
                self.vector.reset();
                return Err((e, self));
            }
        }

        debug!("Transitioning to Attached state");
        Ok(self.transition())
    }
}

impl ControlSession<Attached> {
    /// Feeds a pointer event from one of the sticks
    pub fn pointer(&mut self, role: JoystickRole, event: PointerEvent) -> (f32, f32) {
        let sampler = match role {
            JoystickRole::Vertical => &mut self.vertical,
            JoystickRole::Horizontal => &mut self.horizontal,
        };
        let output = sampler.handle(event);
        debug!("{} stick -> ({:.3}, {:.3})", role, output.0, output.1);
        output
    }

    /// Overrides both axes directly, bypassing the samplers
    pub fn set_control_vector(&self, vector: ControlVector) {
        self.vector.store(vector);
    }

    /// Sends the command for a button press in the background
    pub fn press(&self, action: Action) -> Result<Command, SchedulerError> {
        let scheduler = self.scheduler.as_ref().ok_or(SchedulerError::NotRunning)?;
        let command = scheduler.press(action)?;

        match command {
            Command::Emergency => self.notify(NoticeKind::Emergency),
            Command::Start => self.notify(NoticeKind::Power { on: true }),
            Command::Stop => self.notify(NoticeKind::Power { on: false }),
            _ => {}
        }
        Ok(command)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.scheduler
            .as_ref()
            .map(|s| s.stats())
            .unwrap_or_default()
    }

    /// Waits until every press dispatched so far has left (or failed)
    pub async fn flush(&self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.flush().await;
        }
    }

    /// Stops all traffic and centres the sticks
    pub async fn detach(mut self) -> ControlSession<Detached> {
        info!("Detaching control session from {}", self.endpoint());

        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.shutdown().await;
        }
        self.vertical.handle(PointerEvent::Up);
        self.horizontal.handle(PointerEvent::Up);
        self.vector.reset();

        debug!("Transitioning to Detached state");
        self.transition()
    }

    fn notify(&self, kind: NoticeKind) {
        let Some(notices) = &self.notices else {
            return;
        };
        let notice = Notice::new(kind);
        info!("Notice: {}", notice.message);
        match notices.try_send(notice) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => warn!("Notice channel full, dropping notice"),
            Err(mpsc::error::TrySendError::Closed(_)) => debug!("Notice channel closed"),
        }
    }
}

impl ActionObserver for ControlSession<Attached> {
    fn on_action(&self, action: Action) {
        if let Err(e) = self.press(action) {
            error!("Could not dispatch {}: {}", action, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::CommandListener;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    async fn listener() -> (CommandListener, Endpoint) {
        let listener = CommandListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, Endpoint::new("127.0.0.1", port))
    }

    fn geometry() -> JoystickGeometry {
        JoystickGeometry::new(100.0, 100.0, 50.0)
    }

    async fn next_non_move(listener: &CommandListener) -> Command {
        loop {
            let (command, _) = timeout(Duration::from_secs(2), listener.recv())
                .await
                .unwrap()
                .unwrap();
            if !matches!(command, Command::Move { .. }) {
                return command;
            }
        }
    }

    #[tokio::test]
    async fn sticks_drive_the_move_stream() {
        let (listener, endpoint) = listener().await;
        let session = ControlSession::create(endpoint, SchedulerSettings::default(), geometry());
        let mut session = session.attach(ControlVector::centered()).unwrap();

        // full forward on the vertical stick, right of centre on the horizontal one
        session.pointer(JoystickRole::Vertical, PointerEvent::Down { x: 100.0, y: 300.0 });
        session.pointer(JoystickRole::Horizontal, PointerEvent::Move { x: 125.0, y: 10.0 });
        let vector = session.control_vector();
        assert!((vector.forward_back - 1.0).abs() < 1e-5);
        assert!(vector.left_right > 0.0);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        let mut seen_forward = false;
        while tokio::time::Instant::now() < deadline && !seen_forward {
            let (command, _) = timeout(Duration::from_secs(1), listener.recv())
                .await
                .unwrap()
                .unwrap();
            if let Command::Move { forward_back, .. } = command {
                seen_forward = (forward_back - 0.1).abs() < 1e-5;
            }
        }
        assert!(seen_forward);

        let session = session.detach().await;
        assert_eq!(session.control_vector(), ControlVector::centered());
        assert_eq!(session.hat_position(JoystickRole::Vertical), (100.0, 100.0));
    }

    #[tokio::test]
    async fn emergency_press_sends_and_notifies() {
        let (listener, endpoint) = listener().await;
        let (tx, mut rx) = mpsc::channel(4);
        let session = ControlSession::create(endpoint, SchedulerSettings::default(), geometry())
            .with_notices(tx)
            .attach(ControlVector::centered())
            .unwrap();

        assert_eq!(session.press(Action::Emergency).unwrap(), Command::Emergency);
        assert_eq!(next_non_move(&listener).await, Command::Emergency);

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.kind, NoticeKind::Emergency);
        assert_eq!(notice.message, "Emergency Stop activated!");

        session.detach().await;
    }

    #[tokio::test]
    async fn power_state_survives_reattach() {
        let (listener, endpoint) = listener().await;
        let session = ControlSession::create(endpoint, SchedulerSettings::default(), geometry());
        assert!(!session.power_on());

        let session = session.attach(ControlVector::centered()).unwrap();
        session.on_action(Action::Power);
        assert!(session.power_on());
        assert_eq!(next_non_move(&listener).await, Command::Start);

        let session = session.detach().await;
        assert!(session.power_on());

        let session = session.attach(ControlVector::centered()).unwrap();
        assert_eq!(session.press(Action::Power).unwrap(), Command::Stop);
        assert_eq!(next_non_move(&listener).await, Command::Stop);
        session.detach().await;
    }

    #[test]
    fn failed_attach_hands_the_session_back() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let session = runtime.block_on(async {
            let session = ControlSession::create(
                Endpoint::new("127.0.0.1", 9),
                SchedulerSettings::default(),
                geometry(),
            )
            .attach(ControlVector::centered())
            .unwrap();
            session.press(Action::Power).unwrap();
            session.flush().await;
            session.detach().await
        });
        drop(runtime);
        assert!(session.power_on());

        // no runtime any more, so the scheduler cannot be built
        let (err, session) = match session.attach(ControlVector::new(0.5, 0.5)) {
            Ok(_) => panic!("attach succeeded without a runtime"),
            Err(failed) => failed,
        };
        assert!(matches!(err, SchedulerError::NoRuntime(_)));
        assert!(session.power_on());
        assert_eq!(session.control_vector(), ControlVector::centered());
        assert_eq!(session.endpoint().to_string(), "127.0.0.1:9");
    }

    #[tokio::test]
    async fn detach_silences_the_link() {
        let (listener, endpoint) = listener().await;
        let session = ControlSession::create(endpoint, SchedulerSettings::default(), geometry())
            .attach(ControlVector::new(0.5, -0.3))
            .unwrap();

        sleep(Duration::from_millis(250)).await;
        let _detached = session.detach().await;
        let sent = drain(&listener).await;
        assert!(sent >= 1);

        let quiet = timeout(Duration::from_millis(400), listener.recv()).await;
        assert!(quiet.is_err(), "datagram arrived after detach");
    }

    /// Drains everything already queued on the listener socket
    async fn drain(listener: &CommandListener) -> usize {
        let mut count = 0;
        while let Ok(Ok(_)) = timeout(Duration::from_millis(50), listener.recv()).await {
            count += 1;
        }
        count
    }
}
