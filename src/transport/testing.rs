use super::{Endpoint, Transport, TransportError};
use crate::command::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory transport double that records every payload it is handed
#[derive(Debug)]
pub struct RecordingTransport {
    endpoint: Endpoint,
    sent: Mutex<Vec<Vec<u8>>>,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            endpoint: Endpoint::new("127.0.0.1", 5005),
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            delay: None,
        }
    }

    /// Every send sleeps this long before completing
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|payload| Command::from_payload(payload).unwrap())
            .collect()
    }
}

impl Transport for RecordingTransport {
    async fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed {
                endpoint: self.endpoint.to_string(),
                reason: "network is down".to_string(),
            });
        }
        self.sent.lock().unwrap().push(payload.to_vec());
        Ok(())
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}
