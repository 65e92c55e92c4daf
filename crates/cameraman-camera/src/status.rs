use std::time::{Duration, Instant};

use time::OffsetDateTime;

use crate::CameraState;

#[derive(Debug, Clone, Default)]
pub struct CameraStatus {
    pub connected: bool,
    pub stream_started: bool,
    pub model_name: Option<String>,
    pub connected_at: Option<OffsetDateTime>,
    pub last_state: Option<CameraState>,
    pub last_contact: Option<Instant>,
    pub last_error: Option<String>,
}

impl CameraStatus {
    pub fn contact_age(&self) -> Option<Duration> {
        self.last_contact.map(|t| t.elapsed())
    }

    pub(crate) fn on_state(&mut self, state: CameraState) {
        self.last_state = Some(state);
        self.last_contact = Some(Instant::now());
    }

    pub(crate) fn on_connected(&mut self, model_name: Option<String>) {
        self.connected = true;
        self.model_name = model_name;
        self.connected_at = Some(OffsetDateTime::now_utc());
    }

    pub(crate) fn on_disconnected(&mut self, error: Option<String>) {
        self.connected = false;
        self.stream_started = false;
        self.connected_at = None;
        if error.is_some() {
            self.last_error = error;
        }
    }
}
