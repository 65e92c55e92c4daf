use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::status::CameraStatus;
use crate::{CameraConnector, CameraError, CameraHandle, RemoteCamera};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Connection upkeep of one camera: connect, keep the live-view stream
/// running, reconnect after a lost connection.
pub struct CameraSession {
    connector: Box<dyn CameraConnector>,
    identify_as: Option<String>,
    handle: CameraHandle,
    status: Arc<Mutex<CameraStatus>>,
    is_stream_started: bool,
}

impl CameraSession {
    pub fn new(connector: Box<dyn CameraConnector>, identify_as: Option<String>) -> Self {
        Self {
            connector,
            identify_as,
            handle: CameraHandle::default(),
            status: Arc::new(Mutex::new(CameraStatus::default())),
            is_stream_started: false,
        }
    }

    pub fn handle(&self) -> CameraHandle {
        self.handle.clone()
    }

    pub fn status(&self) -> Arc<Mutex<CameraStatus>> {
        self.status.clone()
    }

    pub fn is_stream_started(&self) -> bool {
        self.is_stream_started
    }

    fn with_status<F: FnOnce(&mut CameraStatus)>(&self, f: F) {
        f(&mut self.status.lock().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn ensure_connection(&mut self) {
        match self.handle.get() {
            Some(camera) => {
                if let Err(e) = self.refresh(&camera) {
                    debug!("lost connection to camera: {}", e);
                    self.is_stream_started = false;
                    self.with_status(|s| s.on_disconnected(Some(e.to_string())));
                    self.connect();
                }
            }
            None => self.connect(),
        }
    }

    /// Queries the state and starts the stream if needed. Only connection
    /// failures are returned; everything else is logged.
    fn refresh(&mut self, camera: &Arc<dyn RemoteCamera>) -> Result<(), CameraError> {
        match camera.get_state() {
            Ok(state) => {
                debug!("camera state: {:?}", state);
                self.with_status(|s| s.on_state(state));
            }
            Err(e @ CameraError::Connection(_)) => return Err(e),
            Err(e) => warn!("camera state query failed: {}", e),
        }
        if !self.is_stream_started {
            self.start_camera_stream(camera);
        }
        Ok(())
    }

    fn connect(&mut self) {
        debug!("try to connect");
        let camera = match self.connector.connect() {
            Ok(Some(camera)) => camera,
            Ok(None) => {
                debug!("no camera found");
                self.handle.set(None);
                return;
            }
            Err(e) => {
                warn!("camera connect failed: {}", e);
                self.handle.set(None);
                self.with_status(|s| s.on_disconnected(Some(e.to_string())));
                return;
            }
        };

        if let Some(name) = &self.identify_as {
            debug!("attempting to identify as {}", name);
            if let Err(e) = camera.register_with_camera(name) {
                warn!("could not identify as {}: {}", name, e);
            }
        }
        // some models only start streaming after the capabilities were read
        let model_name = match camera.get_info_capability() {
            Ok(c) => Some(c.model_name),
            Err(e) => {
                warn!("could not read camera capabilities: {}", e);
                None
            }
        };

        self.handle.set(Some(camera.clone()));
        self.with_status(|s| s.on_connected(model_name));
        if let Err(e) = self.refresh(&camera) {
            warn!("camera connection lost right after connecting: {}", e);
            self.handle.set(None);
            self.with_status(|s| s.on_disconnected(Some(e.to_string())));
        } else {
            info!("camera connected");
        }
    }

    fn start_camera_stream(&mut self, camera: &Arc<dyn RemoteCamera>) {
        let started = camera.recmode().and_then(|_| camera.start_stream());
        match started {
            Ok(()) => {
                self.is_stream_started = true;
                self.with_status(|s| s.stream_started = true);
                debug!("camera stream is started");
            }
            Err(e) => {
                error!("could not start camera stream: {}", e);
                self.with_status(|s| s.last_error = Some(e.to_string()));
            }
        }
    }

    /// Stops the live-view stream of the current camera, if any.
    pub fn stop_stream(&mut self) {
        let Some(camera) = self.handle.get() else { return; };
        debug!("stop camera stream");
        match camera.stop_stream() {
            Ok(()) => {}
            Err(e @ CameraError::Critical) => warn!("could not stop camera stream: {}", e),
            Err(e) => error!("could not stop camera stream: {}", e),
        }
        self.is_stream_started = false;
        self.with_status(|s| s.stream_started = false);
    }
}

/// Runs a [`CameraSession`] on a blocking task at a fixed interval.
///
/// The frame loop only sees the camera through [`CameraManager::handle`].
pub struct CameraManager {
    handle: CameraHandle,
    status: Arc<Mutex<CameraStatus>>,
    stop_tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CameraManager {
    pub fn start(mut session: CameraSession, interval: Duration) -> Self {
        let handle = session.handle();
        let status = session.status();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let task = tokio::task::spawn_blocking(move || {
            session.ensure_connection();
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => session.ensure_connection(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            session.stop_stream();
            debug!("camera manager stopped");
        });

        Self { handle, status, stop_tx: Some(stop_tx), task: Some(task) }
    }

    pub fn handle(&self) -> CameraHandle {
        self.handle.clone()
    }

    pub fn status(&self) -> CameraStatus {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Ends the interval loop, stops the stream and waits for the task.
    pub async fn cancel(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("camera manager task failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCamera;

    struct SharedConnector {
        camera: Option<Arc<FakeCamera>>,
        attempts: Arc<Mutex<u32>>,
    }

    impl CameraConnector for SharedConnector {
        fn connect(&mut self) -> Result<Option<Arc<dyn RemoteCamera>>, CameraError> {
            *self.attempts.lock().unwrap() += 1;
            Ok(self.camera.clone().map(|c| c as Arc<dyn RemoteCamera>))
        }
    }

    fn session(camera: Option<Arc<FakeCamera>>, identify_as: Option<&str>) -> (CameraSession, Arc<Mutex<u32>>) {
        let attempts = Arc::new(Mutex::new(0));
        let connector = SharedConnector { camera, attempts: attempts.clone() };
        (CameraSession::new(Box::new(connector), identify_as.map(String::from)), attempts)
    }

    #[test]
    fn connects_and_starts_stream() {
        let camera = Arc::new(FakeCamera::default());
        let (mut s, _) = session(Some(camera.clone()), Some("cameraman"));
        s.ensure_connection();
        assert!(s.handle().is_connected());
        assert!(s.is_stream_started());
        assert_eq!(
            camera.calls(),
            vec!["register_with_camera", "get_info_capability", "get_state", "recmode", "start_stream"]
        );
        let status = s.status().lock().unwrap().clone();
        assert!(status.connected && status.stream_started);
        assert_eq!(status.model_name.as_deref(), Some("fake"));
    }

    #[test]
    fn no_camera_found() {
        let (mut s, attempts) = session(None, None);
        s.ensure_connection();
        s.ensure_connection();
        assert!(!s.handle().is_connected());
        assert_eq!(*attempts.lock().unwrap(), 2);
    }

    #[test]
    fn busy_camera_retries_stream_on_next_interval() {
        let camera = Arc::new(FakeCamera::default());
        camera.fail_next("start_stream", CameraError::Busy);
        let (mut s, attempts) = session(Some(camera.clone()), None);
        s.ensure_connection();
        assert!(s.handle().is_connected());
        assert!(!s.is_stream_started());
        s.ensure_connection();
        assert!(s.is_stream_started());
        assert_eq!(*attempts.lock().unwrap(), 1);
    }

    #[test]
    fn lost_connection_reconnects() {
        let camera = Arc::new(FakeCamera::default());
        let (mut s, attempts) = session(Some(camera.clone()), None);
        s.ensure_connection();
        camera.fail_next("get_state", CameraError::Connection("timeout".into()));
        s.ensure_connection();
        assert_eq!(*attempts.lock().unwrap(), 2);
        assert!(s.handle().is_connected());
        assert!(s.is_stream_started());
        let starts = camera.calls().iter().filter(|c| **c == "start_stream").count();
        assert_eq!(starts, 2);
    }

    #[test]
    fn protocol_rejection_keeps_connection() {
        let camera = Arc::new(FakeCamera::default());
        let (mut s, attempts) = session(Some(camera.clone()), None);
        s.ensure_connection();
        camera.fail_next("get_state", CameraError::Reject);
        s.ensure_connection();
        assert_eq!(*attempts.lock().unwrap(), 1);
        assert!(s.handle().is_connected());
    }

    #[test]
    fn critical_stop_failure_is_tolerated() {
        let camera = Arc::new(FakeCamera::default());
        let (mut s, _) = session(Some(camera.clone()), None);
        s.ensure_connection();
        camera.fail_next("stop_stream", CameraError::Critical);
        s.stop_stream();
        assert!(!s.is_stream_started());
    }

    #[tokio::test]
    async fn manager_cancel_stops_stream_and_joins() {
        let camera = Arc::new(FakeCamera::default());
        let (s, _) = session(Some(camera.clone()), None);
        let mut manager = CameraManager::start(s, Duration::from_secs(3600));
        let handle = manager.handle();
        manager.cancel().await;
        assert!(handle.is_connected());
        assert_eq!(camera.calls().last(), Some(&"stop_stream"));
        assert!(!manager.status().stream_started);
    }
}
