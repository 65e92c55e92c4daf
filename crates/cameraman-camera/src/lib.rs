pub mod manager;
pub mod status;

use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("camera rejected the request")]
    Reject,

    #[error("camera is busy")]
    Busy,

    #[error("camera reported a critical error")]
    Critical,

    #[error("camera is controlled by an unsuitable app")]
    UnsuitableApp,

    #[error("camera connection failed: {0}")]
    Connection(String),

    #[error("unknown camera result {0:?}")]
    UnknownResult(String),
}

/// Maps the result code of a camera reply to an error.
pub fn check_result(result: &str) -> Result<(), CameraError> {
    match result {
        "ok" => Ok(()),
        "err_reject" => Err(CameraError::Reject),
        "err_busy" => Err(CameraError::Busy),
        "err_critical" => Err(CameraError::Critical),
        "err_unsuitable_app" => Err(CameraError::UnsuitableApp),
        other => Err(CameraError::UnknownResult(other.to_string())),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraState {
    pub batt: String,
    pub cammode: String,
    pub sdcardstatus: String,
    pub sd_memory: String,
    pub sd_access: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraCapability {
    pub comm_proto_ver: String,
    pub model_name: String,
    pub commands: Vec<String>,
}

/// Remote-control session of a connected camera.
///
/// Calls block until the camera replied or the request timed out.
pub trait RemoteCamera: Send + Sync {
    fn get_state(&self) -> Result<CameraState, CameraError>;
    fn get_info_capability(&self) -> Result<CameraCapability, CameraError>;

    /// Some models require the remote control to register itself first.
    fn register_with_camera(&self, _identify_as: &str) -> Result<(), CameraError> {
        Ok(())
    }

    fn recmode(&self) -> Result<(), CameraError>;
    fn start_stream(&self) -> Result<(), CameraError>;
    fn stop_stream(&self) -> Result<(), CameraError>;

    fn zoom_in_slow(&self) -> Result<(), CameraError>;
    fn zoom_in_fast(&self) -> Result<(), CameraError>;
    fn zoom_out_slow(&self) -> Result<(), CameraError>;
    fn zoom_out_fast(&self) -> Result<(), CameraError>;
    fn zoom_stop(&self) -> Result<(), CameraError>;
}

/// Finds and opens a camera. `Ok(None)` means no camera is reachable right now.
pub trait CameraConnector: Send {
    fn connect(&mut self) -> Result<Option<Arc<dyn RemoteCamera>>, CameraError>;
}

/// Thread-safe access to the currently connected camera, shared between the
/// camera manager and the frame loop.
#[derive(Clone, Default)]
pub struct CameraHandle {
    current: Arc<Mutex<Option<Arc<dyn RemoteCamera>>>>,
}

impl CameraHandle {
    pub fn get(&self) -> Option<Arc<dyn RemoteCamera>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, camera: Option<Arc<dyn RemoteCamera>>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = camera;
    }

    pub fn is_connected(&self) -> bool {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

/// Accepts every command; used without camera hardware.
#[derive(Debug, Default)]
pub struct DummyCamera;

impl RemoteCamera for DummyCamera {
    fn get_state(&self) -> Result<CameraState, CameraError> {
        Ok(CameraState { cammode: "rec".into(), ..Default::default() })
    }

    fn get_info_capability(&self) -> Result<CameraCapability, CameraError> {
        Ok(CameraCapability { model_name: "dummy".into(), ..Default::default() })
    }

    fn recmode(&self) -> Result<(), CameraError> {
        Ok(())
    }

    fn start_stream(&self) -> Result<(), CameraError> {
        Ok(())
    }

    fn stop_stream(&self) -> Result<(), CameraError> {
        Ok(())
    }

    fn zoom_in_slow(&self) -> Result<(), CameraError> {
        Ok(())
    }

    fn zoom_in_fast(&self) -> Result<(), CameraError> {
        Ok(())
    }

    fn zoom_out_slow(&self) -> Result<(), CameraError> {
        Ok(())
    }

    fn zoom_out_fast(&self) -> Result<(), CameraError> {
        Ok(())
    }

    fn zoom_stop(&self) -> Result<(), CameraError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct DummyConnector;

impl CameraConnector for DummyConnector {
    fn connect(&mut self) -> Result<Option<Arc<dyn RemoteCamera>>, CameraError> {
        Ok(Some(Arc::new(DummyCamera)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub enable: bool,

    /// "dummy"
    #[serde(default = "default_kind")]
    pub kind: String,

    /// Seconds between connection checks.
    #[serde(default = "default_poll_interval_s")]
    pub poll_interval_s: u64,

    /// Name to register with cameras that require it before remote control.
    pub identify_as: Option<String>,
}

fn default_kind() -> String {
    "dummy".into()
}

fn default_poll_interval_s() -> u64 {
    10
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_codes() {
        assert_eq!(check_result("ok"), Ok(()));
        assert_eq!(check_result("err_busy"), Err(CameraError::Busy));
        assert_eq!(check_result("err_reject"), Err(CameraError::Reject));
        assert_eq!(check_result("err_critical"), Err(CameraError::Critical));
        assert_eq!(check_result("err_unsuitable_app"), Err(CameraError::UnsuitableApp));
        assert_eq!(check_result("??"), Err(CameraError::UnknownResult("??".into())));
    }

    #[test]
    fn handle_is_shared_between_clones() {
        let a = CameraHandle::default();
        let b = a.clone();
        assert!(!b.is_connected());
        a.set(Some(Arc::new(DummyCamera)));
        assert!(b.is_connected());
        assert!(b.get().is_some());
        a.set(None);
        assert!(b.get().is_none());
    }
}
