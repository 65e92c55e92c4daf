//! Actuation of [`CameraSpeeds`] on gimbal and camera.

use tracing::{debug, error};

use cameraman_camera::{CameraError, CameraHandle, RemoteCamera};
use cameraman_gimbal::{ControlCommand, Gimbal, GimbalError};

use crate::speed::SpeedManager;
use crate::speeds::{CameraSpeeds, ZoomSpeed};

/// Failures of gimbal and camera are logged; the next update tries again.
pub trait CameraController: Send {
    fn start(&mut self) {}

    fn update(&mut self, gimbal: &mut dyn Gimbal, speeds: &CameraSpeeds);

    /// Brings the camera to a halt at `speeds`, which are usually reset.
    fn stop(&mut self, gimbal: &mut dyn Gimbal, speeds: &CameraSpeeds);

    fn is_camera_moving(&self) -> bool;
}

/// Pans only, at the requested speed without acceleration.
#[derive(Debug, Default)]
pub struct SimpleCameraController {
    yaw_speed: f64,
}

impl CameraController for SimpleCameraController {
    fn update(&mut self, gimbal: &mut dyn Gimbal, speeds: &CameraSpeeds) {
        let yaw_speed = speeds.pan_speed;
        if self.yaw_speed == yaw_speed {
            return;
        }
        debug!("rotate gimbal with speed {:.2}", yaw_speed);
        match gimbal.control(&ControlCommand::speeds(yaw_speed, 0.0)) {
            Ok(()) => self.yaw_speed = yaw_speed,
            Err(e) => error!("failed to control gimbal: {}", e),
        }
    }

    fn stop(&mut self, gimbal: &mut dyn Gimbal, speeds: &CameraSpeeds) {
        self.update(gimbal, speeds);
    }

    fn is_camera_moving(&self) -> bool {
        self.yaw_speed != 0.0
    }
}

/// Accelerates pan and tilt through a [`SpeedManager`] each and forwards zoom
/// changes to the connected camera.
pub struct SmoothCameraController {
    camera: CameraHandle,
    rotate_speed_manager: SpeedManager,
    tilt_speed_manager: SpeedManager,
    old_zoom_speed: ZoomSpeed,
}

impl SmoothCameraController {
    pub fn new(camera: CameraHandle, rotate_speed_manager: SpeedManager, tilt_speed_manager: SpeedManager) -> Self {
        Self { camera, rotate_speed_manager, tilt_speed_manager, old_zoom_speed: ZoomSpeed::Stopped }
    }

    pub fn rotate_speed_manager(&self) -> &SpeedManager {
        &self.rotate_speed_manager
    }

    pub fn tilt_speed_manager(&self) -> &SpeedManager {
        &self.tilt_speed_manager
    }

    fn rotate(&mut self, gimbal: &mut dyn Gimbal, speeds: &CameraSpeeds) -> Result<(), GimbalError> {
        debug!("new speeds: pan {:5.1}, tilt {:5.1}", speeds.pan_speed, speeds.tilt_speed);
        self.rotate_speed_manager.target_speed = speeds.pan_speed;
        self.tilt_speed_manager.target_speed = speeds.tilt_speed;
        let old_pan_speed = self.rotate_speed_manager.current_speed;
        let old_tilt_speed = self.tilt_speed_manager.current_speed;
        let pan_speed = self.rotate_speed_manager.update();
        let tilt_speed = self.tilt_speed_manager.update();
        if let Err(e) = gimbal.control(&ControlCommand::speeds(pan_speed, tilt_speed)) {
            self.rotate_speed_manager.current_speed = old_pan_speed;
            self.tilt_speed_manager.current_speed = old_tilt_speed;
            return Err(e);
        }
        debug!("current gimbal speeds are: pan {:5.1}, tilt {:5.1}", pan_speed, tilt_speed);
        Ok(())
    }

    fn zoom(&mut self, zoom_speed: ZoomSpeed) {
        let Some(camera) = self.camera.get() else { return; };
        if zoom_speed == self.old_zoom_speed {
            return;
        }
        debug!("zoom: new {:>5}, old {:>5}", zoom_speed, self.old_zoom_speed);
        match send_zoom(camera.as_ref(), zoom_speed) {
            Ok(()) => self.old_zoom_speed = zoom_speed,
            Err(e) => error!("failed to zoom camera: {}", e),
        }
    }
}

fn send_zoom(camera: &dyn RemoteCamera, zoom_speed: ZoomSpeed) -> Result<(), CameraError> {
    match zoom_speed {
        // both zoom in fast
        ZoomSpeed::InFast | ZoomSpeed::InSlow => camera.zoom_in_fast(),
        ZoomSpeed::Stopped => camera.zoom_stop(),
        ZoomSpeed::OutSlow => camera.zoom_out_slow(),
        ZoomSpeed::OutFast => camera.zoom_out_fast(),
    }
}

impl CameraController for SmoothCameraController {
    fn start(&mut self) {
        self.rotate_speed_manager.reset();
        self.tilt_speed_manager.reset();
    }

    fn update(&mut self, gimbal: &mut dyn Gimbal, speeds: &CameraSpeeds) {
        if let Err(e) = self.rotate(gimbal, speeds) {
            error!("failed to control gimbal: {}", e);
        }
        self.zoom(speeds.zoom_speed);
    }

    fn stop(&mut self, gimbal: &mut dyn Gimbal, speeds: &CameraSpeeds) {
        self.zoom(speeds.zoom_speed);
        while self.is_camera_moving() {
            if let Err(e) = self.rotate(gimbal, speeds) {
                error!("failed to slow down gimbal, giving up: {}", e);
                break;
            }
        }
    }

    fn is_camera_moving(&self) -> bool {
        self.rotate_speed_manager.current_speed != 0.0 || self.tilt_speed_manager.current_speed != 0.0
    }
}
