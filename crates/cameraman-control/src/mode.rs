//! The cameraman's state machine: manual control, searching, aligning and
//! tracking a target, or holding an absolute angle.

use std::fmt;

use serde::Serialize;
use tracing::{debug, info};

use cameraman_gimbal::{Angles, ControlCommand, Gimbal};
use cameraman_vision::BoundingBox;

use crate::controller::CameraController;
use crate::limits::{AngleLimitController, LimitsSnapshot, LimitsUpdate, ZoomLimits};
use crate::search::SearchTargetStrategy;
use crate::speeds::{CameraSpeeds, ZoomSpeed};
use crate::tracking::{AlignTrackingStrategy, TrackingStrategy};
use crate::ControlError;

/// Speed of the gimbal in angle mode.
const ANGLE_MODE_SPEED: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameramanMode {
    Manual,
    Searching,
    Aligning,
    Tracking,
    Angle,
}

impl CameramanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CameramanMode::Manual => "manual",
            CameramanMode::Searching => "searching",
            CameramanMode::Aligning => "aligning",
            CameramanMode::Tracking => "tracking",
            CameramanMode::Angle => "angle",
        }
    }
}

impl fmt::Display for CameramanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides each frame which strategy sets the camera speeds and forwards them
/// to the camera controller.
///
/// Not reentrant: `update`, `stop` and the manual controls have to be called
/// from the thread that owns the manager.
pub struct CameramanModeManager {
    camera_controller: Box<dyn CameraController>,
    zoom_limits: ZoomLimits,
    angle_limit: AngleLimitController,
    align_tracking_strategy: Box<dyn AlignTrackingStrategy>,
    tracking_strategy: Box<dyn TrackingStrategy>,
    search_target_strategy: Box<dyn SearchTargetStrategy>,
    gimbal: Box<dyn Gimbal>,
    speeds: CameraSpeeds,
    mode: CameramanMode,
    angles: Option<Angles>,
    pub is_zoom_enabled: bool,
    pub are_limits_applied_in_manual_mode: bool,
}

impl CameramanModeManager {
    pub fn new(
        camera_controller: Box<dyn CameraController>,
        zoom_limits: ZoomLimits,
        angle_limit: AngleLimitController,
        align_tracking_strategy: Box<dyn AlignTrackingStrategy>,
        tracking_strategy: Box<dyn TrackingStrategy>,
        search_target_strategy: Box<dyn SearchTargetStrategy>,
        gimbal: Box<dyn Gimbal>,
    ) -> Self {
        Self {
            camera_controller,
            zoom_limits,
            angle_limit,
            align_tracking_strategy,
            tracking_strategy,
            search_target_strategy,
            gimbal,
            speeds: CameraSpeeds::default(),
            // searching as initial mode would start before any angles are known
            mode: CameramanMode::Manual,
            angles: None,
            is_zoom_enabled: true,
            are_limits_applied_in_manual_mode: false,
        }
    }

    pub fn mode(&self) -> CameramanMode {
        self.mode
    }

    pub fn speeds(&self) -> &CameraSpeeds {
        &self.speeds
    }

    /// Angles read from the gimbal in the last update.
    pub fn angles(&self) -> Option<&Angles> {
        self.angles.as_ref()
    }

    pub fn zoom_limits(&self) -> &ZoomLimits {
        &self.zoom_limits
    }

    fn set_mode(&mut self, mode: CameramanMode) {
        let previous = self.mode;
        if previous == mode {
            return;
        }
        info!("mode {} -> {}", previous, mode);
        self.mode = mode;
        if mode == CameramanMode::Searching {
            self.search_target_strategy.start();
        }
        if previous == CameramanMode::Searching {
            self.search_target_strategy.stop();
        }
    }

    /// `target` may only be `None` if it is lost.
    pub fn update(&mut self, target: Option<&BoundingBox>, is_target_lost: bool) -> Result<(), ControlError> {
        if target.is_none() && !is_target_lost {
            return Err(ControlError::Contract("target is missing, but has not been lost".into()));
        }
        self.read_gimbal_angles()?;
        if !matches!(self.mode, CameramanMode::Manual | CameramanMode::Angle) {
            match target {
                None => {
                    if self.mode == CameramanMode::Aligning {
                        self.speeds.reset();
                    }
                    self.set_mode(CameramanMode::Searching);
                    self.search_target_strategy.update(&mut self.speeds);
                }
                Some(target)
                    if matches!(self.mode, CameramanMode::Searching | CameramanMode::Aligning)
                        && !self.align_tracking_strategy.is_aligned(target, &self.zoom_limits) =>
                {
                    self.set_mode(CameramanMode::Aligning);
                    self.align_tracking_strategy.update(&mut self.speeds, Some(target), is_target_lost);
                }
                Some(target) => {
                    self.set_mode(CameramanMode::Tracking);
                    self.tracking_strategy.update(&mut self.speeds, Some(target), is_target_lost);
                }
            }
        }
        if self.mode == CameramanMode::Angle {
            return Ok(());
        }
        if !self.is_zoom_enabled && self.mode != CameramanMode::Manual {
            self.speeds.zoom_speed = ZoomSpeed::Stopped;
        }
        if self.mode != CameramanMode::Manual || self.are_limits_applied_in_manual_mode {
            self.zoom_limits.update(&mut self.speeds);
            self.angle_limit.update(&mut self.speeds);
        }
        self.camera_controller.update(self.gimbal.as_mut(), &self.speeds);
        Ok(())
    }

    fn read_gimbal_angles(&mut self) -> Result<(), ControlError> {
        let angles = self.gimbal.get_angles()?;
        self.angle_limit.update_current_angles(&angles);
        self.search_target_strategy.update_current_angles(&angles);
        self.angles = Some(angles);
        Ok(())
    }

    pub fn update_current_zoom_ratio(&mut self, zoom_ratio: f64) {
        self.zoom_limits.update_current_zoom_ratio(zoom_ratio);
        self.search_target_strategy.update_current_zoom_ratio(zoom_ratio);
    }

    pub fn update_current_zoom_index(&mut self, zoom_index: u32) {
        self.zoom_limits.update_current_zoom_index(zoom_index);
        self.search_target_strategy.update_current_zoom_index(zoom_index);
    }

    pub fn start(&mut self) {
        self.camera_controller.start();
    }

    /// Slows the camera down until it stopped.
    pub fn stop(&mut self) {
        debug!("stop camera mode manager");
        self.speeds.reset();
        self.camera_controller.stop(self.gimbal.as_mut(), &self.speeds);
    }

    /// Resets the speeds; the camera stops with the next update.
    pub fn stop_camera(&mut self) {
        debug!("stop camera");
        self.speeds.reset();
    }

    /// Searches a target to track.
    pub fn tracking_mode(&mut self) {
        self.set_mode(CameramanMode::Searching);
    }

    pub fn manual_mode(&mut self) {
        self.set_mode(CameramanMode::Manual);
    }

    pub fn is_manual_mode(&self) -> bool {
        self.mode == CameramanMode::Manual
    }

    pub fn manual_rotate(&mut self, pan_speed: f64) {
        self.speeds.pan_speed = pan_speed;
    }

    pub fn manual_tilt(&mut self, tilt_speed: f64) {
        self.speeds.tilt_speed = tilt_speed;
    }

    pub fn manual_zoom(&mut self, zoom_speed: ZoomSpeed) {
        self.speeds.zoom_speed = zoom_speed;
    }

    /// Moves the gimbal to absolute angles. Speeds are not sent to the
    /// camera controller until another mode is selected.
    pub fn angle(&mut self, pan_angle: f64, tilt_angle: f64) -> Result<(), ControlError> {
        self.set_mode(CameramanMode::Angle);
        self.gimbal.control(&ControlCommand::angles(ANGLE_MODE_SPEED, pan_angle, ANGLE_MODE_SPEED, tilt_angle))?;
        Ok(())
    }

    pub fn limits(&self) -> LimitsSnapshot {
        LimitsSnapshot {
            applied_in_manual_mode: self.are_limits_applied_in_manual_mode,
            pan: self.angle_limit.pan_limit(),
            tilt: self.angle_limit.tilt_limit(),
        }
    }

    pub fn update_limits(&mut self, update: LimitsUpdate) {
        if let Some(applied) = update.applied_in_manual_mode {
            self.are_limits_applied_in_manual_mode = applied;
        }
        if let Some(pan) = update.pan {
            self.angle_limit.set_pan_limit(pan);
        }
        if let Some(tilt) = update.tilt {
            self.angle_limit.set_tilt_limit(tilt);
        }
        info!("limits: {:?}", self.limits());
    }
}
