//! Moving the camera along a predefined path of absolute angles.

use serde::Deserialize;
use tracing::{debug, info};

use cameraman_gimbal::{Angles, ControlCommand, Gimbal};

use crate::angle::{delta_clockwise, delta_counter_clockwise, is_angle_between, is_close_angle};
use crate::speed::SpeedManager;
use crate::speeds::CameraSpeeds;
use crate::ControlError;

/// Waypoint of a path. `time` is the number of seconds to get there from the
/// previous point; zero means as fast as possible.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PointOfMotion {
    pub pan_angle: f64,
    pub pan_clockwise: bool,
    pub tilt_angle: f64,
    pub tilt_clockwise: bool,
    pub time: f64,
    pub zoom_factor: f64,
}

impl Default for PointOfMotion {
    fn default() -> Self {
        Self {
            pan_angle: 0.0,
            pan_clockwise: true,
            tilt_angle: 0.0,
            tilt_clockwise: true,
            time: 0.0,
            zoom_factor: 1.0,
        }
    }
}

impl PointOfMotion {
    pub fn new(pan_angle: f64, tilt_angle: f64) -> Self {
        Self { pan_angle, tilt_angle, ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub pan_angle: f64,
    pub tilt_angle: f64,
}

/// Speeds that get the camera from one point to the next in time.
#[derive(Debug, Clone, Copy)]
pub struct TargetSpeedCalculator {
    pub max_pan_speed: f64,
    pub max_tilt_speed: f64,
}

impl Default for TargetSpeedCalculator {
    fn default() -> Self {
        Self { max_pan_speed: 60.0, max_tilt_speed: 12.0 }
    }
}

impl TargetSpeedCalculator {
    pub fn new(max_pan_speed: f64, max_tilt_speed: f64) -> Self {
        Self { max_pan_speed, max_tilt_speed }
    }

    pub fn calculate(&self, state: &CameraState, target: &PointOfMotion) -> CameraSpeeds {
        if target.time == 0.0 {
            return CameraSpeeds { pan_speed: self.max_pan_speed, tilt_speed: self.max_tilt_speed, ..Default::default() };
        }
        let pan = degree_per_second(state.pan_angle, target.pan_angle, target.pan_clockwise, target.time);
        let tilt = degree_per_second(state.tilt_angle, target.tilt_angle, target.tilt_clockwise, target.time);
        CameraSpeeds {
            pan_speed: pan.min(self.max_pan_speed),
            tilt_speed: tilt.min(self.max_tilt_speed),
            ..Default::default()
        }
    }
}

pub fn degree_per_second(current_angle: f64, target_angle: f64, clockwise: bool, travel_time: f64) -> f64 {
    let delta = if clockwise {
        delta_clockwise(current_angle, target_angle)
    } else {
        delta_counter_clockwise(current_angle, target_angle)
    };
    delta / travel_time
}

/// Tolerance in degree of an angle to count as reached.
pub const ANGLE_TOLERANCE: f64 = 0.05;

pub fn is_current_point_reached(
    pan_angle: f64,
    tilt_angle: f64,
    current: &PointOfMotion,
    next: Option<&PointOfMotion>,
) -> bool {
    let pan_reached = is_current_angle_reached(
        pan_angle,
        current.pan_angle,
        current.pan_clockwise,
        next.map(|n| (n.pan_angle, n.pan_clockwise)),
    );
    let tilt_reached = is_current_angle_reached(
        tilt_angle,
        current.tilt_angle,
        current.tilt_clockwise,
        next.map(|n| (n.tilt_angle, n.tilt_clockwise)),
    );
    if pan_reached {
        debug!("pan angle reached {:.2}", current.pan_angle);
    }
    if tilt_reached {
        debug!("tilt angle reached {:.2}", current.tilt_angle);
    }
    pan_reached && tilt_reached
}

/// An angle the camera passed on its way to the next target in the same
/// direction counts as reached.
pub fn is_current_angle_reached(
    current_angle: f64,
    target_angle: f64,
    target_clockwise: bool,
    next_target: Option<(f64, bool)>,
) -> bool {
    if is_close_angle(target_angle, current_angle, ANGLE_TOLERANCE) {
        return true;
    }
    match next_target {
        Some((next_angle, next_clockwise)) if next_clockwise == target_clockwise => {
            is_angle_between(target_angle, current_angle, next_angle, target_clockwise)
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathState {
    Started,
    Running,
    Stopped,
}

/// Drives the gimbal through a list of [`PointOfMotion`] using absolute angle
/// commands with ramped speeds.
///
/// After the last point is reached no further command is sent; the gimbal
/// stops at the angle of its last command.
pub struct PathOfMotionController<G> {
    gimbal: G,
    path: Vec<PointOfMotion>,
    current_point_index: usize,
    rotate_speed_manager: SpeedManager,
    tilt_speed_manager: SpeedManager,
    target_speed_calculator: TargetSpeedCalculator,
    state: PathState,
    previous_point: Option<PointOfMotion>,
}

impl<G: Gimbal> PathOfMotionController<G> {
    pub fn new(
        gimbal: G,
        rotate_speed_manager: SpeedManager,
        tilt_speed_manager: SpeedManager,
        target_speed_calculator: TargetSpeedCalculator,
    ) -> Self {
        Self {
            gimbal,
            path: Vec::new(),
            current_point_index: 0,
            rotate_speed_manager,
            tilt_speed_manager,
            target_speed_calculator,
            state: PathState::Stopped,
            previous_point: None,
        }
    }

    pub fn gimbal(&self) -> &G {
        &self.gimbal
    }

    pub fn gimbal_mut(&mut self) -> &mut G {
        &mut self.gimbal
    }

    pub fn add_point(&mut self, point: PointOfMotion) {
        self.path.push(point);
    }

    pub fn has_points(&self) -> bool {
        !self.path.is_empty()
    }

    pub fn current_point(&self) -> Option<&PointOfMotion> {
        self.path.get(self.current_point_index)
    }

    pub fn next_point(&self) -> Option<&PointOfMotion> {
        self.path.get(self.current_point_index + 1)
    }

    pub fn has_next_point(&self) -> bool {
        self.current_point_index + 1 < self.path.len()
    }

    pub fn is_end_of_path_reached(&self) -> bool {
        self.current_point_index >= self.path.len()
    }

    pub fn is_target_speed_reached(&self) -> bool {
        self.rotate_speed_manager.is_target_speed_reached() && self.tilt_speed_manager.is_target_speed_reached()
    }

    pub fn start(&mut self) {
        info!("start path of motion with {} points", self.path.len());
        self.rotate_speed_manager.reset();
        self.tilt_speed_manager.reset();
        self.state = PathState::Started;
    }

    /// Sets `speeds` to the measured gimbal speeds and moves on along the path.
    pub fn update(&mut self, speeds: &mut CameraSpeeds) -> Result<(), ControlError> {
        if self.state == PathState::Stopped {
            return Err(ControlError::Contract("path of motion controller is not started".into()));
        }
        if !self.has_points() {
            return Ok(());
        }
        let angles = self.gimbal.get_angles()?;
        log_angles(&angles);
        speeds.pan_speed = angles.pan_speed;
        speeds.tilt_speed = angles.tilt_speed;
        let reached = self.is_current_point_reached(&angles);

        if self.state == PathState::Started {
            self.state = PathState::Running;
            if reached {
                if !self.has_next_point() {
                    self.stop();
                    return Ok(());
                }
                self.advance();
            } else {
                self.previous_point = Some(PointOfMotion::new(angles.pan_angle, angles.tilt_angle));
            }
            let previous = self.previous()?;
            self.update_target_speeds(&previous);
            self.update_speed_managers();
            self.move_gimbal_to_current_point()
        } else if reached {
            if !self.has_next_point() {
                self.stop();
                return Ok(());
            }
            debug!("move to next point");
            self.advance();
            let previous = self.previous()?;
            if let Some(current) = self.current_point().copied() {
                // A gimbal that changes direction stopped at the previous point.
                if previous.pan_clockwise != current.pan_clockwise {
                    debug!("reset pan speed to 0");
                    self.rotate_speed_manager.current_speed = 0.0;
                }
                if previous.tilt_clockwise != current.tilt_clockwise {
                    debug!("reset tilt speed to 0");
                    self.tilt_speed_manager.current_speed = 0.0;
                }
            }
            self.update_target_speeds(&previous);
            self.update_speed_managers();
            self.move_gimbal_to_current_point()
        } else if !self.is_target_speed_reached() {
            debug!("increase speed");
            self.update_speed_managers();
            self.move_gimbal_to_current_point()
        } else {
            debug!("reached target speed");
            self.update_speed_managers();
            Ok(())
        }
    }

    fn previous(&self) -> Result<PointOfMotion, ControlError> {
        self.previous_point
            .ok_or_else(|| ControlError::Contract("previous point of motion is unknown".into()))
    }

    fn is_current_point_reached(&self, angles: &Angles) -> bool {
        match self.current_point() {
            Some(current) => is_current_point_reached(angles.pan_angle, angles.tilt_angle, current, self.next_point()),
            None => false,
        }
    }

    fn advance(&mut self) {
        self.previous_point = self.current_point().copied();
        self.current_point_index = (self.current_point_index + 1).min(self.path.len());
    }

    fn stop(&mut self) {
        info!("end of path reached");
        self.advance();
        self.state = PathState::Stopped;
    }

    fn update_speed_managers(&mut self) {
        self.rotate_speed_manager.update();
        self.tilt_speed_manager.update();
    }

    fn update_target_speeds(&mut self, previous: &PointOfMotion) {
        let Some(target) = self.current_point() else { return; };
        let state = CameraState { pan_angle: previous.pan_angle, tilt_angle: previous.tilt_angle };
        let speeds = self.target_speed_calculator.calculate(&state, target);
        debug!("target speeds from {:?} to {:?}: {:?}", state, target, speeds);
        self.rotate_speed_manager.target_speed = speeds.pan_speed;
        self.tilt_speed_manager.target_speed = speeds.tilt_speed;
    }

    fn move_gimbal_to_current_point(&mut self) -> Result<(), ControlError> {
        let Some(current) = self.current_point().copied() else { return Ok(()); };
        let (mut pan_angle, mut tilt_angle) = (current.pan_angle, current.tilt_angle);
        if let Some(next) = self.next_point() {
            // no stop at the current point if the next one is in the same direction
            if current.pan_clockwise == next.pan_clockwise {
                pan_angle = next.pan_angle;
            }
            if current.tilt_clockwise == next.tilt_clockwise {
                tilt_angle = next.tilt_angle;
            }
        }
        // The gimbal ignores a speed of 0 in angle mode.
        let yaw_speed = self.rotate_speed_manager.current_speed.max(1.0);
        let pitch_speed = self.tilt_speed_manager.current_speed.max(1.0);
        debug!(
            "pan to {:.2} with {:.2}°/s, tilt to {:.2} with {:.2}°/s",
            pan_angle, yaw_speed, tilt_angle, pitch_speed
        );
        self.gimbal.control(&ControlCommand::angles(yaw_speed, pan_angle, pitch_speed, tilt_angle))?;
        Ok(())
    }
}

fn log_angles(angles: &Angles) {
    debug!(
        "pan: {:6.2}° {:6.2}°/s    tilt: {:6.2}° {:6.2}°/s",
        angles.pan_angle, angles.pan_speed, angles.tilt_angle, angles.tilt_speed
    );
}
