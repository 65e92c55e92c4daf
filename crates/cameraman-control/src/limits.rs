//! Clamping of camera speeds to configured pan/tilt/zoom bounds.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cameraman_gimbal::Angles;

use crate::angle::{delta_clockwise, delta_counter_clockwise, is_angle_between};
use crate::speeds::{CameraSpeeds, ZoomSpeed};

/// Blocks pan/tilt motion inside a configured stop range.
///
/// The camera may rotate a full circle, so a single bound could be reached
/// from both directions. Min and max together define the range in which the
/// camera stops, i.e. the counter-clockwise arc from min to max. Once the
/// camera passed a bound, it may only move towards the closer bound to leave
/// the range again.
#[derive(Debug, Clone, Default)]
pub struct AngleLimitController {
    pub min_pan_angle: Option<f64>,
    pub max_pan_angle: Option<f64>,
    pub min_tilt_angle: Option<f64>,
    pub max_tilt_angle: Option<f64>,
    current_pan_angle: Option<f64>,
    current_tilt_angle: Option<f64>,
}

impl AngleLimitController {
    pub fn update_current_angles(&mut self, angles: &Angles) {
        self.current_pan_angle = Some(angles.pan_angle);
        self.current_tilt_angle = Some(angles.tilt_angle);
    }

    pub fn set_pan_limit(&mut self, limit: Option<[f64; 2]>) {
        self.min_pan_angle = limit.map(|l| l[0]);
        self.max_pan_angle = limit.map(|l| l[1]);
    }

    pub fn set_tilt_limit(&mut self, limit: Option<[f64; 2]>) {
        self.min_tilt_angle = limit.map(|l| l[0]);
        self.max_tilt_angle = limit.map(|l| l[1]);
    }

    pub fn pan_limit(&self) -> Option<[f64; 2]> {
        Some([self.min_pan_angle?, self.max_pan_angle?])
    }

    pub fn tilt_limit(&self) -> Option<[f64; 2]> {
        Some([self.min_tilt_angle?, self.max_tilt_angle?])
    }

    pub fn update(&self, speeds: &mut CameraSpeeds) {
        let (Some(pan), Some(tilt)) = (self.current_pan_angle, self.current_tilt_angle) else {
            debug!("current angles are not set yet");
            return;
        };
        debug!("pan angle: {:5.1}, tilt angle: {:5.1}", pan, tilt);
        if limit_axis(pan, self.min_pan_angle, self.max_pan_angle, &mut speeds.pan_speed) {
            debug!("pan angle limit reached, pan speed is set to 0");
        }
        if limit_axis(tilt, self.min_tilt_angle, self.max_tilt_angle, &mut speeds.tilt_speed) {
            debug!("tilt angle limit reached, tilt speed is set to 0");
        }
    }
}

/// Returns true if the speed has been zeroed.
fn limit_axis(current: f64, min: Option<f64>, max: Option<f64>, speed: &mut f64) -> bool {
    let (Some(min), Some(max)) = (min, max) else { return false; };
    if !is_angle_between(min, current, max, false) {
        return false;
    }
    let min_delta = delta_clockwise(current, min);
    let max_delta = delta_counter_clockwise(current, max);
    let blocked = if min_delta < max_delta { *speed < 0.0 } else { *speed > 0.0 };
    if blocked {
        *speed = 0.0;
    }
    blocked
}

/// Bounds of a zoom value (ratio or motor index) and its last known value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoomLimit<T> {
    pub current: Option<T>,
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T: PartialOrd + Copy + std::fmt::Debug> ZoomLimit<T> {
    pub fn is_min_reached(&self) -> bool {
        matches!((self.current, self.min), (Some(c), Some(min)) if c <= min)
    }

    pub fn is_max_reached(&self) -> bool {
        matches!((self.current, self.max), (Some(c), Some(max)) if c >= max)
    }

    pub fn update(&self, speeds: &mut CameraSpeeds) {
        let Some(current) = self.current else { return; };
        debug!("check if current zoom {:?} reached limit", current);
        if self.min.is_some() && speeds.zoom_speed.is_zoom_out() && self.is_min_reached() {
            debug!("min zoom reached, zoom speed is set to 0");
            speeds.zoom_speed = ZoomSpeed::Stopped;
        }
        if self.max.is_some() && speeds.zoom_speed.is_zoom_in() && self.is_max_reached() {
            debug!("max zoom reached, zoom speed is set to 0");
            speeds.zoom_speed = ZoomSpeed::Stopped;
        }
    }
}

/// Zoom bounds either as zoom ratio or as the camera's zoom motor index.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoomLimitController {
    Ratio(ZoomLimit<f64>),
    Index(ZoomLimit<u32>),
}

impl Default for ZoomLimitController {
    fn default() -> Self {
        ZoomLimitController::Ratio(ZoomLimit::default())
    }
}

impl ZoomLimitController {
    pub fn ratio() -> Self {
        ZoomLimitController::Ratio(ZoomLimit::default())
    }

    pub fn index() -> Self {
        ZoomLimitController::Index(ZoomLimit::default())
    }

    pub fn update_zoom_ratio(&mut self, zoom_ratio: f64) {
        if let ZoomLimitController::Ratio(l) = self {
            l.current = Some(zoom_ratio);
        }
    }

    pub fn update_zoom_index(&mut self, zoom_index: u32) {
        if let ZoomLimitController::Index(l) = self {
            l.current = Some(zoom_index);
        }
    }

    pub fn has_min(&self) -> bool {
        match self {
            ZoomLimitController::Ratio(l) => l.min.is_some(),
            ZoomLimitController::Index(l) => l.min.is_some(),
        }
    }

    pub fn has_max(&self) -> bool {
        match self {
            ZoomLimitController::Ratio(l) => l.max.is_some(),
            ZoomLimitController::Index(l) => l.max.is_some(),
        }
    }

    pub fn is_min_reached(&self) -> bool {
        match self {
            ZoomLimitController::Ratio(l) => l.is_min_reached(),
            ZoomLimitController::Index(l) => l.is_min_reached(),
        }
    }

    pub fn is_max_reached(&self) -> bool {
        match self {
            ZoomLimitController::Ratio(l) => l.is_max_reached(),
            ZoomLimitController::Index(l) => l.is_max_reached(),
        }
    }

    pub fn update(&self, speeds: &mut CameraSpeeds) {
        match self {
            ZoomLimitController::Ratio(l) => l.update(speeds),
            ZoomLimitController::Index(l) => l.update(speeds),
        }
    }
}

/// Answers whether the camera can zoom any further.
pub trait ZoomProbe {
    fn is_max_zoom_reached(&self) -> bool;
    fn is_min_zoom_reached(&self) -> bool;
}

pub const DEFAULT_ZOOM_RATIO_LIMITS: (f64, f64) = (1.0, 14.3);

/// Zoom limit controller of the mode manager plus the camera's own zoom
/// ratio range, which applies where the controller has no bound.
#[derive(Debug, Clone)]
pub struct ZoomLimits {
    controller: ZoomLimitController,
    min_zoom_ratio: f64,
    max_zoom_ratio: f64,
    current_zoom_ratio: Option<f64>,
}

impl ZoomLimits {
    pub fn new(controller: ZoomLimitController, (min_zoom_ratio, max_zoom_ratio): (f64, f64)) -> Self {
        Self { controller, min_zoom_ratio, max_zoom_ratio, current_zoom_ratio: None }
    }

    pub fn controller(&self) -> &ZoomLimitController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ZoomLimitController {
        &mut self.controller
    }

    pub fn update_current_zoom_ratio(&mut self, zoom_ratio: f64) {
        self.current_zoom_ratio = Some(zoom_ratio);
        self.controller.update_zoom_ratio(zoom_ratio);
    }

    pub fn update_current_zoom_index(&mut self, zoom_index: u32) {
        self.controller.update_zoom_index(zoom_index);
    }

    pub fn update(&self, speeds: &mut CameraSpeeds) {
        self.controller.update(speeds);
    }
}

impl ZoomProbe for ZoomLimits {
    fn is_max_zoom_reached(&self) -> bool {
        if self.controller.has_max() {
            return self.controller.is_max_reached();
        }
        self.current_zoom_ratio.is_some_and(|z| z >= self.max_zoom_ratio)
    }

    fn is_min_zoom_reached(&self) -> bool {
        if self.controller.has_min() {
            return self.controller.is_min_reached();
        }
        self.current_zoom_ratio.is_some_and(|z| z <= self.min_zoom_ratio)
    }
}

/// Limits that can be replaced while the cameraman is running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitsSnapshot {
    #[serde(default)]
    pub applied_in_manual_mode: bool,
    pub pan: Option<[f64; 2]>,
    pub tilt: Option<[f64; 2]>,
}

/// Partial limits change; `None` keeps the current value, `Some(None)`
/// removes a limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitsUpdate {
    pub applied_in_manual_mode: Option<bool>,
    pub pan: Option<Option<[f64; 2]>>,
    pub tilt: Option<Option<[f64; 2]>>,
}

impl LimitsUpdate {
    /// Parses `pan <min> <max>`, `tilt <min> <max>`, `pan off`, `tilt off`,
    /// `manual on` or `manual off`.
    pub fn parse(args: &[&str]) -> Option<Self> {
        let parse_range = |rest: &[&str]| -> Option<Option<[f64; 2]>> {
            match rest {
                ["off"] => Some(None),
                [min, max] => Some(Some([min.parse().ok()?, max.parse().ok()?])),
                _ => None,
            }
        };
        match args {
            ["pan", rest @ ..] => Some(Self { pan: Some(parse_range(rest)?), ..Default::default() }),
            ["tilt", rest @ ..] => Some(Self { tilt: Some(parse_range(rest)?), ..Default::default() }),
            ["manual", "on"] => Some(Self { applied_in_manual_mode: Some(true), ..Default::default() }),
            ["manual", "off"] => Some(Self { applied_in_manual_mode: Some(false), ..Default::default() }),
            _ => {
                warn!("unknown limits update {:?}", args);
                None
            }
        }
    }
}
