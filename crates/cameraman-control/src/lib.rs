pub mod angle;
pub mod controller;
pub mod destination;
pub mod limits;
pub mod mode;
pub mod path;
pub mod search;
pub mod speed;
pub mod speeds;
pub mod tracking;
pub mod updater;
pub mod zoom;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use cameraman_gimbal::GimbalError;

use crate::limits::{ZoomLimit, ZoomLimitController, DEFAULT_ZOOM_RATIO_LIMITS};
use crate::path::PointOfMotion;
use crate::search::SearchTarget;
use crate::tracking::{RotationMode, ZoomInMode};
use crate::zoom::{zoom_ratio_limits, ZoomRatioIndexRange};

#[derive(Debug, Error)]
pub enum ControlError {
    /// The gimbal did not answer or answered garbage; skip the frame.
    #[error("gimbal: {0}")]
    Gimbal(#[from] GimbalError),

    /// A caller broke the calling convention of a controller.
    #[error("contract violation: {0}")]
    Contract(String),
}

impl ControlError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ControlError::Gimbal(_))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Pixels the target center may deviate from the destination.
    #[serde(default = "default_variance")]
    pub variance: f64,
    #[serde(default)]
    pub rotation_mode: RotationMode,
    #[serde(default)]
    pub zoom_in_mode: ZoomInMode,
    #[serde(default = "default_max_allowed_speed")]
    pub max_allowed_speed: f64,
    /// Max speed while the target is aligned after a search.
    #[serde(default = "default_align_max_allowed_speed")]
    pub align_max_allowed_speed: f64,
    /// Seconds to slow down to a halt after the target has been lost.
    #[serde(default = "default_slow_down_time")]
    pub slow_down_time: f64,
    #[serde(default = "default_true")]
    pub zoom_enabled: bool,
}

fn default_variance() -> f64 {
    80.0
}

fn default_max_allowed_speed() -> f64 {
    24.0
}

fn default_align_max_allowed_speed() -> f64 {
    16.0
}

fn default_slow_down_time() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            variance: default_variance(),
            rotation_mode: RotationMode::default(),
            zoom_in_mode: ZoomInMode::default(),
            max_allowed_speed: default_max_allowed_speed(),
            align_max_allowed_speed: default_align_max_allowed_speed(),
            slow_down_time: default_slow_down_time(),
            zoom_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// "rotate" | "static"
    #[serde(default = "default_search_strategy")]
    pub strategy: String,
    /// Pan speed of "rotate", pan and tilt speed of "static".
    #[serde(default)]
    pub speed: f64,
    pub target: Option<SearchTarget>,
}

fn default_search_strategy() -> String {
    "rotate".into()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { strategy: default_search_strategy(), speed: 0.0, target: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeedConfig {
    #[serde(default = "default_acceleration")]
    pub rotational_acceleration: f64,
    #[serde(default = "default_acceleration")]
    pub tilting_acceleration: f64,
    #[serde(default = "default_manual_pan_speed")]
    pub manual_pan_speed: f64,
    #[serde(default = "default_manual_tilt_speed")]
    pub manual_tilt_speed: f64,
}

fn default_acceleration() -> f64 {
    400.0
}

fn default_manual_pan_speed() -> f64 {
    8.0
}

fn default_manual_tilt_speed() -> f64 {
    4.0
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            rotational_acceleration: default_acceleration(),
            tilting_acceleration: default_acceleration(),
            manual_pan_speed: default_manual_pan_speed(),
            manual_tilt_speed: default_manual_tilt_speed(),
        }
    }
}

/// Stop ranges `[min, max]` in degree, see [`limits::AngleLimitController`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitsConfig {
    pub pan: Option<[f64; 2]>,
    pub tilt: Option<[f64; 2]>,
    #[serde(default)]
    pub applied_in_manual_mode: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoomConfig {
    /// "ratio" | "index"
    #[serde(default = "default_zoom_limit")]
    pub limit: String,
    pub min_ratio: Option<f64>,
    pub max_ratio: Option<f64>,
    pub min_index: Option<u32>,
    pub max_index: Option<u32>,
    pub ratio_index_ranges: Option<Vec<ZoomRatioIndexRange>>,
}

fn default_zoom_limit() -> String {
    "ratio".into()
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            limit: default_zoom_limit(),
            min_ratio: None,
            max_ratio: None,
            min_index: None,
            max_index: None,
            ratio_index_ranges: None,
        }
    }
}

impl ZoomConfig {
    pub fn limit_controller(&self) -> ZoomLimitController {
        match self.limit.as_str() {
            "index" => ZoomLimitController::Index(ZoomLimit { current: None, min: self.min_index, max: self.max_index }),
            other => {
                if other != "ratio" {
                    warn!("unknown zoom.limit {:?}, zoom is limited by ratio", other);
                }
                ZoomLimitController::Ratio(ZoomLimit { current: None, min: self.min_ratio, max: self.max_ratio })
            }
        }
    }

    /// Zoom ratio range of the camera.
    pub fn ratio_limits(&self) -> (f64, f64) {
        match &self.ratio_index_ranges {
            Some(ranges) => zoom_ratio_limits(ranges),
            None => DEFAULT_ZOOM_RATIO_LIMITS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathConfig {
    #[serde(default = "default_max_pan_speed")]
    pub max_pan_speed: f64,
    #[serde(default = "default_max_tilt_speed")]
    pub max_tilt_speed: f64,
    #[serde(default = "default_max_pan_speed")]
    pub pan_acceleration: f64,
    #[serde(default = "default_max_tilt_speed")]
    pub tilt_acceleration: f64,
    #[serde(default = "default_update_hz")]
    pub update_hz: u32,
    #[serde(default)]
    pub points: Vec<PointOfMotion>,
}

fn default_max_pan_speed() -> f64 {
    60.0
}

fn default_max_tilt_speed() -> f64 {
    12.0
}

fn default_update_hz() -> u32 {
    15
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            max_pan_speed: default_max_pan_speed(),
            max_tilt_speed: default_max_tilt_speed(),
            pan_acceleration: default_max_pan_speed(),
            tilt_acceleration: default_max_tilt_speed(),
            update_hz: default_update_hz(),
            points: Vec::new(),
        }
    }
}
