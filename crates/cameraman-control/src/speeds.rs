use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Abstract zoom speed; the actual speed depends on the camera model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomSpeed {
    OutFast,
    OutSlow,
    #[default]
    Stopped,
    InSlow,
    InFast,
}

impl ZoomSpeed {
    pub fn value(self) -> i32 {
        match self {
            ZoomSpeed::OutFast => -200,
            ZoomSpeed::OutSlow => -100,
            ZoomSpeed::Stopped => 0,
            ZoomSpeed::InSlow => 100,
            ZoomSpeed::InFast => 200,
        }
    }

    pub fn is_zoom_in(self) -> bool {
        self.value() > 0
    }

    pub fn is_zoom_out(self) -> bool {
        self.value() < 0
    }

    /// Same speed, opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            ZoomSpeed::OutFast => ZoomSpeed::InFast,
            ZoomSpeed::OutSlow => ZoomSpeed::InSlow,
            ZoomSpeed::Stopped => ZoomSpeed::Stopped,
            ZoomSpeed::InSlow => ZoomSpeed::OutSlow,
            ZoomSpeed::InFast => ZoomSpeed::OutFast,
        }
    }
}

impl fmt::Display for ZoomSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Motion requested for the current frame.
///
/// Pan speed is in degree per second, positive means clockwise. Tilt speed is
/// in degree per second, positive means upwards. Both from the camera's point
/// of view.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CameraSpeeds {
    pub pan_speed: f64,
    pub tilt_speed: f64,
    pub zoom_speed: ZoomSpeed,
}

impl CameraSpeeds {
    pub fn new(pan_speed: f64, tilt_speed: f64, zoom_speed: ZoomSpeed) -> Self {
        Self { pan_speed, tilt_speed, zoom_speed }
    }

    /// Stop all camera movements.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A speed or acceleration value that is rescaled at runtime (see
/// [`crate::updater::MaxSpeedAndAccelerationUpdater`]) while the owner keeps
/// reading it.
#[derive(Debug, Clone, Default)]
pub struct SharedSpeed(Arc<AtomicU64>);

impl SharedSpeed {
    pub fn new(value: f64) -> Self {
        Self(Arc::new(AtomicU64::new(value.to_bits())))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl From<f64> for SharedSpeed {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_stops_everything() {
        let mut speeds = CameraSpeeds::new(3.0, -2.0, ZoomSpeed::InFast);
        speeds.reset();
        assert_eq!(speeds, CameraSpeeds::default());
        assert_eq!(speeds.zoom_speed, ZoomSpeed::Stopped);
    }

    #[test]
    fn zoom_speed_order_follows_values() {
        assert!(ZoomSpeed::OutFast < ZoomSpeed::OutSlow);
        assert!(ZoomSpeed::Stopped < ZoomSpeed::InSlow);
        assert_eq!(ZoomSpeed::InSlow.value(), 100);
        assert_eq!(ZoomSpeed::OutFast.value(), -200);
        assert!(ZoomSpeed::InSlow.is_zoom_in());
        assert!(!ZoomSpeed::Stopped.is_zoom_in() && !ZoomSpeed::Stopped.is_zoom_out());
        assert_eq!(ZoomSpeed::InSlow.reversed(), ZoomSpeed::OutSlow);
    }

    #[test]
    fn zoom_speed_from_config() {
        #[derive(Deserialize)]
        struct Cfg {
            zoom: ZoomSpeed,
        }
        let cfg: Cfg = toml::from_str("zoom = \"in_slow\"").unwrap();
        assert_eq!(cfg.zoom, ZoomSpeed::InSlow);
    }

    #[test]
    fn shared_speed_is_shared_between_clones() {
        let a = SharedSpeed::new(24.0);
        let b = a.clone();
        a.set(12.0);
        assert_eq!(b.get(), 12.0);
    }
}
