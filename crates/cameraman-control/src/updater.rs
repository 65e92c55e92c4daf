use tracing::{debug, warn};

use crate::speeds::SharedSpeed;

/// Divides max speeds and accelerations by the current zoom ratio.
///
/// The value of a speed at the time it is added counts as its value at zoom
/// ratio 1.
#[derive(Debug, Default)]
pub struct MaxSpeedAndAccelerationUpdater {
    values: Vec<(f64, SharedSpeed)>,
}

impl MaxSpeedAndAccelerationUpdater {
    pub fn add(&mut self, value: SharedSpeed) -> SharedSpeed {
        self.values.push((value.get(), value.clone()));
        value
    }

    pub fn on_zoom_ratio(&self, zoom_ratio: f64) {
        if !(zoom_ratio > 0.0) {
            warn!("ignore invalid zoom ratio {}", zoom_ratio);
            return;
        }
        debug!("scale {} max speeds to zoom ratio {:.1}", self.values.len(), zoom_ratio);
        for (max, value) in &self.values {
            value.set(max / zoom_ratio);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::RotateSearchTargetStrategy;
    use crate::speed::SpeedManager;

    #[test]
    fn scales_registered_values() {
        let mut u = MaxSpeedAndAccelerationUpdater::default();
        let manager = SpeedManager::new(400.0);
        let search = RotateSearchTargetStrategy::new(-8.0);
        u.add(manager.acceleration_handle());
        u.add(search.speed());
        let manual = u.add(SharedSpeed::new(4.0));

        u.on_zoom_ratio(4.0);
        assert_eq!(manager.acceleration_per_second(), 100.0);
        assert_eq!(search.speed().get(), -2.0);
        assert_eq!(manual.get(), 1.0);

        // always relative to zoom ratio 1
        u.on_zoom_ratio(2.0);
        assert_eq!(manager.acceleration_per_second(), 200.0);
        u.on_zoom_ratio(1.0);
        assert_eq!(manual.get(), 4.0);
    }

    #[test]
    fn ignores_invalid_zoom_ratio() {
        let mut u = MaxSpeedAndAccelerationUpdater::default();
        let speed = u.add(SharedSpeed::new(10.0));
        u.on_zoom_ratio(0.0);
        u.on_zoom_ratio(f64::NAN);
        u.on_zoom_ratio(-2.0);
        assert_eq!(speed.get(), 10.0);
    }
}
