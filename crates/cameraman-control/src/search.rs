//! Camera motion while no target is tracked.

use serde::Deserialize;
use tracing::{debug, info, warn};

use cameraman_gimbal::Angles;

use crate::angle::{angle_distance, delta_clockwise};
use crate::limits::{AngleLimitController, ZoomLimitController};
use crate::speeds::{CameraSpeeds, SharedSpeed, ZoomSpeed};

pub trait SearchTargetStrategy: Send {
    fn start(&mut self) {}

    fn stop(&mut self) {}

    fn update(&mut self, speeds: &mut CameraSpeeds);

    fn update_current_angles(&mut self, _angles: &Angles) {}

    fn update_current_zoom_ratio(&mut self, _zoom_ratio: f64) {}

    fn update_current_zoom_index(&mut self, _zoom_index: u32) {}
}

/// Keeps rotating in one direction.
pub struct RotateSearchTargetStrategy {
    speed: SharedSpeed,
}

impl RotateSearchTargetStrategy {
    pub fn new(speed: f64) -> Self {
        Self { speed: SharedSpeed::new(speed) }
    }

    pub fn speed(&self) -> SharedSpeed {
        self.speed.clone()
    }
}

impl SearchTargetStrategy for RotateSearchTargetStrategy {
    fn update(&mut self, speeds: &mut CameraSpeeds) {
        speeds.pan_speed = self.speed.get();
        speeds.tilt_speed = 0.0;
        speeds.zoom_speed = ZoomSpeed::Stopped;
    }
}

/// Absolute camera position to return to while searching. Axes without a
/// value are not moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct SearchTarget {
    pub pan_angle: Option<f64>,
    pub tilt_angle: Option<f64>,
    pub zoom_index: Option<u32>,
    pub zoom_ratio: Option<f64>,
}

impl SearchTarget {
    fn is_empty(&self) -> bool {
        self.pan_angle.is_none()
            && self.tilt_angle.is_none()
            && self.zoom_index.is_none()
            && self.zoom_ratio.is_none()
    }
}

/// Moves the camera to a [`SearchTarget`].
///
/// Each axis rotates the shorter way around. The limit controller is set to
/// the traversed arc, which stops the camera once it reached the target even
/// when it got there across 0/360. Close to the target the speed is divided
/// by the zoom ratio, since every degree moves the live view further the more
/// the camera is zoomed in.
pub struct StaticSearchTargetStrategy {
    pan_speed: f64,
    tilt_speed: f64,
    zoom_limit: ZoomLimitController,
    angle_limit: AngleLimitController,
    target: SearchTarget,
    current_pan_angle: Option<f64>,
    current_tilt_angle: Option<f64>,
    current_zoom_index: Option<u32>,
    current_zoom_ratio: Option<f64>,
    plan: Option<CameraSpeeds>,
    is_searching: bool,
}

impl StaticSearchTargetStrategy {
    pub fn new(
        pan_speed: f64,
        tilt_speed: f64,
        zoom_limit: ZoomLimitController,
        angle_limit: AngleLimitController,
    ) -> Self {
        Self {
            pan_speed: pan_speed.abs(),
            tilt_speed: tilt_speed.abs(),
            zoom_limit,
            angle_limit,
            target: SearchTarget::default(),
            current_pan_angle: None,
            current_tilt_angle: None,
            current_zoom_index: None,
            current_zoom_ratio: None,
            plan: None,
            is_searching: false,
        }
    }

    pub fn target(&self) -> &SearchTarget {
        &self.target
    }

    pub fn update_target(&mut self, target: SearchTarget) {
        info!("update search target {:?}", target);
        self.target = target;
        self.plan = None;
    }

    pub fn is_searching(&self) -> bool {
        self.is_searching
    }

    pub fn angle_limit(&self) -> &AngleLimitController {
        &self.angle_limit
    }

    pub fn zoom_limit(&self) -> &ZoomLimitController {
        &self.zoom_limit
    }

    /// Chooses direction and bounds of every axis. Needs the current angles.
    fn make_plan(&mut self) -> Option<CameraSpeeds> {
        if self.target.is_empty() {
            debug!("no search target set");
            return None;
        }
        let (Some(pan), Some(tilt)) = (self.current_pan_angle, self.current_tilt_angle) else {
            debug!("current angles are not known yet");
            return None;
        };
        let (pan_speed, pan_limit) = plan_axis(pan, self.target.pan_angle, self.pan_speed);
        let (tilt_speed, tilt_limit) = plan_axis(tilt, self.target.tilt_angle, self.tilt_speed);
        self.angle_limit.set_pan_limit(pan_limit);
        self.angle_limit.set_tilt_limit(tilt_limit);
        let zoom_speed = self.plan_zoom();
        info!(
            "search target plan: pan speed {:.2}, tilt speed {:.2}, zoom {:?}",
            pan_speed, tilt_speed, zoom_speed
        );
        Some(CameraSpeeds::new(pan_speed, tilt_speed, zoom_speed))
    }

    fn plan_zoom(&mut self) -> ZoomSpeed {
        match &mut self.zoom_limit {
            ZoomLimitController::Ratio(limit) => {
                if self.target.zoom_index.is_some() {
                    warn!("search target zoom index is ignored, zoom is limited by ratio");
                }
                let (Some(target), Some(current)) = (self.target.zoom_ratio, self.current_zoom_ratio) else {
                    limit.min = None;
                    limit.max = None;
                    return ZoomSpeed::Stopped;
                };
                let speed = plan_zoom_axis(current, target);
                (limit.min, limit.max) = zoom_bounds(speed, target);
                speed
            }
            ZoomLimitController::Index(limit) => {
                if self.target.zoom_ratio.is_some() {
                    warn!("search target zoom ratio is ignored, zoom is limited by index");
                }
                let (Some(target), Some(current)) = (self.target.zoom_index, self.current_zoom_index) else {
                    limit.min = None;
                    limit.max = None;
                    return ZoomSpeed::Stopped;
                };
                let speed = plan_zoom_axis(current, target);
                (limit.min, limit.max) = zoom_bounds(speed, target);
                speed
            }
        }
    }
}

fn plan_axis(current: f64, target: Option<f64>, speed: f64) -> (f64, Option<[f64; 2]>) {
    let Some(target) = target else { return (0.0, None); };
    if delta_clockwise(current, target) < 180.0 {
        (speed, Some([current, target]))
    } else {
        (-speed, Some([target, current]))
    }
}

fn plan_zoom_axis<T: PartialOrd>(current: T, target: T) -> ZoomSpeed {
    if current < target {
        ZoomSpeed::InSlow
    } else if current > target {
        ZoomSpeed::OutSlow
    } else {
        ZoomSpeed::Stopped
    }
}

fn zoom_bounds<T: Copy>(speed: ZoomSpeed, target: T) -> (Option<T>, Option<T>) {
    match speed {
        ZoomSpeed::InSlow | ZoomSpeed::InFast => (None, Some(target)),
        ZoomSpeed::OutSlow | ZoomSpeed::OutFast => (Some(target), None),
        ZoomSpeed::Stopped => (None, None),
    }
}

/// Full speed until the remaining distance is below the speed, then blends
/// towards the zoom-scaled speed.
fn approach(distance: f64, max_speed: f64, zoom_ratio: f64) -> f64 {
    if distance >= max_speed.abs() {
        return max_speed;
    }
    let accurate_speed = max_speed / zoom_ratio;
    let mut speed = accurate_speed;
    if distance > accurate_speed.abs() {
        let percentage = (distance - accurate_speed.abs()).abs() / (max_speed - accurate_speed).abs();
        speed += max_speed.signum() * percentage * (max_speed - accurate_speed).abs();
    }
    speed
}

impl SearchTargetStrategy for StaticSearchTargetStrategy {
    fn start(&mut self) {
        info!("start static search");
        self.is_searching = true;
        self.plan = None;
    }

    fn stop(&mut self) {
        info!("stop static search");
        self.is_searching = false;
        self.plan = None;
    }

    fn update(&mut self, speeds: &mut CameraSpeeds) {
        if !self.is_searching {
            warn!("static search has not been started");
            speeds.reset();
            return;
        }
        if self.plan.is_none() {
            self.plan = self.make_plan();
        }
        let Some(plan) = self.plan else {
            speeds.reset();
            return;
        };
        let zoom_ratio = self.current_zoom_ratio.unwrap_or(1.0);
        speeds.pan_speed = match (self.target.pan_angle, self.current_pan_angle) {
            (Some(target), Some(current)) => approach(angle_distance(target, current), plan.pan_speed, zoom_ratio),
            _ => 0.0,
        };
        speeds.tilt_speed = match (self.target.tilt_angle, self.current_tilt_angle) {
            (Some(target), Some(current)) => approach(angle_distance(target, current), plan.tilt_speed, zoom_ratio),
            _ => 0.0,
        };
        speeds.zoom_speed = plan.zoom_speed;
        self.zoom_limit.update(speeds);
        self.angle_limit.update(speeds);
    }

    fn update_current_angles(&mut self, angles: &Angles) {
        self.current_pan_angle = Some(angles.pan_angle);
        self.current_tilt_angle = Some(angles.tilt_angle);
        self.angle_limit.update_current_angles(angles);
    }

    fn update_current_zoom_ratio(&mut self, zoom_ratio: f64) {
        self.current_zoom_ratio = Some(zoom_ratio);
        self.zoom_limit.update_zoom_ratio(zoom_ratio);
    }

    fn update_current_zoom_index(&mut self, zoom_index: u32) {
        self.current_zoom_index = Some(zoom_index);
        self.zoom_limit.update_zoom_index(zoom_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: f64 = 9.0;

    fn strategy() -> StaticSearchTargetStrategy {
        StaticSearchTargetStrategy::new(MAX, MAX, ZoomLimitController::index(), AngleLimitController::default())
    }

    fn target(pan: f64, tilt: f64, zoom_index: u32) -> SearchTarget {
        SearchTarget { pan_angle: Some(pan), tilt_angle: Some(tilt), zoom_index: Some(zoom_index), zoom_ratio: None }
    }

    fn state(s: &mut StaticSearchTargetStrategy, pan: f64, tilt: f64, zoom_index: u32, zoom_ratio: f64) {
        s.update_current_angles(&Angles { pan_angle: pan, tilt_angle: tilt, ..Default::default() });
        s.update_current_zoom_index(zoom_index);
        s.update_current_zoom_ratio(zoom_ratio);
    }

    fn update(s: &mut StaticSearchTargetStrategy) -> CameraSpeeds {
        let mut speeds = CameraSpeeds::default();
        s.update(&mut speeds);
        speeds
    }

    #[test]
    fn rotate_search_pans_only() {
        let mut s = RotateSearchTargetStrategy::new(-5.0);
        let mut speeds = CameraSpeeds::new(1.0, 2.0, ZoomSpeed::InFast);
        s.update(&mut speeds);
        assert_eq!(speeds, CameraSpeeds::new(-5.0, 0.0, ZoomSpeed::Stopped));
        s.speed().set(2.5);
        s.update(&mut speeds);
        assert_eq!(speeds.pan_speed, 2.5);
    }

    #[test]
    fn approaches_target_from_left() {
        let mut s = strategy();
        s.update_target(target(10.0, 15.0, 20));
        state(&mut s, 0.0, 0.0, 0, 1.0);
        s.start();
        assert_eq!(update(&mut s), CameraSpeeds::new(MAX, MAX, ZoomSpeed::InSlow));

        state(&mut s, 3.25, 8.25, 11, 2.0);
        let speeds = update(&mut s);
        assert_eq!(speeds.pan_speed, 6.75);
        assert_eq!(speeds.tilt_speed, 6.75);
        assert_eq!(speeds.zoom_speed, ZoomSpeed::InSlow);

        state(&mut s, 8.0, 13.0, 15, 3.0);
        let speeds = update(&mut s);
        assert_eq!(speeds.pan_speed, MAX / 3.0);
        assert_eq!(speeds.tilt_speed, MAX / 3.0);

        state(&mut s, 10.0, 15.0, 20, 4.0);
        assert_eq!(update(&mut s), CameraSpeeds::new(0.0, 0.0, ZoomSpeed::Stopped));
        s.stop();
    }

    #[test]
    fn approaches_target_across_zero_from_left() {
        let mut s = strategy();
        state(&mut s, 359.0, 351.0, 0, 1.0);
        s.update_target(target(10.0, 5.0, 0));
        s.start();
        assert_eq!(update(&mut s), CameraSpeeds::new(MAX, MAX, ZoomSpeed::Stopped));

        state(&mut s, 10.0, 5.0, 0, 4.0);
        assert_eq!(update(&mut s), CameraSpeeds::new(0.0, 0.0, ZoomSpeed::Stopped));
    }

    #[test]
    fn approaches_target_from_right() {
        let mut s = strategy();
        state(&mut s, 20.0, 15.0, 40, 1.0);
        s.update_target(target(10.0, 5.0, 20));
        s.start();
        assert_eq!(update(&mut s), CameraSpeeds::new(-MAX, -MAX, ZoomSpeed::OutSlow));

        state(&mut s, 16.75, 11.75, 30, 6.0);
        let speeds = update(&mut s);
        assert_eq!(speeds.pan_speed, -6.75);
        assert_eq!(speeds.tilt_speed, -6.75);
        assert_eq!(speeds.zoom_speed, ZoomSpeed::OutSlow);

        state(&mut s, 11.5, 6.5, 25, 5.0);
        let speeds = update(&mut s);
        assert_eq!(speeds.pan_speed, -MAX / 5.0);
        assert_eq!(speeds.tilt_speed, -MAX / 5.0);

        state(&mut s, 10.0, 5.0, 20, 4.0);
        assert_eq!(update(&mut s), CameraSpeeds::new(0.0, 0.0, ZoomSpeed::Stopped));
    }

    #[test]
    fn approaches_target_across_zero_from_right() {
        let mut s = strategy();
        state(&mut s, 1.0, 11.0, 0, 1.0);
        s.update_target(target(351.0, 356.0, 0));
        s.start();
        assert_eq!(update(&mut s), CameraSpeeds::new(-MAX, -MAX, ZoomSpeed::Stopped));

        state(&mut s, 351.0, 356.0, 0, 1.0);
        assert_eq!(update(&mut s), CameraSpeeds::new(0.0, 0.0, ZoomSpeed::Stopped));
    }

    #[test]
    fn does_not_move_without_target() {
        let mut s = strategy();
        state(&mut s, 0.0, 0.0, 0, 1.0);
        s.start();
        assert_eq!(update(&mut s), CameraSpeeds::default());

        s.update_target(target(10.0, 15.0, 20));
        assert_eq!(update(&mut s), CameraSpeeds::new(MAX, MAX, ZoomSpeed::InSlow));
    }

    #[test]
    fn does_not_move_before_angles_are_known() {
        let mut s = strategy();
        s.update_target(target(10.0, 15.0, 20));
        s.start();
        assert_eq!(update(&mut s), CameraSpeeds::default());

        state(&mut s, 0.0, 0.0, 0, 1.0);
        assert_eq!(update(&mut s), CameraSpeeds::new(MAX, MAX, ZoomSpeed::InSlow));
    }

    #[test]
    fn axes_without_target_are_not_moved() {
        let mut s = StaticSearchTargetStrategy::new(MAX, MAX, ZoomLimitController::ratio(), AngleLimitController::default());
        state(&mut s, 100.0, 0.0, 0, 2.0);
        s.update_target(SearchTarget { pan_angle: Some(50.0), zoom_ratio: Some(1.0), ..Default::default() });
        s.start();
        assert_eq!(update(&mut s), CameraSpeeds::new(-MAX, 0.0, ZoomSpeed::OutSlow));
        assert_eq!(s.angle_limit().tilt_limit(), None);

        state(&mut s, 100.0, 0.0, 0, 1.0);
        assert_eq!(update(&mut s).zoom_speed, ZoomSpeed::Stopped);
    }

    #[test]
    fn update_without_start_stops_camera() {
        let mut s = strategy();
        state(&mut s, 0.0, 0.0, 0, 1.0);
        s.update_target(target(10.0, 15.0, 20));
        let mut speeds = CameraSpeeds::new(1.0, 1.0, ZoomSpeed::InFast);
        s.update(&mut speeds);
        assert_eq!(speeds, CameraSpeeds::default());
        assert!(!s.is_searching());
    }

    #[test]
    fn search_target_from_config() {
        let t: SearchTarget = toml::from_str("pan_angle = 90.0\nzoom_ratio = 2.0").unwrap();
        assert_eq!(t.pan_angle, Some(90.0));
        assert_eq!(t.tilt_angle, None);
        assert_eq!(t.zoom_ratio, Some(2.0));
    }
}
