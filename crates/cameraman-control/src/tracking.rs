//! Tracking strategies: turn the target box of the current frame into camera
//! speeds that move the target towards its [`Destination`].

use serde::Deserialize;
use tracing::warn;

use cameraman_vision::{BoundingBox, Point};

use crate::destination::Destination;
use crate::limits::ZoomProbe;
use crate::speed::{ElapsedTime, WallClock};
use crate::speeds::{CameraSpeeds, SharedSpeed, ZoomSpeed};

pub trait TrackingStrategy: Send {
    /// Does nothing if there is no target or it has been lost.
    fn update(&mut self, speeds: &mut CameraSpeeds, target: Option<&BoundingBox>, is_target_lost: bool);
}

/// A tracking strategy that also tells whether the target is where it should be.
pub trait AlignTrackingStrategy: TrackingStrategy {
    fn is_aligned(&self, target: &BoundingBox, zoom: &dyn ZoomProbe) -> bool;
}

impl<T: TrackingStrategy + ?Sized> TrackingStrategy for Box<T> {
    fn update(&mut self, speeds: &mut CameraSpeeds, target: Option<&BoundingBox>, is_target_lost: bool) {
        (**self).update(speeds, target, is_target_lost)
    }
}

/// Rotation speed grows linearly with the distance of the target to the
/// destination; no rotation inside the variance.
pub struct SimpleTrackingStrategy {
    destination: Destination,
    image_width: f64,
    image_height: f64,
    max_allowed_speed: SharedSpeed,
}

impl SimpleTrackingStrategy {
    pub fn new(destination: Destination, (width, height): (u32, u32), max_allowed_speed: f64) -> Self {
        Self {
            destination,
            image_width: f64::from(width),
            image_height: f64::from(height),
            max_allowed_speed: SharedSpeed::new(max_allowed_speed),
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn max_allowed_speed(&self) -> SharedSpeed {
        self.max_allowed_speed.clone()
    }

    /// Moves the size envelope onto the target and returns the target and
    /// destination centers.
    fn follow(&mut self, target: &BoundingBox) -> (Point, Point) {
        let t = target.center();
        self.destination.update_size_box_center(t.x, t.y);
        (t, self.destination.center)
    }

    fn speed_by_distance(&self, target: f64, destination: f64, size: f64) -> f64 {
        let max = self.max_allowed_speed.get();
        let distance = target - destination;
        if distance.abs() < self.destination.variance {
            return 0.0;
        }
        let speed = (distance.abs() / (size / 2.0) * max).min(max);
        if distance < 0.0 { -speed } else { speed }
    }

    fn is_xy_aligned(&self, target: &BoundingBox) -> bool {
        self.destination.dead_zone.contains_point(&target.center())
    }

    fn zoom_speed(&self, target: &BoundingBox, zoom_in: ZoomSpeed) -> ZoomSpeed {
        if target.height < self.destination.min_size_box.height {
            zoom_in
        } else if target.height > self.destination.max_size_box.height {
            ZoomSpeed::OutFast
        } else {
            ZoomSpeed::Stopped
        }
    }
}

impl TrackingStrategy for SimpleTrackingStrategy {
    fn update(&mut self, speeds: &mut CameraSpeeds, target: Option<&BoundingBox>, is_target_lost: bool) {
        let Some(target) = target.filter(|_| !is_target_lost) else { return; };
        let (t, d) = self.follow(target);
        speeds.pan_speed = self.speed_by_distance(t.x, d.x, self.image_width);
        // Image y grows downwards, positive tilt speed moves the camera upwards.
        speeds.tilt_speed = -self.speed_by_distance(t.y, d.y, self.image_height);
        speeds.zoom_speed = self.zoom_speed(target, ZoomSpeed::InFast);
    }
}

impl AlignTrackingStrategy for SimpleTrackingStrategy {
    fn is_aligned(&self, target: &BoundingBox, _zoom: &dyn ZoomProbe) -> bool {
        self.is_xy_aligned(target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationMode {
    /// No rotation while the target is inside the variance.
    Stop,
    Linear,
    Quadratic,
    /// Quadratic inside the variance, linear outside.
    #[default]
    QuadraticToLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomInMode {
    Slow,
    Fast,
    /// Zoom in slowly only while the target is inside the dead zone.
    #[default]
    SlowWhenAligned,
    FastWhenAligned,
    /// Fast inside the dead zone, slow while the target keeps 1.5 times its
    /// size away from the live view edges, else not at all.
    Gradually,
    #[serde(other)]
    Unknown,
}

/// [`SimpleTrackingStrategy`] with selectable rotation and zoom-in behaviour.
pub struct ConfigurableTrackingStrategy {
    base: SimpleTrackingStrategy,
    pub rotation_mode: RotationMode,
    pub zoom_in_mode: ZoomInMode,
}

impl ConfigurableTrackingStrategy {
    pub fn new(destination: Destination, image_size: (u32, u32), max_allowed_speed: f64) -> Self {
        Self {
            base: SimpleTrackingStrategy::new(destination, image_size, max_allowed_speed),
            rotation_mode: RotationMode::default(),
            zoom_in_mode: ZoomInMode::default(),
        }
    }

    pub fn with_modes(mut self, rotation_mode: RotationMode, zoom_in_mode: ZoomInMode) -> Self {
        self.rotation_mode = rotation_mode;
        self.zoom_in_mode = zoom_in_mode;
        self
    }

    pub fn destination(&self) -> &Destination {
        &self.base.destination
    }

    pub fn max_allowed_speed(&self) -> SharedSpeed {
        self.base.max_allowed_speed()
    }

    fn speed_by_distance(&self, target: f64, destination: f64, size: f64) -> f64 {
        let max = self.base.max_allowed_speed.get();
        let distance = target - destination;
        let abs_distance = distance.abs();
        let max_distance = size / 2.0;
        let variance = self.base.destination.variance;
        if abs_distance < variance {
            match self.rotation_mode {
                RotationMode::Stop => return 0.0,
                RotationMode::QuadraticToLinear => {
                    return (max * distance * abs_distance) / (variance * max_distance);
                }
                RotationMode::Linear | RotationMode::Quadratic => {}
            }
        }
        let percentage = abs_distance / max_distance;
        let speed = match self.rotation_mode {
            RotationMode::Quadratic => percentage.powi(2) * max,
            _ => percentage * max,
        };
        let speed = speed.min(max);
        if distance < 0.0 { -speed } else { speed }
    }

    fn is_in_slow_zoom_in_range(&self, target: &BoundingBox) -> bool {
        let range = BoundingBox::from_center_and_size(
            self.base.destination.center,
            self.base.image_width - 3.0 * target.width,
            self.base.image_height - 3.0 * target.height,
        );
        range.intersect(target).area() > 0.0
    }

    fn zoom_in(&self, target: &BoundingBox) -> ZoomSpeed {
        let aligned = self.base.is_xy_aligned(target);
        match self.zoom_in_mode {
            ZoomInMode::Slow => ZoomSpeed::InSlow,
            ZoomInMode::Fast => ZoomSpeed::InFast,
            ZoomInMode::SlowWhenAligned if aligned => ZoomSpeed::InSlow,
            ZoomInMode::FastWhenAligned if aligned => ZoomSpeed::InFast,
            ZoomInMode::SlowWhenAligned | ZoomInMode::FastWhenAligned => ZoomSpeed::Stopped,
            ZoomInMode::Gradually if aligned => ZoomSpeed::InFast,
            ZoomInMode::Gradually if self.is_in_slow_zoom_in_range(target) => ZoomSpeed::InSlow,
            ZoomInMode::Gradually => ZoomSpeed::Stopped,
            ZoomInMode::Unknown => {
                warn!("unhandled zoom in mode, zoom is stopped");
                ZoomSpeed::Stopped
            }
        }
    }

    fn is_zoom_aligned(&self, target: &BoundingBox) -> bool {
        let d = &self.base.destination;
        d.min_size_box.height <= target.height && target.height <= d.max_size_box.height
    }
}

impl TrackingStrategy for ConfigurableTrackingStrategy {
    fn update(&mut self, speeds: &mut CameraSpeeds, target: Option<&BoundingBox>, is_target_lost: bool) {
        let Some(target) = target.filter(|_| !is_target_lost) else { return; };
        let (t, d) = self.base.follow(target);
        speeds.pan_speed = self.speed_by_distance(t.x, d.x, self.base.image_width);
        speeds.tilt_speed = -self.speed_by_distance(t.y, d.y, self.base.image_height);
        let zoom_in = self.zoom_in(target);
        speeds.zoom_speed = self.base.zoom_speed(target, zoom_in);
    }
}

impl AlignTrackingStrategy for ConfigurableTrackingStrategy {
    /// Position and size have to match. Once the camera can not zoom in any
    /// further, the size is not considered.
    fn is_aligned(&self, target: &BoundingBox, zoom: &dyn ZoomProbe) -> bool {
        self.base.is_xy_aligned(target) && (self.is_zoom_aligned(target) || zoom.is_max_zoom_reached())
    }
}

/// Slows the camera down after the target has been lost.
///
/// The first lost frame only records the time of loss and keeps the speeds of
/// the inner strategy. Every further lost frame scales pan and tilt speed by
/// `1 - min(t, slow_down_time) / slow_down_time` and stops zooming.
pub struct StopIfLostTrackingStrategy<S> {
    inner: S,
    slow_down_time: f64,
    has_target_been_lost: bool,
    time_of_loss: Box<dyn ElapsedTime>,
}

impl<S: TrackingStrategy> StopIfLostTrackingStrategy<S> {
    pub fn new(inner: S, slow_down_time: f64) -> Self {
        Self::with_elapsed_time(inner, slow_down_time, Box::<WallClock>::default())
    }

    pub fn with_elapsed_time(inner: S, slow_down_time: f64, time_of_loss: Box<dyn ElapsedTime>) -> Self {
        Self { inner, slow_down_time, has_target_been_lost: false, time_of_loss }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S: TrackingStrategy> TrackingStrategy for StopIfLostTrackingStrategy<S> {
    fn update(&mut self, speeds: &mut CameraSpeeds, target: Option<&BoundingBox>, is_target_lost: bool) {
        self.inner.update(speeds, target, is_target_lost);
        if is_target_lost {
            if !self.has_target_been_lost {
                self.time_of_loss.reset();
            } else {
                let factor = if self.slow_down_time > 0.0 {
                    1.0 - self.time_of_loss.get().min(self.slow_down_time) / self.slow_down_time
                } else {
                    0.0
                };
                speeds.pan_speed *= factor;
                speeds.tilt_speed *= factor;
                speeds.zoom_speed = ZoomSpeed::Stopped;
            }
        }
        self.has_target_been_lost = is_target_lost;
    }
}
