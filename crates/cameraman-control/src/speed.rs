use std::time::Instant;

use crate::speeds::SharedSpeed;

/// Seconds passed since the last update or reset.
pub trait ElapsedTime: Send {
    fn reset(&mut self);

    /// Returns the elapsed seconds and restarts the measurement.
    fn update(&mut self) -> f64;

    /// Returns the elapsed seconds without restarting the measurement.
    fn get(&self) -> f64;
}

#[derive(Debug)]
pub struct WallClock {
    last_update: Instant,
}

impl Default for WallClock {
    fn default() -> Self {
        Self { last_update: Instant::now() }
    }
}

impl ElapsedTime for WallClock {
    fn reset(&mut self) {
        self.last_update = Instant::now();
    }

    fn update(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        elapsed
    }

    fn get(&self) -> f64 {
        self.last_update.elapsed().as_secs_f64()
    }
}

/// Reports the same duration on every call. Used by simulations and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedElapsedTime(pub f64);

impl ElapsedTime for FixedElapsedTime {
    fn reset(&mut self) {}

    fn update(&mut self) -> f64 {
        self.0
    }

    fn get(&self) -> f64 {
        self.0
    }
}

/// Moves the current speed towards the target speed with bounded acceleration.
pub struct SpeedManager {
    acceleration_per_second: SharedSpeed,
    pub target_speed: f64,
    pub current_speed: f64,
    elapsed_time: Box<dyn ElapsedTime>,
}

impl SpeedManager {
    pub fn new(acceleration_per_second: f64) -> Self {
        Self::with_elapsed_time(acceleration_per_second, Box::<WallClock>::default())
    }

    pub fn with_elapsed_time(acceleration_per_second: f64, elapsed_time: Box<dyn ElapsedTime>) -> Self {
        Self {
            acceleration_per_second: SharedSpeed::new(acceleration_per_second),
            target_speed: 0.0,
            current_speed: 0.0,
            elapsed_time,
        }
    }

    pub fn acceleration_per_second(&self) -> f64 {
        self.acceleration_per_second.get()
    }

    pub fn set_acceleration_per_second(&self, value: f64) {
        self.acceleration_per_second.set(value);
    }

    /// Handle for rescaling the acceleration while the manager is owned elsewhere.
    pub fn acceleration_handle(&self) -> SharedSpeed {
        self.acceleration_per_second.clone()
    }

    /// Restarts the time measurement; the current speed is kept.
    pub fn reset(&mut self) {
        self.elapsed_time.reset();
    }

    pub fn is_target_speed_reached(&self) -> bool {
        self.current_speed == self.target_speed
    }

    pub fn update(&mut self) -> f64 {
        let elapsed = self.elapsed_time.update();
        let delta = self.target_speed - self.current_speed;
        let acceleration = (self.acceleration_per_second() * elapsed).min(delta.abs());
        self.current_speed += sign(delta) * acceleration;
        self.current_speed
    }
}

fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}
