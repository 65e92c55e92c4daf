//! Conversions between degrees and the integer units of the SimpleBGC 2.6
//! serial protocol.

pub const DEGREE_FACTOR: f64 = 0.02197265625;
pub const DEGREE_PER_SEC_FACTOR: f64 = 0.1220740379;

pub fn from_degree(degree: f64) -> i16 {
    (degree / DEGREE_FACTOR) as i16
}

pub fn to_degree(angle: i16) -> f64 {
    angle as f64 * DEGREE_FACTOR
}

/// Degrees normalised to `[0, 360)`.
pub fn to_360_degree(angle: i16) -> f64 {
    to_degree(angle).rem_euclid(360.0)
}

pub fn from_degree_per_sec(degree_per_sec: f64) -> i16 {
    (degree_per_sec / DEGREE_PER_SEC_FACTOR) as i16
}

pub fn to_degree_per_sec(speed: i16) -> f64 {
    speed as f64 * DEGREE_PER_SEC_FACTOR
}
