//! Angle arithmetic on the 0..360 degree circle.

/// Clockwise travel from `left` to `right`.
pub fn delta_clockwise(left: f64, right: f64) -> f64 {
    if left <= right {
        return right - left;
    }
    (360.0 - left).abs() % 360.0 + right
}

/// Counter-clockwise travel from `left` to `right`.
pub fn delta_counter_clockwise(left: f64, right: f64) -> f64 {
    if left >= right {
        return left - right;
    }
    (360.0 - right).abs() + left
}

/// The smaller of both deltas, in `[0, 180]`.
///
/// Computed directly instead of via the delta functions to keep the number of
/// floating point operations low.
pub fn angle_distance(left: f64, right: f64) -> f64 {
    if left >= right {
        let delta = left - right;
        if delta <= 180.0 {
            return delta;
        }
        return 360.0 - delta;
    }
    let delta = (360.0 - right).abs() + left;
    if delta <= 180.0 {
        return delta;
    }
    right - left
}

/// Whether `angle` lies on the arc from `left` to `right` in the given
/// direction. Both ends are inclusive.
pub fn is_angle_between(left: f64, angle: f64, right: f64, clockwise: bool) -> bool {
    if clockwise {
        if left <= right {
            left <= angle && angle <= right
        } else {
            left <= angle || angle <= right
        }
    } else if left >= right {
        left >= angle && angle >= right
    } else {
        left >= angle || angle >= right
    }
}

/// Whether both angles differ by at most `abs_tol`, also across the 0/360 wrap.
pub fn is_close_angle(a: f64, b: f64, abs_tol: f64) -> bool {
    if (a - b).abs() <= abs_tol {
        return true;
    }
    let a_to_wrap = (360.0 - a).abs() % 360.0;
    let b_to_wrap = (360.0 - b).abs() % 360.0;
    a_to_wrap + b_to_wrap <= abs_tol
}
