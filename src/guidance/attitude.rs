use std::f64::consts::{PI, TAU};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Attitude command / error pipeline
// ---------------------------------------------------------------------------
//
// Attitudes are (roll, pitch, yaw) Euler angles about platform X, Y, Z.
// Pitch is measured from the platform X (vertical at release) towards
// downrange Z, yaw out of the X-Z plane.

/// Per-axis limits, (roll, pitch, yaw) order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttitudeLimits {
    pub rate: [f64; 3],  // rad/s, commanded attitude slew
    pub error: [f64; 3], // rad, attitude error output clamp
}

/// Wrap an angle into (-pi, pi].
pub fn wrap_angle(angle: f64) -> f64 {
    let a = (angle + PI).rem_euclid(TAU) - PI;
    if a <= -PI {
        a + TAU
    } else {
        a
    }
}

/// Move `previous` towards `target` by at most `rate * dt` per axis, along
/// the short way round.
pub fn limit_rate(
    target: &Vector3<f64>,
    previous: &Vector3<f64>,
    dt: f64,
    rate: &[f64; 3],
) -> Vector3<f64> {
    let mut out = *previous;
    for i in 0..3 {
        let delta = wrap_angle(target[i] - previous[i]);
        let max = (rate[i] * dt).abs();
        out[i] = wrap_angle(previous[i] + delta.clamp(-max, max));
    }
    out
}

/// Attitude error in body axes with the roll cross-coupling correction,
/// clamped per axis.
pub fn to_error(commanded: &Vector3<f64>, estimated: &Vector3<f64>, limits: &[f64; 3]) -> Vector3<f64> {
    let dx = wrap_angle(commanded.x - estimated.x);
    let dy = wrap_angle(commanded.y - estimated.y);
    let dz = wrap_angle(commanded.z - estimated.z);
    let (sx, cx) = estimated.x.sin_cos();
    let (sz, cz) = estimated.z.sin_cos();

    let e = Vector3::new(
        dx + sz * dy,
        cx * cz * dy + sx * dz,
        -sx * cz * dy + cx * dz,
    );
    Vector3::new(
        e.x.clamp(-limits[0], limits[0]),
        e.y.clamp(-limits[1], limits[1]),
        e.z.clamp(-limits[2], limits[2]),
    )
}

/// Thrust direction (platform frame) for an attitude.
pub fn direction_from_attitude(attitude: &Vector3<f64>) -> Vector3<f64> {
    let (sp, cp) = attitude.y.sin_cos();
    let (sy, cy) = attitude.z.sin_cos();
    Vector3::new(cp * cy, sy, sp * cy)
}

/// Attitude pointing the thrust axis along `direction`, with the given roll.
pub fn attitude_from_direction(direction: &Vector3<f64>, roll: f64) -> Vector3<f64> {
    let n = direction.norm();
    if n < 1e-12 {
        return Vector3::new(roll, 0.0, 0.0);
    }
    let u = direction / n;
    Vector3::new(roll, u.z.atan2(u.x), u.y.clamp(-1.0, 1.0).asin())
}

/// Local-horizontal attitude: thrust axis along the horizontal component of
/// velocity.
pub fn local_horizontal(position: &Vector3<f64>, velocity: &Vector3<f64>, roll: f64) -> Option<Vector3<f64>> {
    let up = position.try_normalize(1e-9)?;
    let horizontal = velocity - up * velocity.dot(&up);
    let h = horizontal.try_normalize(1e-9)?;
    Some(attitude_from_direction(&h, roll))
}

// ---------------------------------------------------------------------------
// Pipeline state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttitudeState {
    pub commanded: Vector3<f64>,
    pub previous: Vector3<f64>,
    pub estimated: Vector3<f64>,
    pub error: Vector3<f64>,
}

impl AttitudeState {
    /// New commanded attitude, slewing from the last one under the rate limit.
    pub fn command(&mut self, target: &Vector3<f64>, dt: f64, limits: &AttitudeLimits) {
        self.previous = self.commanded;
        self.commanded = limit_rate(target, &self.previous, dt, &limits.rate);
    }

    /// Compute the error output for this tick.
    ///
    /// With `tracking` set (manual override or reference failure) the
    /// command follows the estimate and the error is exactly zero.
    pub fn update_error(&mut self, estimated: Vector3<f64>, tracking: bool, limits: &AttitudeLimits) -> Vector3<f64> {
        self.estimated = estimated;
        if tracking {
            self.commanded = estimated;
            self.previous = estimated;
            self.error = Vector3::zeros();
        } else {
            self.error = to_error(&self.commanded, &estimated, &limits.error);
        }
        self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn limits() -> AttitudeLimits {
        AttitudeLimits {
            rate: [1.0_f64.to_radians(); 3],
            error: [5.0_f64.to_radians(); 3],
        }
    }

    #[test]
    fn wrap_range() {
        assert_relative_eq!(wrap_angle(PI), PI);
        assert_relative_eq!(wrap_angle(-PI), PI);
        assert_relative_eq!(wrap_angle(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(-0.25), -0.25);
    }

    #[test]
    fn rate_limit_takes_short_way_across_wrap() {
        let prev = Vector3::new(0.0, 170.0_f64.to_radians(), 0.0);
        let target = Vector3::new(0.0, (-170.0_f64).to_radians(), 0.0);
        let rate = [5.0_f64.to_radians(); 3];
        let out = limit_rate(&target, &prev, 1.0, &rate);
        // 170 + 5 = 175 deg, not 165
        assert_relative_eq!(out.y.to_degrees(), 175.0, epsilon = 1e-9);

        let out = limit_rate(&target, &out, 1.0, &rate);
        assert_relative_eq!(out.y.abs().to_degrees(), 180.0, epsilon = 1e-9);
        let out = limit_rate(&target, &out, 1.0, &rate);
        assert_relative_eq!(out.y.to_degrees(), -175.0, epsilon = 1e-9);
    }

    #[test]
    fn one_degree_step_toward_short_side() {
        let deg = |d: f64| Vector3::new(d.to_radians(), d.to_radians(), d.to_radians());
        let out = limit_rate(&deg(170.0), &deg(-170.0), 1.0, &[1.0_f64.to_radians(); 3]);
        for i in 0..3 {
            assert_relative_eq!(out[i].to_degrees(), -171.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn rate_limit_reaches_close_targets() {
        let prev = Vector3::zeros();
        let target = Vector3::new(0.001, -0.002, 0.0);
        let out = limit_rate(&target, &prev, 1.0, &limits().rate);
        assert_relative_eq!(out, target, epsilon = 1e-15);
    }

    #[test]
    fn error_without_roll_is_plain_difference() {
        let cmd = Vector3::new(0.01, 0.02, -0.01);
        let est = Vector3::zeros();
        let e = to_error(&cmd, &est, &limits().error);
        assert_relative_eq!(e, cmd, epsilon = 1e-15);
    }

    #[test]
    fn error_couples_pitch_into_yaw_under_roll() {
        let est = Vector3::new(PI / 2.0, 0.0, 0.0);
        let cmd = est + Vector3::new(0.0, 0.02, 0.0);
        let e = to_error(&cmd, &est, &limits().error);
        assert!(e.y.abs() < 1e-12, "pitch error {}", e.y);
        assert_relative_eq!(e.z, -0.02, epsilon = 1e-12);
    }

    #[test]
    fn error_is_clamped() {
        let cmd = Vector3::new(0.0, 1.0, 0.0);
        let e = to_error(&cmd, &Vector3::zeros(), &limits().error);
        assert_relative_eq!(e.y, 5.0_f64.to_radians());
    }

    #[test]
    fn direction_round_trip() {
        let att = Vector3::new(0.3, 0.9, -0.2);
        let back = attitude_from_direction(&direction_from_attitude(&att), 0.3);
        assert_relative_eq!(back, att, epsilon = 1e-12);
    }

    #[test]
    fn tracking_zeroes_error() {
        let mut st = AttitudeState::default();
        st.command(&Vector3::new(0.0, 0.5, 0.0), 10.0, &limits());
        let est = Vector3::new(0.1, 0.2, 0.3);
        let e = st.update_error(est, true, &limits());
        assert_eq!(e, Vector3::zeros());
        assert_eq!(st.commanded, est);
    }

    #[test]
    fn local_horizontal_points_along_ground_track() {
        let pos = Vector3::new(6.6e6, 0.0, 0.0);
        let vel = Vector3::new(50.0, 0.0, 7_800.0);
        let att = local_horizontal(&pos, &vel, 0.0).unwrap();
        assert_relative_eq!(att.y, PI / 2.0, epsilon = 1e-12);
        assert!(local_horizontal(&pos, &Vector3::new(10.0, 0.0, 0.0), 0.0).is_none());
    }
}
