use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::atmosphere;
use super::gravity::OMEGA_EARTH;

// ---------------------------------------------------------------------------
// Orbital drag model
// ---------------------------------------------------------------------------

/// Drag of the orbiting stack.
///
/// Effective area is a cubic in cos(alpha), alpha being the angle between
/// the vehicle longitudinal axis and the air-relative velocity, so a stack
/// flying nose-first sees less area than one flying broadside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DragModel {
    pub cd: f64,
    pub area_poly: [f64; 4], // m^2, coefficients of 1, c, c^2, c^3
    pub mass: f64,           // kg
}

impl Default for DragModel {
    fn default() -> Self {
        // Orbiting S-IVB/IU/payload stack
        Self {
            cd: 2.2,
            area_poly: [34.3, 0.0, -27.6, 0.0],
            mass: 128_000.0,
        }
    }
}

impl DragModel {
    /// Effective area for a given cos(alpha).
    pub fn area(&self, cos_alpha: f64) -> f64 {
        let c = cos_alpha.abs().min(1.0);
        let [a0, a1, a2, a3] = self.area_poly;
        (a0 + c * (a1 + c * (a2 + c * a3))).max(0.0)
    }

    /// Drag acceleration at `pos`/`vel`.
    ///
    /// `spin_axis` rotates the atmosphere with the Earth; `body_axis` is the
    /// vehicle's longitudinal axis; `radius_ref` converts radius to altitude.
    pub fn accel(
        &self,
        pos: &Vector3<f64>,
        vel: &Vector3<f64>,
        spin_axis: &Vector3<f64>,
        body_axis: &Vector3<f64>,
        radius_ref: f64,
    ) -> Vector3<f64> {
        if self.mass <= 0.0 {
            return Vector3::zeros();
        }
        let rel = relative_velocity(pos, vel, spin_axis);
        let speed = rel.norm();
        if speed < 1e-6 {
            return Vector3::zeros();
        }
        let rho = atmosphere::density(pos.norm() - radius_ref);
        let cos_alpha = rel.dot(body_axis) / (speed * body_axis.norm().max(1e-12));
        let k = 0.5 * rho * self.cd * self.area(cos_alpha) / self.mass;
        -rel * (k * speed)
    }
}

/// Air-relative velocity for an atmosphere co-rotating with the Earth.
pub fn relative_velocity(pos: &Vector3<f64>, vel: &Vector3<f64>, spin_axis: &Vector3<f64>) -> Vector3<f64> {
    vel - (spin_axis * OMEGA_EARTH).cross(pos)
}

/// Quadratic drag force on the ascending vehicle (inertial frame).
pub fn drag_force(rel_vel: &Vector3<f64>, density: f64, cd: f64, area: f64) -> Vector3<f64> {
    let speed = rel_vel.norm();
    if speed > 1e-6 {
        let q_dyn = 0.5 * density * speed * speed;
        -rel_vel / speed * (q_dyn * cd * area)
    } else {
        Vector3::zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::gravity::R_EARTH_EQ;

    #[test]
    fn drag_opposes_relative_velocity() {
        let model = DragModel::default();
        let pos = Vector3::new(R_EARTH_EQ + 150_000.0, 0.0, 0.0);
        let vel = Vector3::new(0.0, 7800.0, 0.0);
        let a = model.accel(&pos, &vel, &Vector3::z(), &Vector3::y(), R_EARTH_EQ);
        assert!(a.y < 0.0);
        assert!(a.norm() < 1e-3, "orbital drag should be tiny, got {:e}", a.norm());
    }

    #[test]
    fn broadside_has_more_area_than_nose_first() {
        let model = DragModel::default();
        assert!(model.area(0.0) > model.area(1.0));
        assert!(model.area(1.0) > 0.0);
    }

    #[test]
    fn no_drag_when_corotating() {
        let pos = Vector3::new(R_EARTH_EQ, 0.0, 0.0);
        let vel = Vector3::z().cross(&pos) * OMEGA_EARTH;
        let rel = relative_velocity(&pos, &vel, &Vector3::z());
        assert!(rel.norm() < 1e-9);
        assert!(drag_force(&rel, 1.225, 0.5, 10.0).norm() < 1e-9);
    }
}
