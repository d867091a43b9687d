use nalgebra::Vector3;

use crate::error::GuidanceFault;
use crate::orbital::LaunchFrame;
use crate::physics::{DragModel, ZonalGravity};

// ---------------------------------------------------------------------------
// Navigation state
// ---------------------------------------------------------------------------

/// Platform-frame navigation solution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavState {
    pub position: Vector3<f64>, // m
    pub velocity: Vector3<f64>, // m/s
    pub gravity: Vector3<f64>,  // m/s^2 at `position`
    /// Sensed velocity increment of the last navigation cycle.
    pub delta_v: Vector3<f64>,
    /// Platform increments accumulated since the last cycle.
    pub pending_dv: Vector3<f64>,
    pub sensed_accel: f64, // m/s^2, |dV| / dt of the last cycle
}

impl NavState {
    pub fn accumulate(&mut self, dv: &Vector3<f64>) {
        self.pending_dv += dv;
    }

    pub fn take_pending(&mut self) -> Vector3<f64> {
        std::mem::take(&mut self.pending_dv)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavMode {
    /// Accelerometer-driven, trapezoidal gravity.
    Powered,
    /// Coasting, gravity plus modelled drag.
    Orbital,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavOutput {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub sensed_accel: f64,
}

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

/// Environment model used by the navigation equations.
#[derive(Debug, Clone, PartialEq)]
pub struct Navigator {
    pub gravity: ZonalGravity,
    pub drag: DragModel,
    pub spin_axis: Vector3<f64>,
    pub radius_ref: f64,
    pub substeps: usize,
}

impl Navigator {
    pub fn new(frame: &LaunchFrame, drag: DragModel, substeps: usize) -> Self {
        let spin_axis = frame.spin_axis();
        Self {
            gravity: ZonalGravity::earth(spin_axis),
            drag,
            spin_axis,
            radius_ref: crate::physics::R_EARTH_EQ,
            substeps: substeps.max(1),
        }
    }

    /// Initial state on the pad at reference release.
    pub fn initial_state(&self, frame: &LaunchFrame) -> NavState {
        let position = frame.launch_position();
        NavState {
            position,
            velocity: frame.launch_velocity(),
            gravity: self.gravity.accel(&position),
            ..Default::default()
        }
    }

    /// Advance the navigation solution by one cycle.
    ///
    /// A zero-length cycle leaves the state untouched. A non-finite result
    /// is rejected and the state keeps its previous value.
    pub fn integrate(
        &self,
        nav: &mut NavState,
        mode: NavMode,
        dt: f64,
        delta_v: Vector3<f64>,
        body_axis: &Vector3<f64>,
    ) -> Result<NavOutput, GuidanceFault> {
        if !(dt > 0.0) {
            return Ok(NavOutput { position: nav.position, velocity: nav.velocity, sensed_accel: nav.sensed_accel });
        }
        let (r1, v1, g1) = match mode {
            NavMode::Powered => self.powered(nav, dt, &delta_v),
            NavMode::Orbital => self.orbital(nav, dt, body_axis),
        };
        let fm = delta_v.norm() / dt;
        let finite = r1.iter().chain(v1.iter()).chain(g1.iter()).all(|x| x.is_finite()) && fm.is_finite();
        if !finite {
            return Err(GuidanceFault::NonFinite { stage: "navigation" });
        }
        nav.position = r1;
        nav.velocity = v1;
        nav.gravity = g1;
        nav.delta_v = delta_v;
        nav.sensed_accel = fm;
        Ok(NavOutput { position: r1, velocity: v1, sensed_accel: fm })
    }

    fn powered(
        &self,
        nav: &NavState,
        dt: f64,
        dv: &Vector3<f64>,
    ) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let g0 = nav.gravity;
        let r1 = nav.position + (nav.velocity + dv * 0.5 + g0 * (0.5 * dt)) * dt;
        let g1 = self.gravity.accel(&r1);
        let v1 = nav.velocity + dv + (g0 + g1) * (0.5 * dt);
        (r1, v1, g1)
    }

    fn orbital(
        &self,
        nav: &NavState,
        dt: f64,
        body_axis: &Vector3<f64>,
    ) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let h = dt / self.substeps as f64;
        let mut r = nav.position;
        let mut v = nav.velocity;
        for _ in 0..self.substeps {
            let a0 = self.accel(&r, &v, body_axis);
            // midpoint predictor
            let rm = r + v * (0.5 * h) + a0 * (0.125 * h * h);
            let vm = v + a0 * (0.5 * h);
            let am = self.accel(&rm, &vm, body_axis);
            // end-point predictor
            let re = r + v * h + am * (0.5 * h * h);
            let ve = v + am * h;
            let a1 = self.accel(&re, &ve, body_axis);

            let v1 = v + (a0 + am * 4.0 + a1) * (h / 6.0);
            let r1 = r + v * h + (a0 + am * 2.0) * (h * h / 6.0);
            r = r1;
            v = v1;
        }
        let g = self.gravity.accel(&r);
        (r, v, g)
    }

    fn accel(&self, r: &Vector3<f64>, v: &Vector3<f64>, body_axis: &Vector3<f64>) -> Vector3<f64> {
        self.gravity.accel(r) + self.drag.accel(r, v, &self.spin_axis, body_axis, self.radius_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame() -> LaunchFrame {
        LaunchFrame { latitude: 28.608_f64.to_radians(), radius: 6_373_338.0, azimuth: 72.0_f64.to_radians() }
    }

    fn navigator() -> Navigator {
        Navigator::new(&frame(), DragModel::default(), 4)
    }

    #[test]
    fn zero_dt_is_idempotent() {
        let nav = navigator();
        let mut st = nav.initial_state(&frame());
        st.velocity += Vector3::new(1.0, 2.0, 3.0);
        let before = st.clone();
        for mode in [NavMode::Powered, NavMode::Orbital] {
            nav.integrate(&mut st, mode, 0.0, Vector3::new(5.0, 0.0, 0.0), &Vector3::x()).unwrap();
            assert_eq!(st.position, before.position);
            assert_eq!(st.velocity, before.velocity);
            assert_eq!(st.gravity, before.gravity);
        }
    }

    #[test]
    fn powered_step_with_thrust_balancing_gravity_holds_position() {
        let nav = navigator();
        let mut st = NavState::default();
        st.position = Vector3::new(6.4e6, 0.0, 0.0);
        st.gravity = nav.gravity.accel(&st.position);
        let dt = 2.0;
        let dv = -st.gravity * dt;
        nav.integrate(&mut st, NavMode::Powered, dt, dv, &Vector3::x()).unwrap();
        assert!(st.position.x > 6.4e6 - 1e-3 && st.position.x < 6.4e6 + 1e-3, "x {}", st.position.x);
        assert!(st.velocity.norm() < 1e-6);
        assert_relative_eq!(st.sensed_accel, dv.norm() / dt);
    }

    #[test]
    fn orbital_mode_conserves_energy_above_atmosphere() {
        let mut nav = navigator();
        nav.drag.mass = 0.0;
        let r = 7.0e6;
        let mut st = NavState {
            position: Vector3::new(r, 0.0, 0.0),
            velocity: Vector3::new(0.0, 0.0, (crate::physics::MU_EARTH / r).sqrt()),
            ..Default::default()
        };
        st.gravity = nav.gravity.accel(&st.position);
        let energy = |s: &NavState| 0.5 * s.velocity.norm_squared() - crate::physics::MU_EARTH / s.position.norm();
        let e0 = energy(&st);
        for _ in 0..100 {
            nav.integrate(&mut st, NavMode::Orbital, 8.0, Vector3::zeros(), &Vector3::z()).unwrap();
        }
        // J2 makes the point-mass energy oscillate slightly
        assert!(((energy(&st) - e0) / e0).abs() < 5e-3, "energy drift");
        assert!((st.position.norm() - r).abs() < 30_000.0);
    }

    #[test]
    fn drag_slows_low_orbit() {
        let nav = navigator();
        let r = crate::physics::R_EARTH_EQ + 150_000.0;
        let frame = frame();
        let pos = frame.spin_axis().cross(&Vector3::y()).normalize() * r;
        let make = || NavState {
            position: pos,
            velocity: frame.spin_axis().cross(&pos).normalize() * (crate::physics::MU_EARTH / r).sqrt(),
            gravity: nav.gravity.accel(&pos),
            ..Default::default()
        };
        let mut with_drag = make();
        let mut vacuum = make();
        let mut vacuum_nav = nav.clone();
        vacuum_nav.drag.mass = 0.0;
        for _ in 0..10 {
            nav.integrate(&mut with_drag, NavMode::Orbital, 8.0, Vector3::zeros(), &Vector3::z()).unwrap();
            vacuum_nav.integrate(&mut vacuum, NavMode::Orbital, 8.0, Vector3::zeros(), &Vector3::z()).unwrap();
        }
        assert!(with_drag.velocity.norm() < vacuum.velocity.norm());
    }

    #[test]
    fn non_finite_result_is_rejected_and_state_kept() {
        let nav = navigator();
        let mut st = nav.initial_state(&frame());
        let before = st.clone();
        let err = nav
            .integrate(&mut st, NavMode::Powered, 2.0, Vector3::new(f64::NAN, 0.0, 0.0), &Vector3::x())
            .unwrap_err();
        assert_eq!(err, GuidanceFault::NonFinite { stage: "navigation" });
        assert_eq!(st, before);
    }

    #[test]
    fn pending_increments_accumulate() {
        let mut st = NavState::default();
        st.accumulate(&Vector3::new(1.0, 0.0, 0.0));
        st.accumulate(&Vector3::new(0.5, 2.0, 0.0));
        assert_eq!(st.take_pending(), Vector3::new(1.5, 2.0, 0.0));
        assert_eq!(st.pending_dv, Vector3::zeros());
    }
}
