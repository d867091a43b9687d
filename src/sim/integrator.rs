use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// Point-mass state and RK4 step
// ---------------------------------------------------------------------------

/// Translational state of the host vehicle in the platform frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointMass {
    pub pos: Vector3<f64>, // m
    pub vel: Vector3<f64>, // m/s
    pub mass: f64,         // kg
}

/// Time derivative of [`PointMass`], plus the non-gravitational
/// (accelerometer-sensed) part of the acceleration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deriv {
    pub dpos: Vector3<f64>,
    pub dvel: Vector3<f64>,
    pub dmass: f64,
    pub sensed: Vector3<f64>,
}

impl PointMass {
    pub fn apply(&self, d: &Deriv, dt: f64) -> Self {
        Self {
            pos: self.pos + d.dpos * dt,
            vel: self.vel + d.dvel * dt,
            mass: self.mass + d.dmass * dt,
        }
    }
}

/// Single RK4 step. Returns the new state and the sensed velocity
/// increment over the step.
pub fn rk4_step<F>(state: &PointMass, dt: f64, deriv: F) -> (PointMass, Vector3<f64>)
where
    F: Fn(&PointMass) -> Deriv,
{
    let k1 = deriv(state);
    let k2 = deriv(&state.apply(&k1, dt * 0.5));
    let k3 = deriv(&state.apply(&k2, dt * 0.5));
    let k4 = deriv(&state.apply(&k3, dt));

    let next = PointMass {
        pos: state.pos + (k1.dpos + 2.0 * k2.dpos + 2.0 * k3.dpos + k4.dpos) * (dt / 6.0),
        vel: state.vel + (k1.dvel + 2.0 * k2.dvel + 2.0 * k3.dvel + k4.dvel) * (dt / 6.0),
        mass: (state.mass + (k1.dmass + 2.0 * k2.dmass + 2.0 * k3.dmass + k4.dmass) * (dt / 6.0)).max(0.0),
    };
    let sensed = (k1.sensed + 2.0 * k2.sensed + 2.0 * k3.sensed + k4.sensed) * (dt / 6.0);
    (next, sensed)
}
