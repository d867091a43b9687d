use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// Earth constants
// ---------------------------------------------------------------------------

pub const G0: f64 = 9.80665; // standard gravity, m/s^2
pub const MU_EARTH: f64 = 3.986_004_418e14; // m^3/s^2
pub const R_EARTH_EQ: f64 = 6_378_137.0; // equatorial radius, m
pub const OMEGA_EARTH: f64 = 7.292_115_9e-5; // sidereal rotation rate, rad/s

pub const J2_EARTH: f64 = 1.082_626_68e-3;
pub const J3_EARTH: f64 = -2.532_656_5e-6;
pub const J4_EARTH: f64 = -1.619_621_6e-6;

// ---------------------------------------------------------------------------
// Oblate-earth gravity (zonal harmonics J2..J4)
// ---------------------------------------------------------------------------

/// Zonal-harmonic gravity about an arbitrary spin axis.
///
/// Navigation runs in the platform frame, where the Earth's spin axis is
/// generally not a coordinate axis, so the harmonics are evaluated from the
/// along-axis and equatorial parts of the position instead of its z
/// component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZonalGravity {
    pub mu: f64,
    pub radius: f64,
    pub j2: f64,
    pub j3: f64,
    pub j4: f64,
    /// Unit spin axis (north) in the frame positions are given in.
    pub axis: Vector3<f64>,
}

impl ZonalGravity {
    /// Earth model with the spin axis expressed in the caller's frame.
    pub fn earth(axis: Vector3<f64>) -> Self {
        Self {
            mu: MU_EARTH,
            radius: R_EARTH_EQ,
            j2: J2_EARTH,
            j3: J3_EARTH,
            j4: J4_EARTH,
            axis: axis.normalize(),
        }
    }

    /// Point-mass plus J2 only.
    pub fn j2_only(axis: Vector3<f64>) -> Self {
        Self { j3: 0.0, j4: 0.0, ..Self::earth(axis) }
    }

    /// Gravitational acceleration at `pos` (m/s^2).
    pub fn accel(&self, pos: &Vector3<f64>) -> Vector3<f64> {
        let r = pos.norm();
        if r < 1.0 {
            return Vector3::zeros();
        }
        let z = pos.dot(&self.axis);
        let equatorial = pos - self.axis * z;

        let mu_r3 = self.mu / (r * r * r);
        let k = self.radius / r;
        let k2 = k * k;
        let s = z / r; // sine of geocentric latitude
        let s2 = s * s;

        // Factor on the equatorial component, and full along-axis component.
        let mut f_eq = -mu_r3 * (1.0 - 1.5 * self.j2 * k2 * (5.0 * s2 - 1.0));
        let mut a_axis = -mu_r3 * z * (1.0 - 1.5 * self.j2 * k2 * (5.0 * s2 - 3.0));

        f_eq -= 2.5 * self.j3 * mu_r3 * k2 * k * (3.0 * s - 7.0 * s2 * s);
        a_axis -= 2.5 * self.j3 * mu_r3 * k2 * k * r * (6.0 * s2 - 7.0 * s2 * s2 - 0.6);

        f_eq += 1.875 * self.j4 * mu_r3 * k2 * k2 * (1.0 - 14.0 * s2 + 21.0 * s2 * s2);
        a_axis += 1.875 * self.j4 * mu_r3 * k2 * k2 * z * (5.0 - 70.0 / 3.0 * s2 + 21.0 * s2 * s2);

        equatorial * f_eq + self.axis * a_axis
    }
}

/// Point-mass gravity (no harmonics).
pub fn gravity_pointmass(pos: &Vector3<f64>) -> Vector3<f64> {
    let r = pos.norm();
    if r < 1.0 {
        return Vector3::zeros();
    }
    -MU_EARTH / (r * r * r) * pos
}
