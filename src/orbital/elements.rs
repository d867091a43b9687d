use nalgebra::Vector3;

use super::frames::LaunchFrame;
use crate::physics::gravity::{MU_EARTH, R_EARTH_EQ};

/// Osculating orbit of the vehicle, referred to the equator.
#[derive(Debug, Clone, Copy)]
pub struct OrbitElements {
    pub sma: f64,       // semi-major axis, m (negative for hyperbolic)
    pub ecc: f64,       // eccentricity
    pub inc: f64,       // inclination, rad
    pub node: f64,      // ascending node east of the launch meridian at release, rad
    pub argp: f64,      // argument of perigee, rad
    pub true_anom: f64, // true anomaly, rad
    pub c3: f64,        // twice the specific energy, m^2/s^2
}

impl OrbitElements {
    /// Elements from a platform-frame state vector.
    pub fn from_platform(pos: &Vector3<f64>, vel: &Vector3<f64>, frame: &LaunchFrame) -> Self {
        let m = frame.to_equatorial();
        Self::from_state_vector_mu(&(m * pos), &(m * vel), MU_EARTH)
    }

    /// Elements from an equatorial state vector (z = north pole).
    pub fn from_state_vector_mu(pos: &Vector3<f64>, vel: &Vector3<f64>, mu: f64) -> Self {
        let two_pi = 2.0 * std::f64::consts::PI;
        let r = pos.norm();
        let v = vel.norm();

        let h = pos.cross(vel);
        let h_mag = h.norm();

        // Node vector
        let n = Vector3::new(-h.y, h.x, 0.0);
        let n_mag = n.norm();

        let e_vec = ((v * v - mu / r) * pos - pos.dot(vel) * vel) / mu;
        let ecc = e_vec.norm();

        let c3 = v * v - 2.0 * mu / r;
        let sma = if c3.abs() > 1e-9 { -mu / c3 } else { f64::INFINITY };

        let inc = (h.z / h_mag).clamp(-1.0, 1.0).acos();

        let node = if n_mag > 1e-10 {
            let w = (n.x / n_mag).clamp(-1.0, 1.0).acos();
            if n.y < 0.0 { two_pi - w } else { w }
        } else {
            0.0
        };

        let argp = if n_mag > 1e-10 && ecc > 1e-10 {
            let w = (n.dot(&e_vec) / (n_mag * ecc)).clamp(-1.0, 1.0).acos();
            if e_vec.z < 0.0 { two_pi - w } else { w }
        } else {
            0.0
        };

        let true_anom = if ecc > 1e-10 {
            let nu = (e_vec.dot(pos) / (ecc * r)).clamp(-1.0, 1.0).acos();
            if pos.dot(vel) < 0.0 { two_pi - nu } else { nu }
        } else {
            0.0
        };

        OrbitElements { sma, ecc, inc, node, argp, true_anom, c3 }
    }

    /// Perigee altitude above the equatorial radius, m.
    pub fn perigee_altitude(&self) -> f64 {
        self.sma * (1.0 - self.ecc) - R_EARTH_EQ
    }

    /// Apogee altitude, m. Infinite for open orbits.
    pub fn apogee_altitude(&self) -> f64 {
        if self.ecc >= 1.0 {
            f64::INFINITY
        } else {
            self.sma * (1.0 + self.ecc) - R_EARTH_EQ
        }
    }

    /// Orbital period for closed orbits, s.
    pub fn period(&self) -> Option<f64> {
        (self.sma > 0.0 && self.ecc < 1.0)
            .then(|| 2.0 * std::f64::consts::PI * (self.sma.powi(3) / MU_EARTH).sqrt())
    }
}
