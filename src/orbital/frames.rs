use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::physics::gravity::OMEGA_EARTH;

// ---------------------------------------------------------------------------
// Platform (navigation) frame
// ---------------------------------------------------------------------------
//
// Earth-centred, inertially fixed at guidance reference release:
//   X  up through the launch site
//   Z  downrange along the flight azimuth (horizontal)
//   Y  completes the right-handed set (Z x X)

/// Launch-site geometry that fixes the platform frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaunchFrame {
    pub latitude: f64, // rad, geocentric
    pub radius: f64,   // m, launch-site radius
    pub azimuth: f64,  // rad, flight azimuth from north
}

impl LaunchFrame {
    /// Earth spin axis (north) in platform coordinates.
    pub fn spin_axis(&self) -> Vector3<f64> {
        let (sl, cl) = self.latitude.sin_cos();
        let (sa, ca) = self.azimuth.sin_cos();
        Vector3::new(sl, -cl * sa, cl * ca)
    }

    /// Equatorial unit vector under the launch meridian at release.
    pub fn meridian(&self) -> Vector3<f64> {
        let axis = self.spin_axis();
        (Vector3::x() - axis * self.latitude.sin()).normalize()
    }

    /// Equatorial unit vector 90 deg east of the launch meridian.
    pub fn equatorial_east(&self) -> Vector3<f64> {
        self.spin_axis().cross(&self.meridian())
    }

    /// Platform -> equatorial (meridian, east, north) rotation.
    pub fn to_equatorial(&self) -> Matrix3<f64> {
        Matrix3::from_rows(&[
            self.meridian().transpose(),
            self.equatorial_east().transpose(),
            self.spin_axis().transpose(),
        ])
    }

    pub fn launch_position(&self) -> Vector3<f64> {
        Vector3::new(self.radius, 0.0, 0.0)
    }

    /// Inertial velocity of the pad due to Earth rotation.
    pub fn launch_velocity(&self) -> Vector3<f64> {
        (self.spin_axis() * OMEGA_EARTH).cross(&self.launch_position())
    }

    /// Platform -> orbit-plane ("G") rotation for a target plane.
    ///
    /// Rows: descending-node direction, negative orbit normal, in-plane
    /// direction of motion at the node. The in-plane angle
    /// `atan2(z_G, x_G)` grows along the direction of flight.
    pub fn orbit_plane_matrix(&self, inclination: f64, descending_node: f64) -> Matrix3<f64> {
        let axis = self.spin_axis();
        let (sn, cn) = descending_node.sin_cos();
        let node = self.meridian() * cn + self.equatorial_east() * sn;
        let (si, ci) = inclination.sin_cos();
        let normal = axis * ci + axis.cross(&node) * si;
        let motion = normal.cross(&node);
        Matrix3::from_rows(&[node.transpose(), (-normal).transpose(), motion.transpose()])
    }

    /// Inclination and descending node of the plane through the launch site
    /// along the flight azimuth.
    pub fn plane_through_site(&self) -> (f64, f64) {
        let axis = self.spin_axis();
        let normal = Vector3::x().cross(&Vector3::z());
        let inclination = normal.dot(&axis).clamp(-1.0, 1.0).acos();
        let node = -axis.cross(&normal);
        let node = if node.norm() > 1e-12 { node.normalize() } else { self.meridian() };
        let descending_node = node.dot(&self.equatorial_east()).atan2(node.dot(&self.meridian()));
        (inclination, descending_node)
    }
}

/// Rotation about the G-frame y axis by the range angle: maps the point at
/// in-plane angle `phi` onto +x (radial) and the local downrange onto +z.
pub fn terminal_rotation(phi: f64) -> Matrix3<f64> {
    let (s, c) = phi.sin_cos();
    Matrix3::new(
        c, 0.0, s,
        0.0, 1.0, 0.0,
        -s, 0.0, c,
    )
}
