use crate::physics::G0;

// ---------------------------------------------------------------------------
// Physical stage (host side)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub name: String,
    pub dry_mass: f64,        // kg, including interstage dropped at separation
    pub propellant_mass: f64, // kg
    pub thrust: f64,          // N, all engines
    pub isp: f64,             // s
    pub engines: u32,
    pub cd: f64,
    pub area: f64,            // m^2
    /// Propellant fraction at which the depletion sensors trip.
    pub depletion_level: f64,
}

impl Stage {
    pub fn mass_flow(&self) -> f64 {
        self.thrust / (self.isp * G0)
    }

    pub fn exhaust_velocity(&self) -> f64 {
        self.isp * G0
    }

    pub fn total_mass(&self) -> f64 {
        self.dry_mass + self.propellant_mass
    }

    /// Self-consistent burn time from propellant and mass flow.
    pub fn burn_time(&self) -> f64 {
        if self.thrust > 0.0 {
            self.propellant_mass / self.mass_flow()
        } else {
            0.0
        }
    }

    pub fn delta_v(&self, payload_mass: f64) -> f64 {
        let m0 = self.total_mass() + payload_mass;
        let mf = self.dry_mass + payload_mass;
        self.exhaust_velocity() * (m0 / mf).ln()
    }

    /// Thrust with `out` engines failed.
    pub fn thrust_with_out(&self, out: u32) -> f64 {
        if self.engines == 0 {
            return 0.0;
        }
        self.thrust * f64::from(self.engines.saturating_sub(out)) / f64::from(self.engines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s_ivb() -> Stage {
        Stage {
            name: "S-IVB".into(),
            dry_mass: 32_000.0,
            propellant_mass: 105_000.0,
            thrust: 1_000_000.0,
            isp: 424.0,
            engines: 1,
            cd: 0.3,
            area: 33.0,
            depletion_level: 0.01,
        }
    }

    #[test]
    fn burn_time_matches_mass_flow() {
        let s = s_ivb();
        assert!((s.mass_flow() - 240.5).abs() < 0.2, "mdot {}", s.mass_flow());
        assert!((s.burn_time() * s.mass_flow() - s.propellant_mass).abs() < 1e-6);
    }

    #[test]
    fn delta_v_is_rocket_equation() {
        let s = s_ivb();
        let dv = s.delta_v(0.0);
        let expected = 424.0 * G0 * (137.0_f64 / 32.0).ln();
        assert!((dv - expected).abs() < 1e-6);
    }

    #[test]
    fn engine_out_scales_thrust() {
        let mut s = s_ivb();
        s.engines = 8;
        s.thrust = 8.0e6;
        assert!((s.thrust_with_out(1) - 7.0e6).abs() < 1e-6);
        assert_eq!(s.thrust_with_out(9), 0.0);
    }
}
