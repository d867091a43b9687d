use serde::{Deserialize, Serialize};

use crate::orbital::LaunchFrame;
use crate::physics::MU_EARTH;

// ---------------------------------------------------------------------------
// Target conic
// ---------------------------------------------------------------------------

/// Terminal conic plus orbit plane the IGM steers to.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetConic {
    pub inclination: f64,       // rad
    pub descending_node: f64,   // rad, east of the launch meridian at release
    pub eccentricity: f64,
    pub semi_latus_rectum: f64, // m
    pub alpha_d: f64,           // rad, descending node to perigee along the plane
    /// Desired true anomaly at cutoff. When set, `alpha_d` is solved on the
    /// first guidance pass and this is cleared.
    pub cutoff_anomaly: Option<f64>,
}

/// Terminal radius, speed and flight-path angle at true anomaly `f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConicPoint {
    pub radius: f64,
    pub speed: f64,
    pub flight_path: f64,
    pub gravity: f64, // m/s^2, radial, negative inward
}

impl TargetConic {
    /// Build from energy and eccentricity: `p = mu (e^2 - 1) / C3`.
    pub fn from_c3(inclination: f64, descending_node: f64, c3: f64, eccentricity: f64) -> Option<Self> {
        let p = MU_EARTH * (eccentricity * eccentricity - 1.0) / c3;
        (p.is_finite() && p > 0.0).then_some(Self {
            inclination,
            descending_node,
            eccentricity,
            semi_latus_rectum: p,
            alpha_d: 0.0,
            cutoff_anomaly: None,
        })
    }

    /// Characteristic energy of the conic.
    pub fn c3(&self) -> f64 {
        MU_EARTH * (self.eccentricity * self.eccentricity - 1.0) / self.semi_latus_rectum
    }

    pub fn point(&self, true_anomaly: f64) -> Option<ConicPoint> {
        let e = self.eccentricity;
        let p = self.semi_latus_rectum;
        let (sf, cf) = true_anomaly.sin_cos();
        let den = 1.0 + e * cf;
        if !(den > 1e-9 && p > 0.0) {
            return None;
        }
        let radius = p / den;
        let speed = (MU_EARTH / p).sqrt() * (1.0 + 2.0 * e * cf + e * e).sqrt();
        Some(ConicPoint {
            radius,
            speed,
            flight_path: (e * sf / den).atan(),
            gravity: -MU_EARTH / (radius * radius),
        })
    }
}

// ---------------------------------------------------------------------------
// Orbit insertion target
// ---------------------------------------------------------------------------

/// Insertion target. Plane defaults to the one through the launch site;
/// inclination and node may drift linearly with launch-window time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitTarget {
    pub inclination: Option<f64>,
    pub descending_node: Option<f64>,
    pub inclination_rate: f64, // rad/s of window time
    pub node_rate: f64,        // rad/s of window time
    pub window_time: f64,      // s after window opening at liftoff
    pub semi_latus_rectum: f64,
    pub eccentricity: f64,
    pub alpha_d: f64,
}

impl OrbitTarget {
    pub fn conic(&self, frame: &LaunchFrame) -> TargetConic {
        let (site_inc, site_node) = frame.plane_through_site();
        let inclination = self.inclination.unwrap_or(site_inc) + self.inclination_rate * self.window_time;
        let descending_node = self.descending_node.unwrap_or(site_node) + self.node_rate * self.window_time;
        TargetConic {
            inclination,
            descending_node,
            eccentricity: self.eccentricity,
            semi_latus_rectum: self.semi_latus_rectum,
            alpha_d: self.alpha_d,
            cutoff_anomaly: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Restart (translunar injection) targeting
// ---------------------------------------------------------------------------

/// One injection opportunity: targets tabulated against launch-window time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TliOpportunity {
    pub restart_time: f64, // s, parking-orbit phase clock at restart sequence start
    pub window_time: Vec<f64>,
    pub inclination: Vec<f64>,
    pub descending_node: Vec<f64>,
    pub c3: Vec<f64>,
    pub eccentricity: Vec<f64>,
    pub cutoff_anomaly: Vec<f64>,
}

impl TliOpportunity {
    pub fn is_consistent(&self) -> bool {
        let n = self.window_time.len();
        n > 0
            && [&self.inclination, &self.descending_node, &self.c3, &self.eccentricity, &self.cutoff_anomaly]
                .iter()
                .all(|col| col.len() == n)
            && self.window_time.windows(2).all(|w| w[0] < w[1])
    }

    pub fn target_at(&self, window_time: f64) -> Option<TargetConic> {
        let col = |c: &[f64]| interpolate(&self.window_time, c, window_time);
        let mut conic = TargetConic::from_c3(
            col(&self.inclination)?,
            col(&self.descending_node)?,
            col(&self.c3)?,
            col(&self.eccentricity)?,
        )?;
        conic.cutoff_anomaly = Some(col(&self.cutoff_anomaly)?);
        Some(conic)
    }
}

/// Ground-uplinked restart target that overrides the table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetUpdate {
    pub inclination: f64,
    pub descending_node: f64,
    pub c3: f64,
    pub eccentricity: f64,
    pub cutoff_anomaly: f64,
    pub restart_time: f64,
}

impl TargetUpdate {
    pub fn conic(&self) -> Option<TargetConic> {
        let mut conic = TargetConic::from_c3(self.inclination, self.descending_node, self.c3, self.eccentricity)?;
        conic.cutoff_anomaly = Some(self.cutoff_anomaly);
        Some(conic)
    }
}

/// Where a restart target came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    Table,
    DirectUpdate,
}

impl TargetSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetSource::Table => "opportunity table",
            TargetSource::DirectUpdate => "direct update",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestartSelection {
    pub conic: TargetConic,
    pub restart_time: f64,
    pub source: TargetSource,
    /// Direct update that was passed over because it has no valid conic.
    pub rejected_update: Option<TargetUpdate>,
}

/// Restart precalculation: a direct update wins over the table.
pub fn select_restart(
    opportunities: &[TliOpportunity],
    index: usize,
    window_time: f64,
    update: Option<&TargetUpdate>,
) -> Option<RestartSelection> {
    if let Some(u) = update {
        if let Some(conic) = u.conic() {
            return Some(RestartSelection {
                conic,
                restart_time: u.restart_time,
                source: TargetSource::DirectUpdate,
                rejected_update: None,
            });
        }
    }
    let opp = opportunities.get(index)?;
    Some(RestartSelection {
        conic: opp.target_at(window_time)?,
        restart_time: opp.restart_time,
        source: TargetSource::Table,
        rejected_update: update.copied(),
    })
}

/// Piecewise-linear interpolation, clamped at the table ends.
pub fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    if xs.is_empty() || xs.len() != ys.len() {
        return None;
    }
    if x <= xs[0] {
        return Some(ys[0]);
    }
    let last = xs.len() - 1;
    if x >= xs[last] {
        return Some(ys[last]);
    }
    let i = xs.windows(2).position(|w| x >= w[0] && x < w[1])?;
    let f = (x - xs[i]) / (xs[i + 1] - xs[i]);
    Some(ys[i] + f * (ys[i + 1] - ys[i]))
}
