use std::path::Path;

use serde::{Deserialize, Serialize};

use super::VehicleKind;
use crate::error::{ConfigError, LoadError};
use crate::guidance::attitude::AttitudeLimits;
use crate::guidance::pitch_program::{EngineOutModel, PitchProgram, PitchSegment};
use crate::guidance::targeting::{OrbitTarget, TliOpportunity};
use crate::orbital::LaunchFrame;
use crate::physics::DragModel;
use crate::timebase::Timebase;

// ---------------------------------------------------------------------------
// Guidance-side vehicle description
// ---------------------------------------------------------------------------

/// One burn arc as the IGM models it (not the physical stage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnArcConfig {
    pub name: String,
    pub stage: usize,        // vehicle stage number, 1-based
    pub exhaust_velocity: f64, // m/s
    pub tau: f64,            // s, mass / mass-flow at arc start
    pub burn_time: f64,      // s, nominal remaining time when IGM starts
    pub burnout_tau: f64,    // s, tau left at nominal burnout
    pub mass_flow: f64,      // kg/s
    pub engines: u32,
    #[serde(default)]
    pub coast_before: f64,   // s, unpowered gap before this arc
    /// Phase clock at which remaining time moves to the next arc
    /// (mixture-ratio shift).
    #[serde(default)]
    pub transfer_at: Option<f64>,
}

/// Time-to-go thresholds and telemetry limits for the IGM.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IgmConfig {
    pub terminal_freeze: f64,   // s, hold terminal conditions below this T_go
    pub chi_bar: f64,           // s, freeze steering and enter the high-speed loop
    pub velocity_bias: f64,     // m/s, thrust-decay allowance at cutoff
    pub min_sensed_accel: f64,  // m/s^2, below this tau is extrapolated
    pub settle_time: f64,       // s, artificial tau after ignition or engine out
}

/// Guidance and navigation cycle periods.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CyclePeriods {
    pub powered: f64,          // s
    pub orbital: f64,          // s
    pub orbital_substeps: usize,
}

/// Phase-clock thresholds used by the transition guards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseBounds {
    pub tb1_min: f64,         // earliest first-stage depletion cutoff
    pub tb2_min: f64,         // earliest staging
    pub tb3_min: f64,         // earliest second-stage depletion (two upper stages)
    pub igm_start_tb3: f64,
    pub igm_start_tb4: f64,
    pub tb6_ignition: f64,    // restart ignition, ends excursion eligibility
    pub igm_start_tb6: f64,
    pub roll_start: f64,      // TB1 clock when the roll program starts
    pub terminal_bound: f64,  // coast terminal phases end here
    pub abort_bound: f64,
    /// Phase clock after an upper-stage cutoff until which navigation
    /// keeps integrating sensed velocity (thrust tail-off).
    #[serde(default = "default_cutoff_nav_hold")]
    pub cutoff_nav_hold: f64,
}

fn default_cutoff_nav_hold() -> f64 {
    10.0
}

/// Complete guidance-computer configuration for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleConfig {
    pub name: String,
    pub kind: VehicleKind,
    /// Built-in table name or a path to a table file.
    pub command_table: String,
    pub launch: LaunchFrame,
    pub pad_azimuth: f64, // rad, vehicle roll reference on the pad
    pub flight_roll: f64, // rad, roll held in steered flight
    pub cycles: CyclePeriods,
    pub phases: PhaseBounds,
    pub pitch_program: PitchProgram,
    pub engine_out: EngineOutModel,
    pub arcs: Vec<BurnArcConfig>,
    #[serde(default)]
    pub restart_arc: Option<BurnArcConfig>,
    pub igm: IgmConfig,
    pub target: OrbitTarget,
    #[serde(default)]
    pub tli: Vec<TliOpportunity>,
    pub attitude: AttitudeLimits,
    pub drag: DragModel,
}

impl VehicleConfig {
    pub fn preset(kind: VehicleKind) -> Self {
        match kind {
            VehicleKind::SaturnIb => Self::saturn_ib(),
            VehicleKind::SaturnV => Self::saturn_v(),
        }
    }

    /// Load a JSON configuration and validate it.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arcs.is_empty() {
            return Err(ConfigError::NoBurnArcs);
        }
        for (i, arc) in self.arcs.iter().chain(self.restart_arc.iter()).enumerate() {
            if !(arc.exhaust_velocity > 0.0) {
                return Err(ConfigError::ExhaustVelocity(i));
            }
            if !(arc.mass_flow > 0.0) {
                return Err(ConfigError::MassFlow(i));
            }
        }
        if !(self.cycles.powered > 0.0) {
            return Err(ConfigError::CyclePeriod("powered"));
        }
        if !(self.cycles.orbital > 0.0) || self.cycles.orbital_substeps == 0 {
            return Err(ConfigError::CyclePeriod("orbital"));
        }
        if self.igm.chi_bar >= self.igm.terminal_freeze {
            return Err(ConfigError::Thresholds {
                chi_bar: self.igm.chi_bar,
                freeze: self.igm.terminal_freeze,
            });
        }
        if self.restart_capable() && self.restart_arc.is_none() {
            return Err(ConfigError::MissingRestartArc);
        }
        for (i, opp) in self.tli.iter().enumerate() {
            if !opp.is_consistent() {
                return Err(ConfigError::OpportunityTable(i));
            }
        }
        Ok(())
    }

    pub fn upper_stages(&self) -> usize {
        match self.kind {
            VehicleKind::SaturnIb => 1,
            VehicleKind::SaturnV => 2,
        }
    }

    pub fn restart_capable(&self) -> bool {
        !self.tli.is_empty()
    }

    /// Vehicle stage flying in a phase. `None` keeps the current one.
    pub fn stage_for(&self, phase: Timebase) -> Option<usize> {
        match phase {
            Timebase::PreLaunch
            | Timebase::ReferenceReleased
            | Timebase::Tb1
            | Timebase::Tb2 => Some(1),
            Timebase::Tb3 => Some(2),
            Timebase::Tb4 => Some(self.upper_stages() + 1),
            Timebase::Tb5
            | Timebase::Tb6
            | Timebase::Tb6a
            | Timebase::Tb6b
            | Timebase::Tb7
            | Timebase::Tb8 => Some(3),
            Timebase::Abort | Timebase::Complete => None,
        }
    }

    /// Phases where the IGM steers once the phase clock passes the start time.
    pub fn igm_start(&self, phase: Timebase) -> Option<f64> {
        match phase {
            Timebase::Tb3 => Some(self.phases.igm_start_tb3),
            Timebase::Tb4 if self.upper_stages() == 2 => Some(self.phases.igm_start_tb4),
            Timebase::Tb6 if self.restart_capable() => Some(self.phases.igm_start_tb6),
            _ => None,
        }
    }

    /// Phases flown under thrust.
    pub fn powered_flight(&self, phase: Timebase, clock: f64) -> bool {
        match phase {
            Timebase::ReferenceReleased
            | Timebase::Tb1
            | Timebase::Tb2
            | Timebase::Tb3
            | Timebase::Abort => true,
            Timebase::Tb4 => self.upper_stages() == 2,
            Timebase::Tb6 => clock >= self.phases.tb6_ignition,
            _ => false,
        }
    }

    /// Phases entered at an upper-stage cutoff.
    pub fn follows_cutoff(&self, phase: Timebase) -> bool {
        match phase {
            Timebase::Tb4 => self.upper_stages() == 1,
            Timebase::Tb5 | Timebase::Tb7 => true,
            _ => false,
        }
    }

    /// Navigation integrates accelerometer increments (powered mode) in
    /// powered flight and for a short hold after each cutoff, so the
    /// velocity sensed between the last powered cycle and cutoff is kept.
    pub fn sensed_navigation(&self, phase: Timebase, clock: f64) -> bool {
        self.powered_flight(phase, clock)
            || (self.follows_cutoff(phase) && clock < self.phases.cutoff_nav_hold)
    }

    /// Initial roll offset the roll program has to remove.
    pub fn roll_offset(&self) -> f64 {
        crate::guidance::attitude::wrap_angle(self.pad_azimuth - self.launch.azimuth)
    }
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

fn kennedy(azimuth_deg: f64) -> LaunchFrame {
    LaunchFrame {
        latitude: 28.608_f64.to_radians(),
        radius: 6_373_338.0,
        azimuth: azimuth_deg.to_radians(),
    }
}

fn default_attitude() -> AttitudeLimits {
    AttitudeLimits {
        rate: [1.0_f64.to_radians(); 3],
        error: [
            3.0_f64.to_radians(),
            5.0_f64.to_radians(),
            5.0_f64.to_radians(),
        ],
    }
}

impl VehicleConfig {
    /// Two-stage Saturn IB: S-IB then S-IVB to a 185 km circular orbit.
    pub fn saturn_ib() -> Self {
        Self {
            name: "Saturn IB".into(),
            kind: VehicleKind::SaturnIb,
            command_table: "saturn_ib".into(),
            launch: kennedy(72.0),
            pad_azimuth: 100.0_f64.to_radians(),
            flight_roll: 0.0,
            cycles: CyclePeriods {
                powered: 1.7,
                orbital: 8.0,
                orbital_substeps: 4,
            },
            phases: PhaseBounds {
                tb1_min: 130.0,
                tb2_min: 3.0,
                tb3_min: 0.0,
                igm_start_tb3: 25.0,
                igm_start_tb4: 0.0,
                tb6_ignition: 0.0,
                igm_start_tb6: 0.0,
                roll_start: 10.0,
                terminal_bound: 6000.0,
                abort_bound: 60.0,
                cutoff_nav_hold: 10.0,
            },
            pitch_program: PitchProgram {
                vertical_until: 10.0,
                segments: vec![PitchSegment {
                    start: 10.0,
                    end: 134.4,
                    coeffs: vec![0.0, 0.75, -0.002_6],
                }],
                tilt_arrest: 134.4,
            },
            engine_out: EngineOutModel {
                knee: 42.0,
                b11: -0.62,
                b12: 40.9,
                b21: -0.3611,
                b22: 29.25,
            },
            arcs: vec![BurnArcConfig {
                name: "S-IVB".into(),
                stage: 2,
                exhaust_velocity: 4158.0,
                tau: 521.0,
                burn_time: 411.0,
                burnout_tau: 110.0,
                mass_flow: 240.5,
                engines: 1,
                coast_before: 0.0,
                transfer_at: None,
            }],
            restart_arc: None,
            igm: IgmConfig {
                terminal_freeze: 35.0,
                chi_bar: 15.0,
                velocity_bias: 1.8,
                min_sensed_accel: 0.5,
                settle_time: 10.0,
            },
            target: OrbitTarget {
                inclination: None,
                descending_node: None,
                inclination_rate: 0.0,
                node_rate: 0.0,
                window_time: 0.0,
                semi_latus_rectum: 6_563_366.0,
                eccentricity: 0.0,
                alpha_d: 0.0,
            },
            tli: Vec::new(),
            attitude: default_attitude(),
            drag: DragModel::default(),
        }
    }

    /// Three-stage Saturn V with mixture-ratio shift, parking orbit and two
    /// translunar-injection opportunities.
    pub fn saturn_v() -> Self {
        let tli = |restart_time: f64, node0: f64, node1: f64| TliOpportunity {
            restart_time,
            window_time: vec![0.0, 8_100.0, 16_200.0],
            inclination: vec![
                31.38_f64.to_radians(),
                31.62_f64.to_radians(),
                31.90_f64.to_radians(),
            ],
            descending_node: vec![
                node0.to_radians(),
                (0.5 * (node0 + node1)).to_radians(),
                node1.to_radians(),
            ],
            c3: vec![-1.46e6, -1.45e6, -1.44e6],
            eccentricity: vec![0.976, 0.976, 0.977],
            cutoff_anomaly: vec![0.25, 0.25, 0.26],
        };
        Self {
            name: "Saturn V".into(),
            kind: VehicleKind::SaturnV,
            command_table: "saturn_v".into(),
            launch: kennedy(72.0),
            pad_azimuth: 90.0_f64.to_radians(),
            flight_roll: 0.0,
            cycles: CyclePeriods {
                powered: 2.0,
                orbital: 8.0,
                orbital_substeps: 4,
            },
            phases: PhaseBounds {
                tb1_min: 150.0,
                tb2_min: 1.0,
                tb3_min: 300.0,
                igm_start_tb3: 38.0,
                igm_start_tb4: 5.0,
                tb6_ignition: 577.6,
                igm_start_tb6: 585.0,
                roll_start: 13.0,
                terminal_bound: 15_000.0,
                abort_bound: 60.0,
                cutoff_nav_hold: 10.0,
            },
            pitch_program: PitchProgram {
                vertical_until: 13.0,
                segments: vec![PitchSegment {
                    start: 13.0,
                    end: 160.0,
                    coeffs: vec![0.0, 0.80, -0.002_4],
                }],
                tilt_arrest: 160.0,
            },
            engine_out: EngineOutModel {
                knee: 42.0,
                b11: -0.62,
                b12: 40.9,
                b21: -0.3611,
                b22: 29.25,
            },
            arcs: vec![
                BurnArcConfig {
                    name: "S-II high MR".into(),
                    stage: 2,
                    exhaust_velocity: 4169.0,
                    tau: 510.0,
                    burn_time: 252.0,
                    burnout_tau: 258.0,
                    mass_flow: 1230.0,
                    engines: 5,
                    coast_before: 0.0,
                    transfer_at: Some(290.0),
                },
                BurnArcConfig {
                    name: "S-II low MR".into(),
                    stage: 2,
                    exhaust_velocity: 4210.0,
                    tau: 303.0,
                    burn_time: 75.0,
                    burnout_tau: 228.0,
                    mass_flow: 1000.0,
                    engines: 5,
                    coast_before: 0.0,
                    transfer_at: None,
                },
                BurnArcConfig {
                    name: "S-IVB first burn".into(),
                    stage: 3,
                    exhaust_velocity: 4153.9,
                    tau: 706.3,
                    burn_time: 193.0,
                    burnout_tau: 513.3,
                    mass_flow: 240.7,
                    engines: 1,
                    coast_before: 5.0,
                    transfer_at: None,
                },
            ],
            restart_arc: Some(BurnArcConfig {
                name: "S-IVB second burn".into(),
                stage: 3,
                exhaust_velocity: 4153.9,
                tau: 509.7,
                burn_time: 291.2,
                burnout_tau: 218.5,
                mass_flow: 240.7,
                engines: 1,
                coast_before: 0.0,
                transfer_at: None,
            }),
            igm: IgmConfig {
                terminal_freeze: 40.0,
                chi_bar: 15.0,
                velocity_bias: 2.0,
                min_sensed_accel: 0.5,
                settle_time: 10.0,
            },
            target: OrbitTarget {
                inclination: None,
                descending_node: None,
                inclination_rate: 0.0,
                node_rate: 0.0,
                window_time: 0.0,
                semi_latus_rectum: 6_563_366.0,
                eccentricity: 0.0,
                alpha_d: 0.0,
            },
            tli: vec![tli(8_400.0, 123.0, 127.0), tli(14_100.0, 125.5, 129.5)],
            attitude: default_attitude(),
            drag: DragModel::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        VehicleConfig::saturn_ib().validate().unwrap();
        VehicleConfig::saturn_v().validate().unwrap();
    }

    #[test]
    fn json_round_trip() {
        let cfg = VehicleConfig::saturn_v();
        let text = cfg.to_json().unwrap();
        let back: VehicleConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let mut cfg = VehicleConfig::saturn_ib();
        cfg.igm.chi_bar = 50.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Thresholds { .. })));
    }

    #[test]
    fn rejects_restart_without_arc() {
        let mut cfg = VehicleConfig::saturn_v();
        cfg.restart_arc = None;
        assert_eq!(cfg.validate(), Err(ConfigError::MissingRestartArc));
    }

    #[test]
    fn stage_mapping_follows_vehicle() {
        let ib = VehicleConfig::saturn_ib();
        let v = VehicleConfig::saturn_v();
        assert_eq!(ib.stage_for(Timebase::Tb4), Some(2));
        assert_eq!(v.stage_for(Timebase::Tb4), Some(3));
        assert_eq!(v.stage_for(Timebase::Abort), None);
        assert!(ib.igm_start(Timebase::Tb4).is_none());
        assert!(v.igm_start(Timebase::Tb6).is_some());
        assert!(!ib.powered_flight(Timebase::Tb4, 0.0));
        assert!(!v.powered_flight(Timebase::Tb6, 100.0));
        assert!(v.powered_flight(Timebase::Tb6, 600.0));
    }

    #[test]
    fn navigation_stays_sensed_briefly_after_cutoff() {
        let ib = VehicleConfig::saturn_ib();
        let v = VehicleConfig::saturn_v();
        assert!(ib.sensed_navigation(Timebase::Tb4, 0.0));
        assert!(ib.sensed_navigation(Timebase::Tb4, 9.9));
        assert!(!ib.sensed_navigation(Timebase::Tb4, 10.0));
        assert!(v.sensed_navigation(Timebase::Tb4, 300.0));
        assert!(v.sensed_navigation(Timebase::Tb5, 5.0));
        assert!(!v.sensed_navigation(Timebase::Tb5, 60.0));
        assert!(v.sensed_navigation(Timebase::Tb7, 5.0));
        assert!(!v.sensed_navigation(Timebase::Tb6, 100.0));
    }

    #[test]
    fn upper_stage_arcs_match_stack() {
        // tau is the upper stack mass over mass flow, at ignition or IGM start
        for config in [VehicleConfig::saturn_ib(), VehicleConfig::saturn_v()] {
            let mission = crate::vehicle::Mission::preset(config.kind);
            let last = mission.stages.last().unwrap();
            let arc = config.arcs.last().unwrap();
            let tau = last.total_mass() / arc.mass_flow;
            assert!((tau - arc.tau).abs() < 25.0, "{}: tau {} vs stack {tau}", config.name, arc.tau);
            assert!(arc.burn_time < last.propellant_mass / arc.mass_flow);
            assert!((arc.tau - arc.burn_time - arc.burnout_tau).abs() < 1e-6);
        }
    }

    #[test]
    fn roll_offset_is_pad_minus_flight_azimuth() {
        let ib = VehicleConfig::saturn_ib();
        assert!((ib.roll_offset().to_degrees() - 28.0).abs() < 1e-9);
    }
}
