use nalgebra::{Rotation3, Unit, Vector3};

use super::event::{EventKind, SimEvent};
use super::integrator::{rk4_step, Deriv, PointMass};
use crate::guidance::attitude::{direction_from_attitude, wrap_angle};
use crate::orbital::LaunchFrame;
use crate::physics::aerodynamics::{drag_force, relative_velocity};
use crate::physics::{atmosphere, ZonalGravity, G0, OMEGA_EARTH};
use crate::sequencer::SwitchCommand;
use crate::state::GuidanceState;
use crate::timebase::Timebase;
use crate::vehicle::{Discretes, HostAction, HostVehicle, Mission, Telemetry};

/// Attitude control loop time constant, s.
const ATTITUDE_LAG: f64 = 0.5;
/// How long the separation discrete stays up, s.
const SEPARATION_PULSE: f64 = 5.0;

/// Failures injected into a run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FaultPlan {
    /// Host time at which one engine of the lowest stage fails.
    pub engine_out_at: Option<f64>,
    /// Host time from which the platform attitude reference is lost.
    pub reference_loss_at: Option<f64>,
}

// ---------------------------------------------------------------------------
// Simulated vehicle
// ---------------------------------------------------------------------------

/// Point-mass launch vehicle flown by the guidance computer.
///
/// Positions are in the platform frame fixed at reference release. The
/// vehicle follows commanded attitude through a first-order lag driven by
/// the attitude error the computer sends back.
pub struct SimVehicle {
    mission: Mission,
    gravity: ZonalGravity,
    spin_axis: Vector3<f64>,
    launch_position: Vector3<f64>,
    site_radius: f64,
    grr_time: f64,
    pub time: f64,
    pub body: PointMass,
    pub attitude: Vector3<f64>, // rad, (roll, pitch, yaw)
    /// Lowest stage still attached, 1-based.
    pub bottom: usize,
    propellant: Vec<f64>,
    burning: Vec<bool>,
    engines_out: Vec<u32>,
    lifted_off: bool,
    separated_at: Option<f64>,
    engine_out: bool,
    pending_dv: Vector3<f64>,
    error: Vector3<f64>,
    pub guidance_stage: usize,
    pub faults: FaultPlan,
    pub events: Vec<SimEvent>,
}

impl SimVehicle {
    /// Vehicle on the pad; reference release happens at `grr_time`.
    pub fn new(mission: Mission, frame: &LaunchFrame, roll_offset: f64, grr_time: f64) -> Self {
        let spin_axis = frame.spin_axis();
        let launch_position = frame.launch_position();
        let mass = mission.total_mass();
        let n = mission.stages.len();
        let mut vehicle = Self {
            propellant: mission.stages.iter().map(|s| s.propellant_mass).collect(),
            burning: vec![false; n],
            engines_out: vec![0; n],
            mission,
            gravity: ZonalGravity::earth(spin_axis),
            spin_axis,
            launch_position,
            site_radius: launch_position.norm(),
            grr_time,
            time: 0.0,
            body: PointMass { pos: launch_position, vel: Vector3::zeros(), mass },
            attitude: Vector3::new(roll_offset, 0.0, 0.0),
            bottom: 1,
            lifted_off: false,
            separated_at: None,
            engine_out: false,
            pending_dv: Vector3::zeros(),
            error: Vector3::zeros(),
            guidance_stage: 1,
            faults: FaultPlan::default(),
            events: Vec::new(),
        };
        vehicle.body = vehicle.pad_state(0.0);
        vehicle
    }

    /// Vehicle coasting at the navigated state of a restored computer, with
    /// every stage below the flying one already gone.
    pub fn resume(mission: Mission, frame: &LaunchFrame, state: &GuidanceState, grr_time: f64) -> Self {
        let mut vehicle = Self::new(mission, frame, 0.0, grr_time);
        if state.phase < Timebase::Tb1 {
            return vehicle;
        }
        let bottom = state.stage.clamp(1, vehicle.mission.stages.len());
        for idx in 0..bottom - 1 {
            vehicle.propellant[idx] = 0.0;
        }
        vehicle.bottom = bottom;
        vehicle.guidance_stage = bottom;
        vehicle.lifted_off = true;
        vehicle.time = grr_time + state.mission_time;
        vehicle.attitude = state.attitude.estimated;
        vehicle.body = PointMass {
            pos: state.nav.position,
            vel: state.nav.velocity,
            mass: vehicle.mission.stages[bottom - 1..].iter().map(|s| s.total_mass()).sum(),
        };
        vehicle
    }

    pub fn mission(&self) -> &Mission {
        &self.mission
    }

    /// Height above the launch-site radius.
    pub fn altitude(&self) -> f64 {
        self.body.pos.norm() - self.site_radius
    }

    pub fn lifted_off(&self) -> bool {
        self.lifted_off
    }

    pub fn propellant(&self, stage: usize) -> f64 {
        stage.checked_sub(1).and_then(|i| self.propellant.get(i)).copied().unwrap_or(0.0)
    }

    pub fn is_burning(&self, stage: usize) -> bool {
        stage.checked_sub(1).and_then(|i| self.burning.get(i)).copied().unwrap_or(false)
    }

    fn log(&mut self, kind: EventKind) {
        tracing::debug!(time = self.time, event = %kind, "vehicle");
        self.events.push(SimEvent { time: self.time, kind });
    }

    /// Pad position and velocity at host time `t` (Earth-fixed, rotating).
    fn pad_state(&self, t: f64) -> PointMass {
        let angle = OMEGA_EARTH * (t - self.grr_time);
        let rot = Rotation3::from_axis_angle(&Unit::new_normalize(self.spin_axis), angle);
        let pos = rot * self.launch_position;
        let vel = (self.spin_axis * OMEGA_EARTH).cross(&pos);
        PointMass { pos, vel, mass: self.body.mass }
    }

    fn thrust(&self) -> (f64, f64) {
        let idx = self.bottom - 1;
        match self.mission.stages.get(idx) {
            Some(stage) if self.burning[idx] && self.propellant[idx] > 0.0 => {
                let thrust = stage.thrust_with_out(self.engines_out[idx]);
                (thrust, thrust / (stage.isp * G0))
            }
            _ => (0.0, 0.0),
        }
    }

    /// Advance the vehicle by `dt`.
    pub fn advance(&mut self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let gain = (dt / ATTITUDE_LAG).min(1.0);
        for i in 0..3 {
            self.attitude[i] = wrap_angle(self.attitude[i] + self.error[i] * gain);
        }

        if self.time < self.grr_time && self.time + dt >= self.grr_time {
            self.events.push(SimEvent { time: self.grr_time, kind: EventKind::ReferenceRelease });
        }
        self.inject_faults(dt);

        let hold_down_end = self.grr_time + self.mission.hold_down;
        if !self.lifted_off {
            let t1 = self.time + dt;
            let before = self.body;
            let after = self.pad_state(t1);
            let g0 = self.gravity.accel(&before.pos);
            let g1 = self.gravity.accel(&after.pos);
            if self.time >= self.grr_time {
                self.pending_dv += (after.vel - before.vel) - (g0 + g1) * (0.5 * dt);
            }
            self.body = after;
            self.time = t1;
            if self.time >= hold_down_end {
                self.burning[0] = true;
                self.lifted_off = true;
                self.log(EventKind::Ignition { stage: 1 });
                self.log(EventKind::Liftoff);
            }
            return;
        }

        let (thrust, mdot) = self.thrust();
        let stage = &self.mission.stages[self.bottom - 1];
        let (cd, area) = (stage.cd, stage.area);
        let direction = direction_from_attitude(&self.attitude);
        let gravity = &self.gravity;
        let spin = self.spin_axis;
        let site_radius = self.site_radius;
        let (next, sensed) = rk4_step(&self.body, dt, |s: &PointMass| {
            let g = gravity.accel(&s.pos);
            let rel = relative_velocity(&s.pos, &s.vel, &spin);
            let rho = atmosphere::density(s.pos.norm() - site_radius);
            let mass = s.mass.max(1.0);
            let non_grav = direction * (thrust / mass) + drag_force(&rel, rho, cd, area) / mass;
            Deriv { dpos: s.vel, dvel: g + non_grav, dmass: -mdot, sensed: non_grav }
        });
        self.body = next;
        self.pending_dv += sensed;
        self.time += dt;

        let idx = self.bottom - 1;
        if mdot > 0.0 {
            self.propellant[idx] = (self.propellant[idx] - mdot * dt).max(0.0);
            if self.propellant[idx] <= 0.0 {
                self.burning[idx] = false;
                self.log(EventKind::Depletion { stage: self.bottom });
            }
        }
        if self.altitude() < -1_000.0 && !self.events.iter().any(|e| e.kind == EventKind::Impact) {
            self.log(EventKind::Impact);
        }
    }

    pub fn impacted(&self) -> bool {
        self.events.iter().any(|e| e.kind == EventKind::Impact)
    }

    fn inject_faults(&mut self, dt: f64) {
        let Some(t) = self.faults.engine_out_at else { return };
        if self.engine_out || self.time + dt < t {
            return;
        }
        let idx = self.bottom - 1;
        let engines = self.mission.stages.get(idx).map_or(0, |s| s.engines);
        if self.burning[idx] && self.engines_out[idx] + 1 < engines {
            self.engines_out[idx] += 1;
            self.engine_out = true;
            self.log(EventKind::EnginesOut { stage: self.bottom, engines: 1 });
        }
    }

    fn discretes(&self) -> Discretes {
        let idx = self.bottom - 1;
        let depleted = self.mission.stages.get(idx).is_some_and(|s| {
            self.propellant[idx] <= s.depletion_level * s.propellant_mass
        });
        Discretes {
            guidance_reference_release: self.time >= self.grr_time,
            liftoff: self.lifted_off,
            propellant_depletion: self.lifted_off && depleted,
            engine_out: self.engine_out,
            separation: self.separated_at.is_some_and(|t| self.time - t < SEPARATION_PULSE),
            ..Discretes::default()
        }
    }

    fn react(&mut self, action: HostAction) {
        match action {
            HostAction::Ignite(stage) if stage == self.bottom && self.propellant(stage) > 0.0 => {
                if !self.burning[stage - 1] {
                    self.burning[stage - 1] = true;
                    self.log(EventKind::Ignition { stage });
                }
            }
            HostAction::Cutoff(stage) if self.is_burning(stage) => {
                self.burning[stage - 1] = false;
                self.log(EventKind::Cutoff { stage });
            }
            HostAction::EngineCutoff { stage, engines } if self.is_burning(stage) => {
                let total = self.mission.stages[stage - 1].engines;
                let out = &mut self.engines_out[stage - 1];
                *out = (*out + engines).min(total);
                self.log(EventKind::EnginesOut { stage, engines });
            }
            HostAction::Separate(stage) if stage == self.bottom && stage < self.mission.stages.len() => {
                let idx = stage - 1;
                self.body.mass -= self.mission.stages[idx].dry_mass + self.propellant[idx];
                self.propellant[idx] = 0.0;
                self.burning[idx] = false;
                self.bottom += 1;
                self.separated_at = Some(self.time);
                self.engine_out = false;
                self.log(EventKind::Separation { stage });
            }
            _ => {}
        }
    }
}

impl HostVehicle for SimVehicle {
    fn telemetry(&mut self) -> Telemetry {
        let reference_lost = self.faults.reference_loss_at.is_some_and(|t| self.time >= t);
        Telemetry {
            mission_time: self.time - self.grr_time,
            delta_v: std::mem::take(&mut self.pending_dv),
            attitude: self.attitude,
            attitude_reference_failed: reference_lost,
            discretes: self.discretes(),
            target_update: None,
        }
    }

    fn switch_selector(&mut self, command: SwitchCommand) {
        if let Some(action) = self.mission.action(command) {
            self.react(action);
        }
    }

    fn attitude_error(&mut self, error: Vector3<f64>) {
        self.error = error;
    }

    fn set_stage(&mut self, stage: usize) {
        self.guidance_stage = stage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::Subsystem;
    use crate::vehicle::VehicleConfig;

    fn vehicle() -> SimVehicle {
        let cfg = VehicleConfig::saturn_ib();
        SimVehicle::new(Mission::preset(cfg.kind), &cfg.launch, cfg.roll_offset(), 1.0)
    }

    #[test]
    fn pad_sensed_acceleration_opposes_gravity() {
        let mut v = vehicle();
        v.advance(1.0);
        let _ = v.telemetry();
        v.advance(1.0);
        let dv = v.telemetry().delta_v;
        // about 1 g upward (platform X is local vertical at release)
        assert!((dv.x - 9.8).abs() < 0.1, "dv {dv:?}");
        assert!(dv.y.abs() < 0.05 && dv.z.abs() < 0.05);
        assert!(!v.telemetry().discretes.liftoff);
    }

    #[test]
    fn liftoff_after_hold_down_and_climbs() {
        let mut v = vehicle();
        for _ in 0..100 {
            v.advance(0.1);
        }
        assert!(v.lifted_off());
        assert!(v.is_burning(1));
        for _ in 0..100 {
            v.advance(0.1);
        }
        assert!(v.altitude() > 100.0, "altitude {}", v.altitude());
        assert!(v.propellant(1) < v.mission().stages[0].propellant_mass);
    }

    #[test]
    fn separation_drops_mass_and_raises_discrete() {
        let mut v = vehicle();
        for _ in 0..70 {
            v.advance(0.1);
        }
        let mass = v.body.mass;
        v.switch_selector(SwitchCommand::new(Subsystem::FirstStage, 6));
        assert!(!v.is_burning(1));
        v.switch_selector(SwitchCommand::new(Subsystem::InstrumentUnit, 20));
        assert_eq!(v.bottom, 2);
        assert!(v.body.mass < mass - 40_000.0);
        assert!(v.telemetry().discretes.separation);
        v.switch_selector(SwitchCommand::new(Subsystem::SecondStage, 10));
        assert!(v.is_burning(2));
        assert!(v.events.iter().any(|e| e.kind == EventKind::Ignition { stage: 2 }));
    }

    #[test]
    fn attitude_follows_error() {
        let mut v = vehicle();
        let start = v.attitude;
        v.attitude_error(Vector3::new(0.0, 0.02, 0.0));
        v.advance(0.1);
        assert!((v.attitude.y - start.y - 0.004).abs() < 1e-12);
    }

    #[test]
    fn engine_out_fault_latches_discrete() {
        let mut v = vehicle();
        v.faults.engine_out_at = Some(20.0);
        for _ in 0..250 {
            v.advance(0.1);
        }
        assert!(v.telemetry().discretes.engine_out);
        assert!(v.events.iter().any(|e| matches!(e.kind, EventKind::EnginesOut { stage: 1, engines: 1 })));
    }

    #[test]
    fn resume_places_vehicle_at_navigated_state() {
        let cfg = VehicleConfig::saturn_ib();
        let mut st = GuidanceState::new(&cfg);
        st.phase = Timebase::Tb4;
        st.stage = 2;
        st.mission_time = 600.0;
        st.nav.position = Vector3::new(6_556_000.0, 0.0, 1_000_000.0);
        st.nav.velocity = Vector3::new(0.0, 0.0, 7_800.0);
        let v = SimVehicle::resume(Mission::preset(cfg.kind), &cfg.launch, &st, 10.0);
        assert_eq!(v.bottom, 2);
        assert_eq!(v.time, 610.0);
        assert!(v.lifted_off() && !v.is_burning(2));
        assert_eq!(v.body.pos, st.nav.position);
        assert_eq!(v.body.mass, v.mission().stages[1].total_mass());
        assert_eq!(v.propellant(1), 0.0);
    }
}
