use nalgebra::Vector3;

use super::event::{EventKind, SimEvent};
use super::host::{FaultPlan, SimVehicle};
use crate::sink::TelemetrySink;
use crate::timebase::{GuidanceComputer, Timebase};
use crate::vehicle::{Mission, VehicleConfig};

// ---------------------------------------------------------------------------
// Run configuration and record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub dt: f64,              // s, host tick
    pub max_time: f64,        // s, host time
    pub record_interval: f64, // s between trajectory samples
    pub grr_time: f64,        // s, host time of reference release
    pub faults: FaultPlan,
    /// Stop as soon as this phase is entered.
    pub stop_at: Option<Timebase>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dt: 0.1,
            max_time: 12_000.0,
            record_interval: 1.0,
            grr_time: 10.0,
            faults: FaultPlan::default(),
            stop_at: None,
        }
    }
}

/// One trajectory point.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub time: f64,         // s, host time
    pub mission_time: f64, // s, guidance mission time
    pub phase: Timebase,
    pub stage: usize,
    pub pos: Vector3<f64>, // m, platform frame
    pub vel: Vector3<f64>, // m/s, platform frame
    pub mass: f64,
    pub attitude: Vector3<f64>,
    pub altitude: f64,
    pub speed: f64,
    /// Distance between navigated and true position at the latest
    /// guidance cycle.
    pub nav_error: f64,
    /// Navigated minus true velocity magnitude at the latest guidance cycle.
    pub nav_velocity_error: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlightRecord {
    pub samples: Vec<Sample>,
    /// Vehicle events and phase changes, in time order.
    pub events: Vec<SimEvent>,
    pub final_phase: Timebase,
    pub reference_failure: bool,
}

impl FlightRecord {
    pub fn phase_entry(&self, phase: Timebase) -> Option<f64> {
        super::event::first_time(&self.events, |k| *k == EventKind::Phase(phase))
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

// ---------------------------------------------------------------------------
// Mission loop
// ---------------------------------------------------------------------------

/// Vehicle on the pad matching `config`, with the preset stack for its kind.
pub fn launch_vehicle(config: &VehicleConfig, run: &RunConfig) -> SimVehicle {
    let mut vehicle = SimVehicle::new(Mission::preset(config.kind), &config.launch, config.roll_offset(), run.grr_time);
    vehicle.faults = run.faults;
    vehicle
}

/// Navigation error, compared only right after a guidance cycle when the
/// navigated state and the vehicle share an epoch.
#[derive(Debug, Clone, Copy, Default)]
struct NavError {
    position: f64,
    velocity: f64,
}

impl NavError {
    fn at_cycle<S: TelemetrySink>(computer: &GuidanceComputer<S>, vehicle: &SimVehicle) -> Self {
        let nav = &computer.state().nav;
        Self {
            position: (nav.position - vehicle.body.pos).norm(),
            velocity: (nav.velocity - vehicle.body.vel).norm(),
        }
    }
}

fn sample<S: TelemetrySink>(computer: &GuidanceComputer<S>, vehicle: &SimVehicle, nav: NavError) -> Sample {
    let st = computer.state();
    Sample {
        time: vehicle.time,
        mission_time: st.mission_time,
        phase: st.phase,
        stage: vehicle.guidance_stage,
        pos: vehicle.body.pos,
        vel: vehicle.body.vel,
        mass: vehicle.body.mass,
        attitude: vehicle.attitude,
        altitude: vehicle.altitude(),
        speed: vehicle.body.vel.norm(),
        nav_error: nav.position,
        nav_velocity_error: nav.velocity,
    }
}

/// Fly `vehicle` under `computer` until the mission completes, the vehicle
/// impacts, `run.stop_at` is entered or `run.max_time` runs out.
pub fn fly<S: TelemetrySink>(computer: &mut GuidanceComputer<S>, vehicle: &mut SimVehicle, run: &RunConfig) -> FlightRecord {
    let steps = ((run.max_time - vehicle.time) / run.record_interval.max(run.dt)) as usize + 2;
    let mut samples = Vec::with_capacity(steps.min(200_000));
    let mut phases = Vec::new();

    let mut nav = NavError::default();
    samples.push(sample(computer, vehicle, nav));
    let mut next_sample = vehicle.time + run.record_interval;
    let mut phase = computer.phase();

    while vehicle.time < run.max_time {
        vehicle.advance(run.dt);
        let out = computer.step(run.dt, vehicle);
        if out.phase != Timebase::PreLaunch && computer.state().cycle_time == 0.0 {
            nav = NavError::at_cycle(computer, vehicle);
        }

        if out.phase != phase {
            phase = out.phase;
            phases.push(SimEvent { time: vehicle.time, kind: EventKind::Phase(phase) });
        }
        let stop = phase == Timebase::Complete || run.stop_at == Some(phase) || vehicle.impacted();
        if vehicle.time >= next_sample || stop {
            samples.push(sample(computer, vehicle, nav));
            next_sample += run.record_interval;
        }
        if stop {
            break;
        }
    }

    let mut events = vehicle.events.clone();
    events.extend(phases);
    events.sort_by(|a, b| a.time.total_cmp(&b.time));

    tracing::info!(
        time = vehicle.time,
        phase = %phase,
        samples = samples.len(),
        "run finished"
    );
    FlightRecord {
        samples,
        events,
        final_phase: phase,
        reference_failure: computer.state().reference_failure,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orbital::OrbitElements;
    use crate::sequencer::CommandTable;
    use crate::vehicle::VehicleKind;

    fn preset(kind: VehicleKind, run: &RunConfig) -> (GuidanceComputer, SimVehicle) {
        let config = VehicleConfig::preset(kind);
        let vehicle = launch_vehicle(&config, run);
        let computer = GuidanceComputer::new(config, CommandTable::builtin(kind)).unwrap();
        (computer, vehicle)
    }

    fn saturn_ib(run: &RunConfig) -> (GuidanceComputer, SimVehicle) {
        preset(VehicleKind::SaturnIb, run)
    }

    fn elements(computer: &GuidanceComputer, vehicle: &SimVehicle) -> OrbitElements {
        OrbitElements::from_platform(&vehicle.body.pos, &vehicle.body.vel, &computer.config().launch)
    }

    fn max_nav_error(samples: &[Sample]) -> (f64, f64) {
        samples.iter().fold((0.0, 0.0), |(r, v), s| (r.max(s.nav_error), v.max(s.nav_velocity_error)))
    }

    #[test]
    fn first_stage_sequence_in_order() {
        let run = RunConfig { stop_at: Some(Timebase::Tb3), max_time: 400.0, ..Default::default() };
        let (mut computer, mut vehicle) = saturn_ib(&run);
        let record = fly(&mut computer, &mut vehicle, &run);

        assert_eq!(record.final_phase, Timebase::Tb3);
        let grr = record.phase_entry(Timebase::ReferenceReleased).unwrap();
        let tb1 = record.phase_entry(Timebase::Tb1).unwrap();
        let tb2 = record.phase_entry(Timebase::Tb2).unwrap();
        let tb3 = record.phase_entry(Timebase::Tb3).unwrap();
        assert!((grr - 10.0).abs() < 0.2, "GRR at {grr}");
        assert!((tb1 - 15.0).abs() < 0.2, "TB1 at {tb1}");
        assert!(tb2 - tb1 >= 130.0, "TB1 lasted {}", tb2 - tb1);
        assert!(tb3 > tb2 + 3.0 && tb3 < tb2 + 5.0, "TB3 {} after TB2", tb3 - tb2);

        let sep = crate::sim::event::first_time(&record.events, |k| *k == EventKind::Separation { stage: 1 });
        assert!(sep.is_some_and(|t| t > tb2 && t <= tb3));
        assert!(!record.reference_failure);

        let last = record.last().unwrap();
        assert!(last.altitude > 20_000.0, "altitude at TB3 {}", last.altitude);
        assert_eq!(vehicle.guidance_stage, 2);
    }

    #[test]
    fn saturn_ib_cuts_off_in_target_orbit() {
        let run = RunConfig { stop_at: Some(Timebase::Tb4), max_time: 1_000.0, ..Default::default() };
        let (mut computer, mut vehicle) = saturn_ib(&run);
        let record = fly(&mut computer, &mut vehicle, &run);

        assert_eq!(record.final_phase, Timebase::Tb4);
        assert!(!record.reference_failure);
        // IGM cutoff, not depletion
        assert!(vehicle.propellant(2) > 1_000.0, "left {} kg", vehicle.propellant(2));
        assert!(!record.events.iter().any(|e| e.kind == EventKind::Depletion { stage: 2 }));
        let tb4 = computer.state().mission_time;
        assert!(tb4 > 500.0 && tb4 < 620.0, "TB4 at {tb4}");

        let el = elements(&computer, &vehicle);
        let target = computer.config().target.semi_latus_rectum;
        let p = el.sma * (1.0 - el.ecc * el.ecc);
        assert!((p - target).abs() < 15_000.0, "p {p}");
        assert!(el.ecc < 0.003, "e {}", el.ecc);
        assert!(el.perigee_altitude() > 170_000.0, "perigee {}", el.perigee_altitude());
        assert!(el.apogee_altitude() < 205_000.0, "apogee {}", el.apogee_altitude());

        let (r, v) = max_nav_error(&record.samples);
        assert!(r < 200.0 && v < 0.2, "nav error {r} m, {v} m/s");
    }

    #[test]
    fn navigation_keeps_cutoff_tail_into_coast() {
        let run = RunConfig { max_time: 700.0, ..Default::default() };
        let (mut computer, mut vehicle) = saturn_ib(&run);
        let record = fly(&mut computer, &mut vehicle, &run);
        assert_eq!(record.final_phase, Timebase::Tb4);

        let tb4 = record.phase_entry(Timebase::Tb4).unwrap();
        let hold = computer.config().phases.cutoff_nav_hold;
        // first orbital cycles come after the hold plus one orbital period
        let coast: Vec<&Sample> = record.samples.iter().filter(|s| s.time > tb4 + hold + 10.0).collect();
        assert!(coast.len() > 50);
        for s in &coast {
            assert!(s.nav_velocity_error < 0.5, "t={} velocity error {}", s.time, s.nav_velocity_error);
            assert!(s.nav_error < 500.0, "t={} position error {}", s.time, s.nav_error);
        }
    }

    #[test]
    fn saturn_v_translunar_injection() {
        let run = RunConfig { stop_at: Some(Timebase::Tb7), max_time: 11_000.0, ..Default::default() };
        let (mut computer, mut vehicle) = preset(VehicleKind::SaturnV, &run);
        let record = fly(&mut computer, &mut vehicle, &run);

        assert_eq!(record.final_phase, Timebase::Tb7);
        assert!(!record.reference_failure);
        for phase in [Timebase::Tb4, Timebase::Tb5, Timebase::Tb6] {
            assert!(record.phase_entry(phase).is_some(), "{phase} never entered");
        }

        // parking orbit at TB5 entry
        let tb5 = record.phase_entry(Timebase::Tb5).unwrap();
        let parking = record.samples.iter().find(|s| s.time >= tb5 + 1.0).unwrap();
        let el = OrbitElements::from_platform(&parking.pos, &parking.vel, &computer.config().launch);
        assert!(el.perigee_altitude() > 165_000.0 && el.apogee_altitude() < 205_000.0, "{el:?}");

        // translunar conic at cutoff
        assert!(vehicle.propellant(3) > 1_000.0, "left {} kg", vehicle.propellant(3));
        let tli = &computer.config().tli[0];
        let el = elements(&computer, &vehicle);
        assert!((el.c3 - tli.c3[0]).abs() < 1.5e5, "C3 {}", el.c3);
        assert!((el.ecc - tli.eccentricity[0]).abs() < 0.005, "e {}", el.ecc);

        let (r, v) = max_nav_error(&record.samples);
        assert!(r < 1_000.0 && v < 1.0, "nav error {r} m, {v} m/s");
    }

    #[test]
    fn samples_follow_record_interval() {
        let run = RunConfig { max_time: 30.0, record_interval: 5.0, ..Default::default() };
        let (mut computer, mut vehicle) = saturn_ib(&run);
        let record = fly(&mut computer, &mut vehicle, &run);
        // t = 0 plus one every 5 s
        assert_eq!(record.samples.len(), 7);
        assert!(record.samples.windows(2).all(|w| w[1].time > w[0].time));
        assert_eq!(record.final_phase, Timebase::Tb1);
    }

    #[test]
    fn reference_loss_freezes_attitude() {
        let faults = FaultPlan { reference_loss_at: Some(40.0), ..Default::default() };
        let run = RunConfig { max_time: 60.0, faults, ..Default::default() };
        let (mut computer, mut vehicle) = saturn_ib(&run);
        let record = fly(&mut computer, &mut vehicle, &run);

        assert!(record.reference_failure);
        let at = |t: f64| record.samples.iter().find(|s| s.time >= t).unwrap().attitude;
        assert!((at(45.0) - at(59.0)).norm() < 1e-9);
    }

    #[test]
    fn first_stage_engine_out_is_recorded() {
        let faults = FaultPlan { engine_out_at: Some(50.0), ..Default::default() };
        let run = RunConfig { max_time: 80.0, faults, ..Default::default() };
        let (mut computer, mut vehicle) = saturn_ib(&run);
        let record = fly(&mut computer, &mut vehicle, &run);

        assert!(record.events.iter().any(|e| matches!(e.kind, EventKind::EnginesOut { stage: 1, .. })));
        let failure = computer.state().first_stage_failure.unwrap();
        assert!((failure.time - 35.0).abs() < 0.5, "failure at {}", failure.time);
    }
}
