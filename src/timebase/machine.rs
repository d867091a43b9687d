use nalgebra::Vector3;

use super::phase::Timebase;
use crate::error::{ConfigError, GuidanceFault};
use crate::guidance::attitude::{direction_from_attitude, local_horizontal};
use crate::guidance::integrals::{BurnArc, BurnArcs};
use crate::guidance::pitch_program::program_time;
use crate::guidance::targeting::{select_restart, TargetSource};
use crate::navigation::{NavMode, Navigator};
use crate::sequencer::{CommandTable, SwitchCommand};
use crate::sink::{GuidanceEvent, NullSink, TelemetrySink};
use crate::state::{persistence, Excursion, FirstStageFailure, GuidanceState};
use crate::vehicle::{Discretes, HostVehicle, Telemetry, VehicleConfig};

// ---------------------------------------------------------------------------
// Tick output
// ---------------------------------------------------------------------------

/// What one tick produced for the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutput {
    /// Switch-selector commands fired this tick, in table order.
    pub commands: Vec<SwitchCommand>,
    pub attitude_error: Vector3<f64>, // rad, (roll, pitch, yaw)
    /// New stage number when the flying stage changed this tick.
    pub stage: Option<usize>,
    pub phase: Timebase,
}

// ---------------------------------------------------------------------------
// Guidance computer
// ---------------------------------------------------------------------------

/// The flight computer: timebase state machine driving the sequencer,
/// navigator, IGM and attitude pipeline once per host tick.
pub struct GuidanceComputer<S: TelemetrySink = NullSink> {
    config: VehicleConfig,
    table: CommandTable,
    navigator: Navigator,
    state: GuidanceState,
    sink: S,
}

impl GuidanceComputer<NullSink> {
    /// Fresh computer on the pad.
    pub fn new(config: VehicleConfig, table: CommandTable) -> Result<Self, ConfigError> {
        let state = GuidanceState::new(&config);
        Self::restore(config, table, state)
    }

    /// Resume from a persisted state.
    pub fn restore(config: VehicleConfig, table: CommandTable, state: GuidanceState) -> Result<Self, ConfigError> {
        config.validate()?;
        let navigator = Navigator::new(&config.launch, config.drag, config.cycles.orbital_substeps);
        Ok(Self { config, table, navigator, state, sink: NullSink })
    }
}

impl<S: TelemetrySink> GuidanceComputer<S> {
    pub fn with_sink<T: TelemetrySink>(self, sink: T) -> GuidanceComputer<T> {
        GuidanceComputer {
            config: self.config,
            table: self.table,
            navigator: self.navigator,
            state: self.state,
            sink,
        }
    }

    pub fn state(&self) -> &GuidanceState {
        &self.state
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn phase(&self) -> Timebase {
        self.state.phase
    }

    /// Persisted form of the current state.
    pub fn save(&self) -> String {
        persistence::serialize(&self.state)
    }

    /// Poll the host, run one tick and hand the outputs back.
    pub fn step<H: HostVehicle + ?Sized>(&mut self, dt: f64, host: &mut H) -> TickOutput {
        let telemetry = host.telemetry();
        let out = self.advance(dt, &telemetry);
        for command in &out.commands {
            host.switch_selector(*command);
        }
        if let Some(stage) = out.stage {
            host.set_stage(stage);
        }
        host.attitude_error(out.attitude_error);
        out
    }

    /// One cooperative tick.
    ///
    /// Order: clocks, latches, transitions, sequencer, guidance cycle (if
    /// due), attitude error. `Complete` does nothing.
    pub fn advance(&mut self, dt: f64, telemetry: &Telemetry) -> TickOutput {
        if self.state.phase == Timebase::Complete {
            return TickOutput { phase: Timebase::Complete, ..TickOutput::default() };
        }
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let discretes = telemetry.discretes;

        let st = &mut self.state;
        st.clock += dt;
        if st.phase != Timebase::PreLaunch {
            st.mission_time += dt;
            st.cycle_time += dt;
            st.nav.accumulate(&telemetry.delta_v);
        }

        if telemetry.attitude_reference_failed {
            self.reference_failure(GuidanceFault::AttitudeReference.to_string());
        }
        if discretes.engine_out && !self.state.engine_out_seen {
            self.engine_out();
        }
        self.state.engine_out_seen = discretes.engine_out;
        if let Some(update) = telemetry.target_update {
            self.state.restart.direct_update = Some(update);
            if self.state.phase == Timebase::Tb5 {
                self.state.restart.selected = None;
            }
        }
        self.restart_precalc(&discretes);

        self.transition(&discretes);

        let mut out = TickOutput { phase: self.state.phase, ..TickOutput::default() };
        let st = &mut self.state;
        let (phase, clock) = (st.phase, st.clock);
        for command in st.sequencer.process(phase, clock, &self.table) {
            self.sink.event(&GuidanceEvent::CommandIssued { phase, clock, command });
            out.commands.push(command);
        }
        if let Some(stage) = self.config.stage_for(phase) {
            if stage != st.stage {
                st.stage = stage;
                out.stage = Some(stage);
            }
        }

        if phase != Timebase::PreLaunch && self.state.cycle_time >= self.cycle_period() {
            self.guidance_cycle();
        }

        let st = &mut self.state;
        let tracking = st.reference_failure
            || discretes.manual_override
            || matches!(st.phase, Timebase::PreLaunch | Timebase::Complete);
        out.attitude_error = st.attitude.update_error(telemetry.attitude, tracking, &self.config.attitude);
        out
    }

    fn cycle_period(&self) -> f64 {
        if self.config.sensed_navigation(self.state.phase, self.state.clock) {
            self.config.cycles.powered
        } else {
            self.config.cycles.orbital
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn transition(&mut self, d: &Discretes) {
        let phase = self.state.phase;
        if phase.is_excursion() {
            if self.excursion_done(d) {
                self.return_from_excursion();
            }
            return;
        }
        match self.next_phase(d) {
            Some(next) if next.is_excursion() => self.enter_excursion(next),
            Some(next) => self.enter(next),
            None => {}
        }
    }

    fn next_phase(&self, d: &Discretes) -> Option<Timebase> {
        let st = &self.state;
        let cfg = &self.config;
        let bounds = &cfg.phases;
        let clock = st.clock;
        let two_upper = cfg.upper_stages() == 2;

        if d.abort && st.phase.is_abortable() {
            return Some(Timebase::Abort);
        }
        let done = clock >= bounds.terminal_bound;
        match st.phase {
            Timebase::PreLaunch => d.guidance_reference_release.then_some(Timebase::ReferenceReleased),
            Timebase::ReferenceReleased => d.liftoff.then_some(Timebase::Tb1),
            Timebase::Tb1 => (d.propellant_depletion && clock >= bounds.tb1_min).then_some(Timebase::Tb2),
            Timebase::Tb2 => (d.separation && clock >= bounds.tb2_min).then_some(Timebase::Tb3),
            Timebase::Tb3 if two_upper => (d.propellant_depletion && clock >= bounds.tb3_min).then_some(Timebase::Tb4),
            Timebase::Tb3 => self.igm_cutoff(d).then_some(Timebase::Tb4),
            Timebase::Tb4 if two_upper => self.igm_cutoff(d).then_some(Timebase::Tb5),
            Timebase::Tb4 => done.then_some(Timebase::Complete),
            Timebase::Tb5 => {
                let restart_due = cfg.restart_capable()
                    && !d.restart_inhibit
                    && st.restart.selected.is_some()
                    && st.restart.restart_time.is_some_and(|t| clock >= t);
                if restart_due {
                    Some(Timebase::Tb6)
                } else {
                    done.then_some(Timebase::Complete)
                }
            }
            Timebase::Tb6 if clock < bounds.tb6_ignition && d.burner_malfunction => Some(Timebase::Tb6a),
            Timebase::Tb6 if clock < bounds.tb6_ignition && d.restart_inhibit => Some(Timebase::Tb6b),
            Timebase::Tb6 => self.igm_cutoff(d).then_some(Timebase::Tb7),
            Timebase::Tb7 if d.impact_maneuver => Some(Timebase::Tb8),
            Timebase::Tb7 | Timebase::Tb8 => done.then_some(Timebase::Complete),
            Timebase::Abort => (clock >= bounds.abort_bound).then_some(Timebase::Complete),
            Timebase::Tb6a | Timebase::Tb6b | Timebase::Complete => None,
        }
    }

    /// Predicted cutoff reached, or depletion while the IGM is burning.
    fn igm_cutoff(&self, d: &Discretes) -> bool {
        let st = &self.state;
        let Some(start) = self.config.igm_start(st.phase) else {
            return false;
        };
        if st.clock < start {
            return false;
        }
        d.propellant_depletion || st.igm.cutoff_clock.is_some_and(|c| st.clock >= c)
    }

    fn excursion_done(&self, d: &Discretes) -> bool {
        let st = &self.state;
        let complete = st.sequencer.sequence_complete(st.phase, &self.table);
        match st.phase {
            Timebase::Tb6b => complete && !d.restart_inhibit,
            _ => complete,
        }
    }

    fn enter(&mut self, next: Timebase) {
        let st = &mut self.state;
        let from = st.phase;
        st.phase = next;
        st.clock = 0.0;
        st.sequencer.reset(next);
        // cutoff predictions are phase-clock relative
        st.igm.cutoff_clock = None;
        st.igm.predictor.clear();
        self.sink.event(&GuidanceEvent::PhaseEntered { from, to: next, mission_time: st.mission_time });

        match next {
            Timebase::ReferenceReleased => {
                st.nav = self.navigator.initial_state(&self.config.launch);
                st.mission_time = 0.0;
                st.cycle_time = 0.0;
            }
            Timebase::Tb4 if self.config.upper_stages() == 2 => {
                st.igm.arcs.activate_stage(3, self.config.igm.settle_time);
            }
            Timebase::Tb6 => self.load_restart_target(),
            _ => {}
        }
    }

    fn enter_excursion(&mut self, next: Timebase) {
        let st = &mut self.state;
        let parent = st.phase;
        st.excursion = Some(Excursion {
            parent,
            clock: st.clock,
            cursor: st.sequencer.cursor(parent),
        });
        st.phase = next;
        st.clock = 0.0;
        st.sequencer.reset(next);
        self.sink.event(&GuidanceEvent::PhaseEntered { from: parent, to: next, mission_time: st.mission_time });
    }

    fn return_from_excursion(&mut self) {
        let st = &mut self.state;
        let Some(exc) = st.excursion.take() else {
            // no parent on record: the only legal parent is TB6
            st.phase = Timebase::Tb6;
            return;
        };
        let from = st.phase;
        st.phase = exc.parent;
        st.clock = exc.clock;
        st.sequencer.set_cursor(exc.parent, exc.cursor);
        self.sink.event(&GuidanceEvent::ExcursionReturned { from, parent: exc.parent, restored_clock: exc.clock });
    }

    // -----------------------------------------------------------------------
    // Restart targeting
    // -----------------------------------------------------------------------

    /// Parking-orbit precalculation: pick the next restart target, and move
    /// on to the following opportunity if the current one passes inhibited.
    fn restart_precalc(&mut self, d: &Discretes) {
        let st = &mut self.state;
        if st.phase != Timebase::Tb5 || !self.config.restart_capable() {
            return;
        }
        let clock = st.clock;
        let restart = &mut st.restart;
        if d.restart_inhibit && restart.restart_time.is_some_and(|t| clock >= t) {
            restart.opportunity += 1;
            restart.selected = None;
            restart.restart_time = None;
        }
        if restart.selected.is_some() {
            return;
        }
        let window = self.config.target.window_time;
        let Some(sel) = select_restart(&self.config.tli, restart.opportunity, window, restart.direct_update.as_ref())
        else {
            return;
        };
        if sel.source == TargetSource::DirectUpdate || sel.rejected_update.is_some() {
            restart.direct_update = None;
        }
        restart.selected = Some(sel.conic);
        restart.restart_time = Some(sel.restart_time);
        if let Some(u) = sel.rejected_update {
            self.sink.event(&GuidanceEvent::RestartFallback { c3: u.c3, eccentricity: u.eccentricity });
        }
        self.sink.event(&GuidanceEvent::TargetSelected {
            source: sel.source.as_str(),
            inclination: sel.conic.inclination,
            descending_node: sel.conic.descending_node,
            eccentricity: sel.conic.eccentricity,
        });
    }

    /// Restart entry: the IGM gets the selected conic and the restart arc.
    fn load_restart_target(&mut self) {
        let st = &mut self.state;
        let (Some(conic), Some(arc)) = (st.restart.selected, self.config.restart_arc.as_ref()) else {
            return;
        };
        let plane = self.config.launch.orbit_plane_matrix(conic.inclination, conic.descending_node);
        let arcs = BurnArcs { arcs: vec![BurnArc::from(arc)], active: 0 };
        st.igm.reseed(conic, plane, arcs);
    }

    // -----------------------------------------------------------------------
    // Faults and engine out
    // -----------------------------------------------------------------------

    fn reference_failure(&mut self, reason: String) {
        if self.state.reference_failure {
            return;
        }
        self.state.reference_failure = true;
        self.sink.event(&GuidanceEvent::ReferenceFailure { reason });
    }

    fn engine_out(&mut self) {
        let st = &mut self.state;
        self.sink.event(&GuidanceEvent::EngineOut { phase: st.phase, clock: st.clock });
        match st.phase {
            Timebase::Tb1 if st.first_stage_failure.is_none() => {
                st.first_stage_failure = Some(FirstStageFailure {
                    time: st.clock,
                    freeze: self.config.engine_out.freeze_duration(st.clock),
                });
            }
            phase if self.config.igm_start(phase).is_some() => {
                if let Some(arc) = st.igm.arcs.active_arc_mut() {
                    arc.engine_out(self.config.igm.settle_time);
                }
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Guidance cycle
    // -----------------------------------------------------------------------

    /// Navigation, then the phase's steering law, then the rate-limited
    /// attitude command. Consumes all accumulated cycle time.
    fn guidance_cycle(&mut self) {
        let st = &mut self.state;
        let dt = std::mem::take(&mut st.cycle_time);
        let mode = if self.config.sensed_navigation(st.phase, st.clock) { NavMode::Powered } else { NavMode::Orbital };
        let delta_v = st.nav.take_pending();
        let body_axis = direction_from_attitude(&st.attitude.estimated);
        if let Err(fault) = self.navigator.integrate(&mut st.nav, mode, dt, delta_v, &body_axis) {
            self.reference_failure(fault.to_string());
        }
        if self.state.reference_failure {
            return;
        }
        match self.steering_target(dt) {
            Ok(Some(target)) => self.state.attitude.command(&target, dt, &self.config.attitude),
            Ok(None) => {}
            Err(fault) => self.reference_failure(fault.to_string()),
        }
    }

    /// Attitude the current phase wants, `None` to hold.
    fn steering_target(&mut self, dt: f64) -> Result<Option<Vector3<f64>>, GuidanceFault> {
        let st = &self.state;
        let cfg = &self.config;
        match st.phase {
            Timebase::Tb1 => {
                let failure = st.first_stage_failure.map(|f| (f.time, f.freeze));
                let pitch = cfg.pitch_program.pitch(program_time(st.clock, failure));
                let roll = if st.clock >= cfg.phases.roll_start { cfg.flight_roll } else { st.attitude.commanded.x };
                Ok(Some(Vector3::new(roll, pitch, 0.0)))
            }
            Timebase::PreLaunch | Timebase::ReferenceReleased | Timebase::Tb2 | Timebase::Abort => Ok(None),
            Timebase::Complete => Ok(None),
            phase => match cfg.igm_start(phase) {
                Some(start) if st.clock >= start => self.igm_step(dt).map(Some),
                Some(_) if cfg.powered_flight(phase, st.clock) => Ok(None),
                _ => Ok(local_horizontal(&st.nav.position, &st.nav.velocity, cfg.flight_roll)),
            },
        }
    }

    fn igm_step(&mut self, dt: f64) -> Result<Vector3<f64>, GuidanceFault> {
        let cfg = &self.config;
        let st = &mut self.state;
        let clock = st.clock;
        let arcs = &mut st.igm.arcs;
        if arcs.active_arc().and_then(|a| a.transfer_at).is_some_and(|t| clock >= t) {
            arcs.transfer(cfg.igm.settle_time);
        }
        if let Some(arc) = arcs.active_arc_mut() {
            arc.update_tau(st.nav.sensed_accel, dt, cfg.igm.min_sensed_accel);
        }
        arcs.advance(dt);

        let out = st.igm.compute_guidance(&st.nav, &cfg.igm, clock, dt)?;
        self.sink.event(&GuidanceEvent::GuidanceCycle {
            phase: st.phase,
            time_to_go: out.time_to_go,
            pitch: out.pitch,
            yaw: out.yaw,
        });
        if let Some(cutoff_clock) = out.cutoff_clock {
            self.sink.event(&GuidanceEvent::CutoffPredicted { phase: st.phase, cutoff_clock });
        }
        Ok(Vector3::new(cfg.flight_roll, out.pitch, out.yaw))
    }
}
