use nalgebra::{Matrix3, Vector3};
use strum::IntoEnumIterator;

use crate::guidance::attitude::AttitudeState;
use crate::guidance::integrals::{BurnArc, BurnArcs};
use crate::guidance::targeting::{TargetConic, TargetUpdate};
use crate::guidance::Igm;
use crate::navigation::{NavState, Navigator};
use crate::sequencer::SwitchSelector;
use crate::timebase::Timebase;
use crate::vehicle::VehicleConfig;

/// Upper bound on persisted burn arcs and predictor samples.
const MAX_LIST: usize = 16;

// ---------------------------------------------------------------------------
// Guidance state aggregate
// ---------------------------------------------------------------------------

/// Parent phase bookkeeping while an excursion runs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Excursion {
    pub parent: Timebase,
    pub clock: f64,
    pub cursor: usize,
}

/// Restart targeting bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestartState {
    pub opportunity: usize,
    /// Target chosen by the precalculation, loaded into the IGM at restart.
    pub selected: Option<TargetConic>,
    pub restart_time: Option<f64>,
    pub direct_update: Option<TargetUpdate>,
}

/// First-stage engine failure: time and pitch-freeze duration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FirstStageFailure {
    pub time: f64,
    pub freeze: f64,
}

/// Everything the guidance computer carries from tick to tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuidanceState {
    pub phase: Timebase,
    pub clock: f64,        // s, phase-elapsed
    pub mission_time: f64, // s, since reference release
    pub cycle_time: f64,   // s, accumulated towards the next guidance cycle
    pub stage: usize,
    pub sequencer: SwitchSelector,
    pub excursion: Option<Excursion>,
    pub nav: NavState,
    pub igm: Igm,
    pub attitude: AttitudeState,
    pub reference_failure: bool,
    pub engine_out_seen: bool,
    pub first_stage_failure: Option<FirstStageFailure>,
    pub restart: RestartState,
}

impl GuidanceState {
    /// Fresh state on the pad for a vehicle.
    pub fn new(config: &VehicleConfig) -> Self {
        let frame = &config.launch;
        let navigator = Navigator::new(frame, config.drag, config.cycles.orbital_substeps);
        let conic = config.target.conic(frame);
        let plane = frame.orbit_plane_matrix(conic.inclination, conic.descending_node);
        let roll = config.roll_offset();
        let pad = Vector3::new(roll, 0.0, 0.0);
        Self {
            stage: 1,
            nav: navigator.initial_state(frame),
            igm: Igm::new(BurnArcs::from_config(&config.arcs), conic, plane),
            attitude: AttitudeState { commanded: pad, previous: pad, estimated: pad, error: Vector3::zeros() },
            ..Self::default()
        }
    }

    /// Walk every persisted field in schema order.
    ///
    /// The same walk drives writing and reading, so a field added here is
    /// persisted in both directions.
    pub fn fields(&mut self, v: &mut dyn FieldVisitor) {
        v.phase("PHASE", &mut self.phase);
        v.scalar("CLOCK", &mut self.clock);
        v.scalar("MISSION_TIME", &mut self.mission_time);
        v.scalar("CYCLE_TIME", &mut self.cycle_time);
        v.count("STAGE", &mut self.stage);
        v.flag("GRF", &mut self.reference_failure);
        v.flag("ENGINE_OUT_SEEN", &mut self.engine_out_seen);

        for tb in Timebase::iter() {
            v.count(&format!("CURSOR_{tb}"), &mut self.sequencer.cursors_mut()[tb.index()]);
        }

        let mut exc_active = self.excursion.is_some();
        let mut exc = self.excursion.unwrap_or_default();
        v.flag("EXCURSION", &mut exc_active);
        v.phase("EXCURSION_PARENT", &mut exc.parent);
        v.scalar("EXCURSION_CLOCK", &mut exc.clock);
        v.count("EXCURSION_CURSOR", &mut exc.cursor);
        self.excursion = exc_active.then_some(exc);

        let mut failed = self.first_stage_failure.is_some();
        let mut failure = self.first_stage_failure.unwrap_or_default();
        v.flag("S1_FAILURE", &mut failed);
        v.scalar("S1_FAILURE_TIME", &mut failure.time);
        v.scalar("S1_FREEZE", &mut failure.freeze);
        self.first_stage_failure = failed.then_some(failure);

        // navigation
        let nav = &mut self.nav;
        v.vector("POS", &mut nav.position);
        v.vector("VEL", &mut nav.velocity);
        v.vector("GRAV", &mut nav.gravity);
        v.vector("DV", &mut nav.delta_v);
        v.vector("DV_PENDING", &mut nav.pending_dv);
        v.scalar("FM", &mut nav.sensed_accel);

        // attitude
        let att = &mut self.attitude;
        v.vector("ATT_CMD", &mut att.commanded);
        v.vector("ATT_PREV", &mut att.previous);
        v.vector("ATT_EST", &mut att.estimated);
        v.vector("ATT_ERR", &mut att.error);

        igm_fields(&mut self.igm, v);
        restart_fields(&mut self.restart, v);
    }
}

fn igm_fields(igm: &mut Igm, v: &mut dyn FieldVisitor) {
    let mut n = igm.arcs.arcs.len();
    v.count("ARCS", &mut n);
    igm.arcs.arcs.resize(n.min(MAX_LIST), BurnArc::default());
    v.count("ARC_ACTIVE", &mut igm.arcs.active);
    for (i, arc) in igm.arcs.arcs.iter_mut().enumerate() {
        v.count(&format!("ARC{i}_STAGE"), &mut arc.stage);
        v.scalar(&format!("ARC{i}_VEX"), &mut arc.exhaust_velocity);
        v.scalar(&format!("ARC{i}_TAU"), &mut arc.tau);
        v.scalar(&format!("ARC{i}_T"), &mut arc.remaining);
        v.scalar(&format!("ARC{i}_TAU_BURNOUT"), &mut arc.burnout_tau);
        v.scalar(&format!("ARC{i}_MDOT"), &mut arc.mass_flow);
        v.scalar(&format!("ARC{i}_COAST"), &mut arc.coast_before);
        let mut engines = arc.engines as usize;
        let mut out = arc.engines_out as usize;
        v.count(&format!("ARC{i}_ENGINES"), &mut engines);
        v.count(&format!("ARC{i}_ENGINES_OUT"), &mut out);
        arc.engines = u32::try_from(engines).unwrap_or(arc.engines);
        arc.engines_out = u32::try_from(out).unwrap_or(arc.engines_out);
        optional(v, &format!("ARC{i}_TRANSFER"), &mut arc.transfer_at);
        v.scalar(&format!("ARC{i}_ARTIFICIAL"), &mut arc.artificial);
    }

    conic_fields("TARGET", &mut igm.target, v);
    v.matrix("MG", &mut igm.plane);
    v.matrix("MK", &mut igm.terminal_frame);

    let t = &mut igm.terminal;
    v.scalar("PHI_T", &mut t.range_angle);
    v.scalar("R_T", &mut t.radius);
    v.scalar("V_T", &mut t.speed);
    v.scalar("GAMMA_T", &mut t.flight_path);
    v.scalar("G_T", &mut t.gravity);
    v.flag("TERMINAL_SET", &mut t.initialized);
    v.flag("TERMINAL_FROZEN", &mut t.frozen);

    let s = &mut igm.steering;
    v.scalar("TCHI_P", &mut s.tchi_p);
    v.scalar("TCHI_Y", &mut s.tchi_y);
    for (k, value) in s.k.iter_mut().enumerate() {
        v.scalar(&format!("K{}", k + 1), value);
    }
    v.flag("CHI_BAR", &mut igm.chi_bar);
    v.scalar("T_GO", &mut igm.time_to_go);
    optional(v, "CUTOFF_CLOCK", &mut igm.cutoff_clock);

    let samples = &mut igm.predictor.samples;
    let mut n = samples.len();
    v.count("HSL_SAMPLES", &mut n);
    samples.resize(n.min(MAX_LIST), (0.0, 0.0));
    for (i, (t, speed)) in samples.iter_mut().enumerate() {
        v.scalar(&format!("HSL{i}_T"), t);
        v.scalar(&format!("HSL{i}_V"), speed);
    }
}

fn restart_fields(r: &mut RestartState, v: &mut dyn FieldVisitor) {
    v.count("TLI_OPPORTUNITY", &mut r.opportunity);
    optional(v, "RESTART_TIME", &mut r.restart_time);

    let mut selected = r.selected.is_some();
    let mut conic = r.selected.unwrap_or_default();
    v.flag("TLI_SELECTED", &mut selected);
    conic_fields("TLI", &mut conic, v);
    r.selected = selected.then_some(conic);

    let mut uplinked = r.direct_update.is_some();
    let mut u = r.direct_update.unwrap_or(TargetUpdate {
        inclination: 0.0,
        descending_node: 0.0,
        c3: 0.0,
        eccentricity: 0.0,
        cutoff_anomaly: 0.0,
        restart_time: 0.0,
    });
    v.flag("UPDATE", &mut uplinked);
    v.scalar("UPDATE_INC", &mut u.inclination);
    v.scalar("UPDATE_NODE", &mut u.descending_node);
    v.scalar("UPDATE_C3", &mut u.c3);
    v.scalar("UPDATE_ECC", &mut u.eccentricity);
    v.scalar("UPDATE_ANOMALY", &mut u.cutoff_anomaly);
    v.scalar("UPDATE_RESTART", &mut u.restart_time);
    r.direct_update = uplinked.then_some(u);
}

fn conic_fields(prefix: &str, c: &mut TargetConic, v: &mut dyn FieldVisitor) {
    v.scalar(&format!("{prefix}_INC"), &mut c.inclination);
    v.scalar(&format!("{prefix}_NODE"), &mut c.descending_node);
    v.scalar(&format!("{prefix}_ECC"), &mut c.eccentricity);
    v.scalar(&format!("{prefix}_P"), &mut c.semi_latus_rectum);
    v.scalar(&format!("{prefix}_ALPHA_D"), &mut c.alpha_d);
    optional(v, &format!("{prefix}_ANOMALY"), &mut c.cutoff_anomaly);
}

fn optional(v: &mut dyn FieldVisitor, key: &str, value: &mut Option<f64>) {
    let mut present = value.is_some();
    let mut x = value.unwrap_or(0.0);
    v.flag(&format!("{key}_SET"), &mut present);
    v.scalar(key, &mut x);
    *value = present.then_some(x);
}

// ---------------------------------------------------------------------------
// Schema visitor
// ---------------------------------------------------------------------------

/// Receives each persisted field. Writers read the value, readers may
/// overwrite it.
pub trait FieldVisitor {
    fn scalar(&mut self, key: &str, value: &mut f64);
    fn flag(&mut self, key: &str, value: &mut bool);
    fn count(&mut self, key: &str, value: &mut usize);
    fn vector(&mut self, key: &str, value: &mut Vector3<f64>);
    fn matrix(&mut self, key: &str, value: &mut Matrix3<f64>);
    fn phase(&mut self, key: &str, value: &mut Timebase);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collects keys in visit order.
    #[derive(Default)]
    struct Keys(Vec<String>);

    impl FieldVisitor for Keys {
        fn scalar(&mut self, key: &str, _: &mut f64) {
            self.0.push(key.into());
        }
        fn flag(&mut self, key: &str, _: &mut bool) {
            self.0.push(key.into());
        }
        fn count(&mut self, key: &str, _: &mut usize) {
            self.0.push(key.into());
        }
        fn vector(&mut self, key: &str, _: &mut Vector3<f64>) {
            self.0.push(key.into());
        }
        fn matrix(&mut self, key: &str, _: &mut Matrix3<f64>) {
            self.0.push(key.into());
        }
        fn phase(&mut self, key: &str, _: &mut Timebase) {
            self.0.push(key.into());
        }
    }

    #[test]
    fn schema_keys_are_unique() {
        let mut st = GuidanceState::new(&VehicleConfig::saturn_v());
        let mut keys = Keys::default();
        st.fields(&mut keys);
        let mut sorted = keys.0.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), keys.0.len());
        assert!(keys.0.contains(&"CURSOR_TB6A".to_string()));
        assert!(keys.0.contains(&"ARC2_TAU".to_string()));
    }

    #[test]
    fn fresh_state_sits_on_the_pad() {
        let cfg = VehicleConfig::saturn_ib();
        let st = GuidanceState::new(&cfg);
        assert_eq!(st.phase, Timebase::PreLaunch);
        assert_eq!(st.stage, 1);
        assert!((st.nav.position.x - cfg.launch.radius).abs() < 1e-6);
        assert!((st.attitude.commanded.x - cfg.roll_offset()).abs() < 1e-12);
        assert_eq!(st.igm.arcs.arcs.len(), 1);
    }
}
