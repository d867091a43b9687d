use nalgebra::Vector3;

use crate::guidance::targeting::TargetUpdate;
use crate::sequencer::SwitchCommand;

// ---------------------------------------------------------------------------
// Host interface
// ---------------------------------------------------------------------------

/// Discrete inputs sampled once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Discretes {
    pub guidance_reference_release: bool,
    pub liftoff: bool,
    pub propellant_depletion: bool,
    pub engine_out: bool,
    pub separation: bool,
    pub manual_override: bool,
    pub restart_inhibit: bool,
    pub burner_malfunction: bool,
    pub abort: bool,
    pub impact_maneuver: bool,
}

/// Everything the guidance computer reads from the vehicle in one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Telemetry {
    pub mission_time: f64,
    /// Platform-frame velocity increment sensed since the previous tick.
    pub delta_v: Vector3<f64>,
    /// Estimated attitude (roll, pitch, yaw) from the platform gimbals.
    pub attitude: Vector3<f64>,
    pub attitude_reference_failed: bool,
    pub discretes: Discretes,
    pub target_update: Option<TargetUpdate>,
}

/// The vehicle as seen by the guidance computer.
pub trait HostVehicle {
    fn telemetry(&mut self) -> Telemetry;
    fn switch_selector(&mut self, command: SwitchCommand);
    fn attitude_error(&mut self, error: Vector3<f64>);
    fn set_stage(&mut self, stage: usize);
}
