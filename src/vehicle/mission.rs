use super::stage::Stage;
use super::VehicleKind;
use crate::sequencer::{Subsystem, SwitchCommand};

// ---------------------------------------------------------------------------
// Mission: physical stage stack plus switch-selector wiring
// ---------------------------------------------------------------------------

/// What the host vehicle does when a switch-selector command reaches it.
/// Stage numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    Ignite(usize),
    Cutoff(usize),
    /// Shut down some engines of a stage (e.g. inboard or centre engine).
    EngineCutoff { stage: usize, engines: u32 },
    Separate(usize),
}

#[derive(Debug, Clone)]
pub struct Mission {
    pub name: String,
    pub stages: Vec<Stage>,
    pub wiring: Vec<(SwitchCommand, HostAction)>,
    pub hold_down: f64, // s between reference release and liftoff
}

impl Mission {
    /// Total wet mass of all stages combined.
    pub fn total_mass(&self) -> f64 {
        self.stages.iter().map(|s| s.total_mass()).sum()
    }

    /// Total ideal delta-v (each stage computed with upper stages as payload).
    pub fn total_delta_v(&self) -> f64 {
        let mut dv = 0.0;
        for i in 0..self.stages.len() {
            let payload: f64 = self.stages[i + 1..].iter().map(|s| s.total_mass()).sum();
            dv += self.stages[i].delta_v(payload);
        }
        dv
    }

    pub fn stage(&self, number: usize) -> Option<&Stage> {
        number.checked_sub(1).and_then(|i| self.stages.get(i))
    }

    pub fn action(&self, command: SwitchCommand) -> Option<HostAction> {
        self.wiring
            .iter()
            .find(|(c, _)| *c == command)
            .map(|(_, a)| *a)
    }

    pub fn preset(kind: VehicleKind) -> Self {
        match kind {
            VehicleKind::SaturnIb => presets::saturn_ib(),
            VehicleKind::SaturnV => presets::saturn_v(),
        }
    }
}

// ---------------------------------------------------------------------------
// Preset missions
// ---------------------------------------------------------------------------

pub mod presets {
    use super::*;

    const fn cmd(subsystem: Subsystem, channel: u16) -> SwitchCommand {
        SwitchCommand::new(subsystem, channel)
    }

    pub fn saturn_ib() -> Mission {
        Mission {
            name: "Saturn IB".into(),
            stages: vec![
                Stage {
                    name: "S-IB".into(),
                    dry_mass: 42_000.0,
                    propellant_mass: 407_000.0,
                    thrust: 7.3e6,
                    isp: 285.0,
                    engines: 8,
                    cd: 0.45,
                    area: 34.2,
                    depletion_level: 0.03,
                },
                Stage {
                    name: "S-IVB".into(),
                    dry_mass: 26_000.0,
                    propellant_mass: 105_000.0,
                    thrust: 1.0e6,
                    isp: 424.0,
                    engines: 1,
                    cd: 0.3,
                    area: 34.3,
                    depletion_level: 0.005,
                },
            ],
            wiring: vec![
                (cmd(Subsystem::FirstStage, 5), HostAction::EngineCutoff { stage: 1, engines: 4 }),
                (cmd(Subsystem::FirstStage, 6), HostAction::Cutoff(1)),
                (cmd(Subsystem::InstrumentUnit, 20), HostAction::Separate(1)),
                (cmd(Subsystem::SecondStage, 10), HostAction::Ignite(2)),
                (cmd(Subsystem::SecondStage, 11), HostAction::Cutoff(2)),
            ],
            hold_down: 5.0,
        }
    }

    pub fn saturn_v() -> Mission {
        Mission {
            name: "Saturn V".into(),
            stages: vec![
                Stage {
                    name: "S-IC".into(),
                    dry_mass: 140_000.0,
                    propellant_mass: 2_150_000.0,
                    thrust: 35.1e6,
                    isp: 283.0,
                    engines: 5,
                    cd: 0.45,
                    area: 113.0,
                    depletion_level: 0.02,
                },
                Stage {
                    name: "S-II".into(),
                    dry_mass: 40_000.0,
                    propellant_mass: 450_000.0,
                    thrust: 5.114e6,
                    isp: 424.0,
                    engines: 5,
                    cd: 0.3,
                    area: 78.5,
                    depletion_level: 0.01,
                },
                Stage {
                    name: "S-IVB".into(),
                    dry_mass: 52_000.0,
                    propellant_mass: 118_000.0,
                    thrust: 1.0e6,
                    isp: 423.6,
                    engines: 1,
                    cd: 0.3,
                    area: 34.3,
                    depletion_level: 0.005,
                },
            ],
            wiring: vec![
                (cmd(Subsystem::FirstStage, 5), HostAction::EngineCutoff { stage: 1, engines: 1 }),
                (cmd(Subsystem::FirstStage, 6), HostAction::Cutoff(1)),
                (cmd(Subsystem::InstrumentUnit, 20), HostAction::Separate(1)),
                (cmd(Subsystem::SecondStage, 10), HostAction::Ignite(2)),
                (cmd(Subsystem::SecondStage, 11), HostAction::Cutoff(2)),
                (cmd(Subsystem::InstrumentUnit, 21), HostAction::Separate(2)),
                (cmd(Subsystem::ThirdStage, 10), HostAction::Ignite(3)),
                (cmd(Subsystem::ThirdStage, 11), HostAction::Cutoff(3)),
            ],
            hold_down: 5.0,
        }
    }
}
