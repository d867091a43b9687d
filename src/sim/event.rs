use std::fmt;

use crate::timebase::Timebase;

// ---------------------------------------------------------------------------
// Host-side flight events
// ---------------------------------------------------------------------------

/// Kinds of things the simulated vehicle reports about itself.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    ReferenceRelease,
    Liftoff,
    Ignition { stage: usize },
    Cutoff { stage: usize },
    EnginesOut { stage: usize, engines: u32 },
    Depletion { stage: usize },
    Separation { stage: usize },
    Phase(Timebase),
    Impact,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::ReferenceRelease => write!(f, "guidance reference release"),
            EventKind::Liftoff => write!(f, "liftoff"),
            EventKind::Ignition { stage } => write!(f, "stage {stage} ignition"),
            EventKind::Cutoff { stage } => write!(f, "stage {stage} cutoff"),
            EventKind::EnginesOut { stage, engines } => write!(f, "stage {stage}: {engines} engine(s) out"),
            EventKind::Depletion { stage } => write!(f, "stage {stage} propellant depleted"),
            EventKind::Separation { stage } => write!(f, "stage {stage} separation"),
            EventKind::Phase(tb) => write!(f, "{tb}"),
            EventKind::Impact => write!(f, "impact"),
        }
    }
}

/// A discrete event that occurred during the run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimEvent {
    pub time: f64, // s, host time
    pub kind: EventKind,
}

/// Time of the first event matching `pred`.
pub fn first_time(events: &[SimEvent], pred: impl Fn(&EventKind) -> bool) -> Option<f64> {
    events.iter().find(|e| pred(&e.kind)).map(|e| e.time)
}
