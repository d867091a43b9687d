use thiserror::Error;

// ---------------------------------------------------------------------------
// Guidance faults (recoverable, escalate to guidance-reference failure)
// ---------------------------------------------------------------------------

/// Numeric or reference problem detected inside a guidance cycle.
///
/// None of these terminate the simulation. The timebase machine latches a
/// guidance-reference failure and keeps sequencing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuidanceFault {
    #[error("burn arc depleted: tau {tau:.3} s, remaining {remaining:.3} s")]
    Depleted { tau: f64, remaining: f64 },
    #[error("non-finite value in {stage}")]
    NonFinite { stage: &'static str },
    #[error("velocity to be gained vanished (L = {0:e})")]
    NoVelocityToGain(f64),
    #[error("attitude reference lost")]
    AttitudeReference,
}

// ---------------------------------------------------------------------------
// Initialisation-time errors
// ---------------------------------------------------------------------------

/// Failure to read a configuration source at initialisation.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid vehicle configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Vehicle configuration that violates a structural invariant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("vehicle has no burn arcs")]
    NoBurnArcs,
    #[error("burn arc {0} has non-positive exhaust velocity")]
    ExhaustVelocity(usize),
    #[error("burn arc {0} has non-positive mass flow")]
    MassFlow(usize),
    #[error("{0} cycle period must be > 0")]
    CyclePeriod(&'static str),
    #[error("chi-bar time-to-go ({chi_bar}) must be below the terminal freeze time-to-go ({freeze})")]
    Thresholds { chi_bar: f64, freeze: f64 },
    #[error("restart-capable vehicle needs a restart burn arc")]
    MissingRestartArc,
    #[error("TLI opportunity {0} has mismatched or empty table columns")]
    OpportunityTable(usize),
}
