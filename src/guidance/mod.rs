pub mod attitude;
pub mod hsl;
pub mod igm;
pub mod integrals;
pub mod pitch_program;
pub mod targeting;

pub use attitude::{AttitudeLimits, AttitudeState};
pub use hsl::CutoffPredictor;
pub use igm::{GuidanceOutput, Igm, SteeringLaw, TerminalState};
pub use integrals::{BurnArc, BurnArcs, StageIntegrals};
pub use pitch_program::{EngineOutModel, PitchProgram, PitchSegment};
pub use targeting::{OrbitTarget, TargetConic, TargetUpdate, TliOpportunity};
