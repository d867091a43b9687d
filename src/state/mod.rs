pub mod guidance_state;
pub mod persistence;

pub use guidance_state::{Excursion, FieldVisitor, FirstStageFailure, GuidanceState, RestartState};
pub use persistence::{deserialize, deserialize_onto, serialize};
