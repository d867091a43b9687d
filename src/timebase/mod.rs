pub mod machine;
pub mod phase;

pub use machine::{GuidanceComputer, TickOutput};
pub use phase::Timebase;
