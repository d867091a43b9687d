//! Launch-vehicle digital computer simulation.
//!
//! The [`timebase::GuidanceComputer`] runs one tick at a time against a
//! [`vehicle::HostVehicle`]: it sequences mission phases, fires
//! switch-selector commands, navigates from sensed velocity increments and
//! steers with a pitch program or the iterative guidance mode. The [`sim`]
//! module supplies a point-mass host vehicle to fly it against.

pub mod error;
pub mod guidance;
pub mod io;
pub mod navigation;
pub mod orbital;
pub mod physics;
pub mod sequencer;
pub mod sim;
pub mod sink;
pub mod state;
pub mod timebase;
pub mod vehicle;

pub use error::{ConfigError, GuidanceFault, LoadError};
pub use timebase::{GuidanceComputer, TickOutput, Timebase};
pub use vehicle::{HostVehicle, VehicleConfig};
