pub mod event;
pub mod host;
pub mod integrator;
pub mod runner;

pub use event::{EventKind, SimEvent};
pub use host::{FaultPlan, SimVehicle};
pub use integrator::rk4_step;
pub use runner::{fly, launch_vehicle, FlightRecord, RunConfig, Sample};
