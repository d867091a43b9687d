pub mod config;
pub mod host;
pub mod mission;
pub mod stage;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

pub use config::{BurnArcConfig, CyclePeriods, IgmConfig, PhaseBounds, VehicleConfig};
pub use host::{Discretes, HostVehicle, Telemetry};
pub use mission::{HostAction, Mission};
pub use stage::Stage;

/// Vehicle family. Selects presets and the built-in command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive, serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum VehicleKind {
    SaturnIb,
    SaturnV,
}
