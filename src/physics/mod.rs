pub mod aerodynamics;
pub mod atmosphere;
pub mod gravity;

pub use aerodynamics::DragModel;
pub use gravity::{ZonalGravity, G0, MU_EARTH, OMEGA_EARTH, R_EARTH_EQ};
