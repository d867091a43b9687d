pub mod navigator;

pub use navigator::{NavMode, NavOutput, NavState, Navigator};
