pub mod elements;
pub mod frames;

pub use elements::OrbitElements;
pub use frames::LaunchFrame;
