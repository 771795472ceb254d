pub mod board;
pub mod camera;
pub mod capture;
pub mod data_loader;
pub mod detected_points;
pub mod error;
pub mod io;
pub mod optimization;
pub mod rig;
pub mod synthetic;
pub mod task;
pub mod types;
pub mod visualization;

pub use error::{CalibError, Result};
