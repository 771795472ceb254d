pub mod factors;
pub mod linear;
pub mod stereo;

pub use factors::*;
pub use linear::*;
pub use stereo::*;
