pub mod asset;
pub mod assignment;

pub use asset::*;
pub use assignment::*;
