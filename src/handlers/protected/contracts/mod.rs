pub mod contract;
pub mod scope;

pub use contract::*;
pub use scope::*;
