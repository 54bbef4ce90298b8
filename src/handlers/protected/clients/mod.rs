// Client records plus the per-client account team
pub mod client;
pub mod team;

pub use client::*;
pub use team::*;
