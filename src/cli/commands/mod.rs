pub mod integrations;
pub mod keygen;
pub mod migrate;
pub mod tenant;
pub mod user;
