// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Token acquisition plus the service root and health check.
// Route Prefix: no /api prefix (e.g., /auth/*, /health)

pub mod auth;
pub mod health;

pub use health::{health, root};
