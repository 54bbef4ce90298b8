// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (JWT + tenant + user validation)
pub mod public; // /, /health, /auth/*
pub mod protected; // /api/*
