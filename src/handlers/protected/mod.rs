// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Route Prefix: /api/*
// Middleware: jwt_auth → validate_tenant → validate_user, so every handler can
// extract `TenantPool`, `ValidatedTenant` and `ValidatedUser`. Write access is
// checked per handler with `require_role`.

pub mod auth;
pub mod clients;
pub mod contracts;
pub mod dashboard;
pub mod financials;
pub mod hardware;
pub mod integrations;
pub mod users;
