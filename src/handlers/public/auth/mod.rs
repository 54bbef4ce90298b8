// handlers/public/auth/mod.rs - Public authentication handlers
//
// Token acquisition endpoints. Every credential failure answers with the same
// 401 so a caller cannot discover tenants or emails.

pub mod login; // POST /auth/login/:tenant
pub mod refresh; // POST /auth/refresh

pub use login::login_post;
pub use refresh::refresh_post;
