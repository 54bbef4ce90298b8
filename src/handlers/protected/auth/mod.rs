pub mod session;

pub use session::password_put as session_password;
pub use session::whoami as session_whoami;
