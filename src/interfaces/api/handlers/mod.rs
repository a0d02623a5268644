pub mod auth_handler;
pub mod security_handler;
pub mod session_handler;
