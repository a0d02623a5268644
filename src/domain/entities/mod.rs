pub mod blocked_ip;
pub mod ip_security_event;
pub mod refresh_token;
pub mod session;
pub mod two_factor_challenge;
pub mod user;
