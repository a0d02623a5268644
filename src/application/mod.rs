pub mod dtos;
pub mod ports;
pub mod services;

pub use ports::auth_ports::{SessionNotifier, TwoFactorCodeSender};
pub use ports::maintenance_ports::CleanupTask;
