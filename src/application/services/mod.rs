pub mod auth_application_service;
pub mod cleanup_tasks;
pub mod ip_security_service;
pub mod session_management_service;
pub mod token_service;
pub mod two_factor_service;

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod session_management_service_test;

pub use auth_application_service::AuthApplicationService;
pub use ip_security_service::IpSecurityService;
pub use session_management_service::SessionManagementService;
pub use token_service::TokenService;
pub use two_factor_service::TwoFactorService;
