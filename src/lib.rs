pub mod application;
pub mod common;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;

pub use application::services::{
    AuthApplicationService, IpSecurityService, SessionManagementService, TokenService, TwoFactorService,
};
pub use common::config::AppConfig;
pub use common::errors::{DomainError, ErrorKind};
