pub mod auth_factory;
pub mod clock;
pub mod config;
pub mod db;
pub mod di;
pub mod errors;
