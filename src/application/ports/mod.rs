pub mod auth_ports;
pub mod maintenance_ports;
