pub mod maintenance_dto;
pub mod security_dto;
pub mod session_dto;
pub mod user_dto;
