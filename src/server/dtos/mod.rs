pub mod health_dto;
pub mod proxy_dto;
