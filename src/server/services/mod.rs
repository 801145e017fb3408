pub mod domain_policy_services;
pub mod manifest_services;
pub mod proxy_services;
pub mod source_services;
pub mod stream_services;
pub mod stream_session;
pub mod upstream_services;

pub use proxy_services::ProxyServices;
