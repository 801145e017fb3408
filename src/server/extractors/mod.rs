mod proxy_request_extractor;

pub use proxy_request_extractor::*;
