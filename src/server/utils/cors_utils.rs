use axum::{
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

pub const ALLOW_HEADERS: &str = "Content-Type, Range, Origin, Accept, User-Agent, Referer";
pub const EXPOSE_HEADERS: &str = "Content-Length, Content-Range, Accept-Ranges, Content-Type";

/// manifests and segments answer HEAD too, keys don't
pub const MEDIA_METHODS: &str = "GET, HEAD, OPTIONS";
pub const KEY_METHODS: &str = "GET, OPTIONS";

/// players load these from arbitrary pages so every response is open to every origin
pub fn apply_cors(headers: &mut HeaderMap, methods: &'static str) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(methods),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSE_HEADERS),
    );
}

/// pre-flight answer: 200, cors headers, no body
pub fn preflight(methods: &'static str) -> Response {
    let mut headers = HeaderMap::new();
    apply_cors(&mut headers, methods);
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));

    (StatusCode::OK, headers).into_response()
}
