use axum::http::{HeaderMap, HeaderName, StatusCode, header};
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, error};
use url::Url;

use super::domain_policy_services::DomainPolicy;
use super::upstream_services::{UpstreamClient, UpstreamRequest};
use crate::server::error::{AppResult, Error};

/// the only upstream headers that make it to the player
pub const COPIED_HEADERS: [HeaderName; 5] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
    header::CONTENT_ENCODING,
];

/// aes-128 keys are 16 bytes, anything near this is not a key
const MAX_KEY_BYTES: usize = 1024 * 1024;

/// an upstream response on its way to the client, body still unread
pub struct UpstreamStream {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BoxStream<'static, Result<Bytes, std::io::Error>>,
}

pub fn copy_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for name in COPIED_HEADERS {
        if let Some(value) = upstream.get(&name) {
            headers.insert(name, value.clone());
        }
    }
    headers
}

/// body read errors come out of the session as io errors wrapping the reqwest one
pub fn body_error(err: std::io::Error) -> Error {
    match err.into_inner().map(|inner| inner.downcast::<reqwest::Error>()) {
        Some(Ok(reqwest_err)) => Error::from(*reqwest_err),
        Some(Err(other)) => Error::Network(other.to_string()),
        None => Error::Network("upstream body closed".to_string()),
    }
}

#[derive(Clone)]
pub struct StreamService {
    upstream: UpstreamClient,
}

impl StreamService {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }

    /// opens the segment upstream and hands back its body unread. the range header goes through
    /// as-is and the upstream status (200 or 206) is kept
    pub async fn segment(
        &self,
        target: &Url,
        user_agent: &str,
        range: Option<&str>,
        policy: &DomainPolicy,
    ) -> AppResult<UpstreamStream> {
        let response = self
            .upstream
            .get(UpstreamRequest {
                url: target,
                user_agent,
                accept: "*/*",
                policy,
                range,
                no_cache: false,
                failure_message: "Failed to fetch segment from source",
            })
            .await?;

        let status = response.status();
        let headers = copy_headers(response.headers());

        debug!("Streaming segment {} ({})", target, status);

        Ok(UpstreamStream {
            status,
            headers,
            body: self.upstream.open_session(response).boxed(),
        })
    }

    /// keys are tiny so they're read whole, still through a session so the reader is released
    /// the same way a segment's is
    pub async fn key(
        &self,
        target: &Url,
        user_agent: &str,
        policy: &DomainPolicy,
    ) -> AppResult<Bytes> {
        let response = self
            .upstream
            .get(UpstreamRequest {
                url: target,
                user_agent,
                accept: "application/octet-stream, */*",
                policy,
                range: None,
                no_cache: false,
                failure_message: "Failed to fetch key",
            })
            .await?;

        let mut session = self.upstream.open_session(response);
        let mut key = BytesMut::new();

        while let Some(chunk) = session.next().await {
            key.extend_from_slice(&chunk.map_err(body_error)?);

            if key.len() > MAX_KEY_BYTES {
                error!("Key at {} is over {} bytes, refusing it", target, MAX_KEY_BYTES);
                return Err(Error::Upstream {
                    status: StatusCode::BAD_GATEWAY.as_u16(),
                    message: "Failed to fetch key",
                });
            }
        }

        debug!("Fetched key {} ({} bytes)", target, key.len());

        Ok(key.freeze())
    }
}
