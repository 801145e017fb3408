use axum::Extension;
use axum::extract::{FromRequestParts, Query};
use axum::http::HeaderMap;
use axum::http::header::{ACCEPT_ENCODING, HOST, RANGE, REFERER};
use axum::http::request::Parts;
use tracing::debug;
use url::Url;

use crate::server::dtos::proxy_dto::ProxyQuery;
use crate::server::error::Error;
use crate::server::services::ProxyServices;
use crate::server::services::source_services::ResolvedSource;
use crate::server::utils::url_utils::decode_url_param;

/// where the proxy routes are mounted
pub const PROXY_PREFIX: &str = "/api/proxy";

/// what the player asked for, fixed for the rest of the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub target_url: Url,
    pub source_key: String,
    pub allow_direct_cors: bool,
    pub inbound_range: Option<String>,
}

/// a validated proxy request with its source already resolved. if this extracts, the source is
/// known and enabled; nothing upstream has been touched yet
pub struct ProxyContext {
    pub request: ProxyRequest,
    pub source: ResolvedSource,
    /// absolute base of this proxy as the player sees it, rewritten manifests link to it
    pub proxy_base: String,
    pub accept_encoding: Option<String>,
    pub services: ProxyServices,
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// configured base wins, otherwise it's put together from the forwarded headers the load
/// balancer sets, falling back to the referer's scheme and the plain host header
pub fn proxy_base(headers: &HeaderMap, configured: Option<&str>) -> String {
    if let Some(configured) = configured {
        return configured.trim_end_matches('/').to_string();
    }

    let proto = header_value(headers, "x-forwarded-proto")
        .map(str::to_string)
        .or_else(|| {
            header_value(headers, REFERER.as_str())
                .and_then(|referer| Url::parse(referer).ok())
                .map(|referer| referer.scheme().to_string())
        })
        .unwrap_or_else(|| "http".to_string());

    let host = header_value(headers, "x-forwarded-host")
        .or_else(|| header_value(headers, HOST.as_str()))
        .unwrap_or("localhost");

    format!("{}://{}{}", proto, host, PROXY_PREFIX)
}

impl<S> FromRequestParts<S> for ProxyContext
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(services): Extension<ProxyServices> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|err| Error::InternalServerErrorWithContext(err.to_string()))?;

        let Query(query): Query<ProxyQuery> = Query::from_request_parts(parts, state)
            .await
            .map_err(|err| Error::BadRequest(err.body_text()))?;

        let url_param = query
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(Error::MissingParameter("url"))?;

        let source_key = query
            .source
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(Error::MissingParameter("source"))?;

        let target_url = decode_url_param(url_param)?;

        let source = services.sources.resolve(source_key).await?;

        let proxy_base = proxy_base(&parts.headers, services.config.public_base_url.as_deref());

        let inbound_range = parts
            .headers
            .get(RANGE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let accept_encoding = parts
            .headers
            .get(ACCEPT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        debug!(
            "Proxy request for {} (source {}, range {:?})",
            target_url, source.key, inbound_range
        );

        Ok(ProxyContext {
            request: ProxyRequest {
                target_url,
                source_key: source_key.to_string(),
                allow_direct_cors: query.allow_direct_cors(),
                inbound_range,
            },
            source,
            proxy_base,
            accept_encoding,
            services,
        })
    }
}
