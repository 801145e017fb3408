// the three routes a player talks to. manifests are fetched whole and rewritten, segments and
// keys go straight through
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use metrics::counter;
use tracing::{debug, error};

use crate::server::{
    error::{AppResult, Error},
    extractors::ProxyContext,
    services::{
        domain_policy_services::FetchKind, manifest_services::ManifestBody,
        stream_services::UpstreamStream,
    },
    utils::{
        cors_utils::{KEY_METHODS, MEDIA_METHODS, apply_cors, preflight},
        encoding_utils::ContentEncoding,
        manifest_utils::{RewriteOptions, rewrite_manifest},
        url_utils::manifest_base,
    },
};

pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const KEY_USER_AGENT: &str = "AptvPlayer/1.4.10";

pub struct ProxyController;

impl ProxyController {
    pub fn app() -> Router {
        Router::new()
            .route("/m3u8", get(Self::manifest).options(Self::media_options))
            .route("/segment", get(Self::segment).options(Self::media_options))
            .route("/key", get(Self::key).options(Self::key_options))
    }

    fn record(operation: &'static str, result: &AppResult<Response>) {
        counter!("proxy_requests_total", "operation" => operation).increment(1);
        if let Err(e) = result {
            counter!("proxy_request_failures_total", "operation" => operation, "kind" => e.kind())
                .increment(1);
        }
    }

    async fn manifest(ctx: ProxyContext) -> AppResult<Response> {
        let result = Self::proxy_manifest(ctx).await;
        Self::record("manifest", &result);
        result
    }

    async fn segment(ctx: ProxyContext) -> AppResult<Response> {
        let result = Self::proxy_segment(ctx).await;
        Self::record("segment", &result);
        result
    }

    async fn key(ctx: ProxyContext) -> AppResult<Response> {
        let result = Self::proxy_key(ctx).await;
        Self::record("key", &result);
        result
    }

    async fn media_options() -> Response {
        preflight(MEDIA_METHODS)
    }

    async fn key_options() -> Response {
        preflight(KEY_METHODS)
    }

    async fn proxy_manifest(ctx: ProxyContext) -> AppResult<Response> {
        let ProxyContext {
            request,
            source,
            proxy_base,
            accept_encoding,
            services,
        } = ctx;

        let user_agent = source
            .user_agent
            .as_deref()
            .unwrap_or(&services.config.default_user_agent);
        let policy = services
            .policies
            .resolve(request.target_url.as_str(), FetchKind::Manifest);

        let body = services
            .manifests
            .fetch(&request.target_url, user_agent, &policy)
            .await?;

        match body {
            ManifestBody::Playlist { text, final_url } => {
                // relative references follow the redirect, not the url the player asked for
                let base_url = manifest_base(&final_url);
                let rewritten = rewrite_manifest(
                    &text,
                    &RewriteOptions {
                        base_url: &base_url,
                        proxy_base: &proxy_base,
                        source_key: &request.source_key,
                        allow_direct_cors: request.allow_direct_cors,
                    },
                );
                debug!(
                    "Processed M3U8 from {}, response length: {} bytes",
                    final_url,
                    rewritten.len()
                );

                Self::build_manifest_response(&rewritten, accept_encoding.as_deref())
            }
            ManifestBody::Passthrough(stream) => {
                debug!("{} is not a playlist, streaming it raw", request.target_url);
                Ok(Self::build_passthrough_response(stream))
            }
        }
    }

    async fn proxy_segment(ctx: ProxyContext) -> AppResult<Response> {
        let ProxyContext {
            request,
            source,
            services,
            ..
        } = ctx;

        let user_agent = source
            .user_agent
            .as_deref()
            .unwrap_or(&services.config.default_user_agent);
        let policy = services
            .policies
            .resolve(request.target_url.as_str(), FetchKind::Segment);

        let stream = services
            .streams
            .segment(
                &request.target_url,
                user_agent,
                request.inbound_range.as_deref(),
                &policy,
            )
            .await?;

        Ok(Self::build_segment_response(stream))
    }

    async fn proxy_key(ctx: ProxyContext) -> AppResult<Response> {
        let ProxyContext {
            request,
            source,
            services,
            ..
        } = ctx;

        let user_agent = source.user_agent.as_deref().unwrap_or(KEY_USER_AGENT);
        let policy = services
            .policies
            .resolve(request.target_url.as_str(), FetchKind::Key);

        let key = services
            .streams
            .key(&request.target_url, user_agent, &policy)
            .await?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=3600"),
        );
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(key.len()));
        apply_cors(&mut headers, KEY_METHODS);

        Ok((StatusCode::OK, headers, key).into_response())
    }

    /// build m3u8 response with no-cache headers and optional compression
    fn build_manifest_response(body: &str, accept_encoding: Option<&str>) -> AppResult<Response> {
        let encoding = ContentEncoding::from_accept_encoding(accept_encoding);

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(MANIFEST_CONTENT_TYPE),
        );
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
        apply_cors(&mut headers, MEDIA_METHODS);

        let response_body: Vec<u8> = match encoding.as_header_value() {
            Some(encoding_header) => {
                let compressed = encoding.compress(body.as_bytes()).map_err(|e| {
                    error!("Failed to compress response with {:?}: {}", encoding, e);
                    Error::InternalServerErrorWithContext("Failed to compress response".to_string())
                })?;
                debug!(
                    "Compressed M3U8 with {:?} from {} to {} bytes",
                    encoding,
                    body.len(),
                    compressed.len()
                );
                headers.insert(
                    header::CONTENT_ENCODING,
                    HeaderValue::from_static(encoding_header),
                );
                compressed
            }
            None => body.as_bytes().to_vec(),
        };

        headers.insert(
            header::CONTENT_LENGTH,
            HeaderValue::from(response_body.len()),
        );

        Ok((StatusCode::OK, headers, response_body).into_response())
    }

    /// segment response keeps the upstream status so 206 + content-range survive untouched
    fn build_segment_response(stream: UpstreamStream) -> Response {
        let UpstreamStream {
            status,
            mut headers,
            body,
        } = stream;

        headers
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("video/mp2t"));
        headers
            .entry(header::ACCEPT_RANGES)
            .or_insert(HeaderValue::from_static("bytes"));
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=86400"),
        );
        apply_cors(&mut headers, MEDIA_METHODS);

        (status, headers, Body::from_stream(body)).into_response()
    }

    /// whatever the m3u8 url turned out to be, sent on as-is
    fn build_passthrough_response(stream: UpstreamStream) -> Response {
        let UpstreamStream {
            status,
            mut headers,
            body,
        } = stream;

        headers
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(MANIFEST_CONTENT_TYPE));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        apply_cors(&mut headers, MEDIA_METHODS);

        (status, headers, Body::from_stream(body)).into_response()
    }
}
