use axum::http::{StatusCode, header};
use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, error};
use url::Url;

use super::domain_policy_services::DomainPolicy;
use super::stream_services::{UpstreamStream, body_error, copy_headers};
use super::upstream_services::{UpstreamClient, UpstreamRequest};
use crate::server::{
    error::{AppResult, Error},
    utils::encoding_utils::{decode_body, is_encoded},
};

const MANIFEST_ACCEPT: &str =
    "application/vnd.apple.mpegurl,application/x-mpegURL,application/octet-stream,*/*";
const MANIFEST_EXTENSION: &str = ".m3u8";
const MANIFEST_MAGIC: &[u8] = b"#EXTM3U";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// playlists are text, even long vod ones stay well under this
pub const MAX_MANIFEST_BYTES: usize = 4 * 1024 * 1024;

/// how much we can tell about a response from its headers and url alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Manifest,
    /// could go either way, the first bytes decide
    Sniff,
    Binary,
}

pub fn has_manifest_extension(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(MANIFEST_EXTENSION)
}

/// mpegurl content types are manifests. octet-stream, or anything requested as `.m3u8`, gets
/// sniffed since origins love both mislabelling playlists and redirecting playlists to video
pub fn classify(content_type: &str, requested: &Url) -> Classification {
    let content_type = content_type.to_ascii_lowercase();

    if content_type.contains("mpegurl") {
        Classification::Manifest
    } else if content_type.contains("octet-stream") || has_manifest_extension(requested) {
        Classification::Sniff
    } else {
        Classification::Binary
    }
}

/// true when the body starts like a playlist, leading bom and whitespace allowed
pub fn looks_like_manifest(prefix: &[u8]) -> bool {
    let prefix = prefix.strip_prefix(UTF8_BOM).unwrap_or(prefix);
    let start = prefix
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(prefix.len());

    prefix[start..].starts_with(MANIFEST_MAGIC)
}

/// reads until enough non-whitespace bytes are in to tell a playlist from anything else, or the
/// body ends. chunks can be split anywhere, including inside the bom
pub async fn read_sniff_prefix<S>(body: &mut S) -> Result<BytesMut, std::io::Error>
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Unpin,
{
    let needed = UTF8_BOM.len() + MANIFEST_MAGIC.len();
    let mut prefix = BytesMut::new();

    while prefix.iter().filter(|b| !b.is_ascii_whitespace()).count() < needed
        && prefix.len() < MAX_MANIFEST_BYTES
    {
        match body.next().await {
            Some(chunk) => prefix.extend_from_slice(&chunk?),
            None => break,
        }
    }

    Ok(prefix)
}

pub enum ManifestBody {
    /// a playlist to rewrite. `final_url` is where the origin actually served it from after
    /// redirects, relative references resolve against that
    Playlist { text: String, final_url: Url },
    /// not a playlist after all, goes to the client untouched
    Passthrough(UpstreamStream),
}

#[derive(Clone)]
pub struct ManifestService {
    upstream: UpstreamClient,
}

impl ManifestService {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }

    pub async fn fetch(
        &self,
        target: &Url,
        user_agent: &str,
        policy: &DomainPolicy,
    ) -> AppResult<ManifestBody> {
        let response = self
            .upstream
            .get(UpstreamRequest {
                url: target,
                user_agent,
                accept: MANIFEST_ACCEPT,
                policy,
                range: None,
                no_cache: true,
                failure_message: "Failed to fetch m3u8",
            })
            .await?;

        let final_url = response.url().clone();
        let upstream_headers = response.headers().clone();
        let content_type = upstream_headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let content_encoding = upstream_headers
            .get(header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase());

        let mut classification = classify(&content_type, target);
        // can't sniff compressed bytes, the extension has the last word
        if classification == Classification::Sniff && is_encoded(content_encoding.as_deref()) {
            classification = if has_manifest_extension(target) {
                Classification::Manifest
            } else {
                Classification::Binary
            };
        }

        debug!(
            "Content-Type: {}, Encoding: {:?}, classified as {:?}",
            content_type, content_encoding, classification
        );

        let mut session = self.upstream.open_session(response);

        let prefix = match classification {
            Classification::Manifest => Vec::new(),
            Classification::Binary => {
                return Ok(ManifestBody::Passthrough(UpstreamStream {
                    status: StatusCode::OK,
                    headers: copy_headers(&upstream_headers),
                    body: session.boxed(),
                }));
            }
            Classification::Sniff => {
                let prefix = read_sniff_prefix(&mut session).await.map_err(body_error)?;
                if !prefix.is_empty() && !looks_like_manifest(&prefix) {
                    debug!("{} doesn't start like a playlist, passing it through", final_url);
                    let prefix = prefix.freeze();
                    let body = stream::once(async move { Ok(prefix) }).chain(session);
                    return Ok(ManifestBody::Passthrough(UpstreamStream {
                        status: StatusCode::OK,
                        headers: copy_headers(&upstream_headers),
                        body: body.boxed(),
                    }));
                }
                prefix.to_vec()
            }
        };

        let mut raw = prefix;
        while let Some(chunk) = session.next().await {
            raw.extend_from_slice(&chunk.map_err(body_error)?);

            if raw.len() > MAX_MANIFEST_BYTES {
                error!(
                    "Manifest at {} is over {} bytes, refusing it",
                    final_url, MAX_MANIFEST_BYTES
                );
                return Err(Error::Upstream {
                    status: StatusCode::BAD_GATEWAY.as_u16(),
                    message: "Failed to fetch m3u8",
                });
            }
        }
        debug!("Read {} manifest bytes from {}", raw.len(), final_url);

        let decoded = decode_body(content_encoding.as_deref(), raw)?;
        let text = String::from_utf8_lossy(&decoded).into_owned();

        Ok(ManifestBody::Playlist { text, final_url })
    }
}
