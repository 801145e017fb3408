use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use tracing::{debug, error};
use url::Url;

use crate::server::error::{AppResult, Error};

/// the three proxy routes a rewritten manifest can point back at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Manifest,
    Segment,
    Key,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Manifest => "m3u8",
            Self::Segment => "segment",
            Self::Key => "key",
        }
    }
}

/// builds absolute links into this proxy for a single source
#[derive(Debug, Clone, Copy)]
pub struct ProxyLinks<'a> {
    base: &'a str,
    source_key: &'a str,
}

impl<'a> ProxyLinks<'a> {
    pub fn new(base: &'a str, source_key: &'a str) -> Self {
        Self {
            base: base.trim_end_matches('/'),
            source_key,
        }
    }

    pub fn link(&self, endpoint: Endpoint, target: &str) -> String {
        format!(
            "{}/{}?url={}&source={}",
            self.base,
            endpoint.path(),
            urlencoding::encode(target),
            urlencoding::encode(self.source_key)
        )
    }
}

pub fn is_absolute(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// resolves a manifest reference against the manifest's directory. absolute references come back
/// untouched (not even normalized), None means the pair couldn't be joined
pub fn resolve_url(base: &str, reference: &str) -> Option<String> {
    if is_absolute(reference) {
        return Some(reference.to_string());
    }

    match Url::parse(base).and_then(|base| base.join(reference)) {
        Ok(resolved) => Some(resolved.to_string()),
        Err(e) => {
            error!("Failed to resolve: {} against {} - {}", reference, base, e);
            None
        }
    }
}

/// directory of the manifest url, which is what relative references are relative to. query and
/// fragment are dropped, the port is kept
pub fn manifest_base(manifest_url: &Url) -> String {
    let mut base = manifest_url.clone();
    base.set_query(None);
    base.set_fragment(None);

    let directory = match base.path().rfind('/') {
        Some(idx) => base.path()[..=idx].to_string(),
        None => "/".to_string(),
    };
    base.set_path(&directory);

    base.to_string()
}

/// the url param is normally percent encoded, but older players still send the url-safe base64 form,
/// padded or not, so both are accepted. the query extractor has already decoded it once, a plain
/// url is taken as-is so escapes inside the target survive
pub fn decode_url_param(url_param: &str) -> AppResult<Url> {
    let double_encoded = url_param.starts_with("http%3A") || url_param.starts_with("https%3A");

    let decoded = if is_absolute(url_param) {
        url_param.to_string()
    } else if double_encoded {
        urlencoding::decode(url_param)
            .map(|s| s.into_owned())
            .map_err(|e| {
                error!("Failed to decode URL: {}", e);
                Error::BadRequest("Invalid URL encoding".to_string())
            })?
    } else {
        let mut padded = url_param.to_string();
        while !padded.len().is_multiple_of(4) {
            padded.push('=');
        }

        let bytes = URL_SAFE.decode(&padded).map_err(|e| {
            debug!("url param is neither a url nor base64: {}", e);
            Error::BadRequest("Invalid URL encoding".to_string())
        })?;

        String::from_utf8(bytes).map_err(|e| {
            error!("Failed to parse UTF-8: {}", e);
            Error::BadRequest("Invalid URL encoding".to_string())
        })?
    };

    if !is_absolute(&decoded) {
        return Err(Error::BadRequest("Invalid URL format".to_string()));
    }

    Url::parse(&decoded).map_err(|e| {
        debug!("rejecting target {}: {}", decoded, e);
        Error::BadRequest("Invalid URL format".to_string())
    })
}
