use std::borrow::Cow;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::url_utils::{Endpoint, ProxyLinks, resolve_url};

static URI_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"URI="([^"]+)""#).expect("Static regex should compile"));

const STREAM_INF: &str = "#EXT-X-STREAM-INF:";

/// directives whose only interesting part is a quoted URI attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriTag {
    Key,
    Map,
    Media,
    IFrameStreamInf,
}

impl UriTag {
    const ALL: [UriTag; 4] = [Self::Key, Self::Map, Self::Media, Self::IFrameStreamInf];

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Key => "#EXT-X-KEY:",
            Self::Map => "#EXT-X-MAP:",
            Self::Media => "#EXT-X-MEDIA:",
            Self::IFrameStreamInf => "#EXT-X-I-FRAME-STREAM-INF:",
        }
    }

    /// keys go to the key route, init segments to the segment route, renditions are playlists
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Self::Key => Endpoint::Key,
            Self::Map => Endpoint::Segment,
            Self::Media | Self::IFrameStreamInf => Endpoint::Manifest,
        }
    }
}

/// one line of a playlist. every variant borrows the raw line so untouched lines can be written
/// back byte for byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLine<'a> {
    Blank(&'a str),
    Comment(&'a str),
    /// `uri` is the byte span of the quoted value inside `raw`, None when the attribute is missing
    UriDirective {
        tag: UriTag,
        raw: &'a str,
        uri: Option<Range<usize>>,
    },
    StreamInf(&'a str),
    MediaReference { raw: &'a str, reference: &'a str },
}

impl<'a> ManifestLine<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Self::Blank(raw);
        }

        if !trimmed.starts_with('#') {
            return Self::MediaReference {
                raw,
                reference: trimmed,
            };
        }

        if trimmed.starts_with(STREAM_INF) {
            return Self::StreamInf(raw);
        }

        match UriTag::ALL.into_iter().find(|tag| trimmed.starts_with(tag.prefix())) {
            Some(tag) => Self::UriDirective {
                tag,
                raw,
                uri: URI_ATTRIBUTE
                    .captures(raw)
                    .and_then(|captures| captures.get(1))
                    .map(|m| m.range()),
            },
            None => Self::Comment(raw),
        }
    }
}

pub fn parse_manifest(content: &str) -> Vec<ManifestLine<'_>> {
    content.split('\n').map(ManifestLine::parse).collect()
}

#[derive(Debug, Clone, Copy)]
pub struct RewriteOptions<'a> {
    /// directory of the manifest after redirects, relative references resolve against this
    pub base_url: &'a str,
    /// externally visible base of the proxy routes, e.g. `https://edge.example.com/api/proxy`
    pub proxy_base: &'a str,
    pub source_key: &'a str,
    /// hand plain segment urls to the player as-is instead of proxying them
    pub allow_direct_cors: bool,
}

/// rewrites every reference in the playlist so it routes back through the proxy. lines that
/// don't need touching (or can't be resolved) are emitted exactly as they came in
pub fn rewrite_manifest(content: &str, options: &RewriteOptions) -> String {
    let links = ProxyLinks::new(options.proxy_base, options.source_key);
    let mut awaiting_variant = false;

    let lines: Vec<Cow<'_, str>> = parse_manifest(content)
        .into_iter()
        .map(|line| match line {
            ManifestLine::Blank(raw) | ManifestLine::Comment(raw) => Cow::Borrowed(raw),
            ManifestLine::StreamInf(raw) => {
                awaiting_variant = true;
                Cow::Borrowed(raw)
            }
            ManifestLine::UriDirective { tag, raw, uri: None } => {
                debug!("{} without a URI attribute, leaving it alone", tag.prefix());
                Cow::Borrowed(raw)
            }
            ManifestLine::UriDirective {
                tag,
                raw,
                uri: Some(span),
            } => match resolve_url(options.base_url, &raw[span.clone()]) {
                Some(resolved) => Cow::Owned(format!(
                    "{}{}{}",
                    &raw[..span.start],
                    links.link(tag.endpoint(), &resolved),
                    &raw[span.end..]
                )),
                None => Cow::Borrowed(raw),
            },
            ManifestLine::MediaReference { raw, reference } => {
                // the line after a STREAM-INF is a variant playlist, it never goes to the segment route
                let is_variant = std::mem::take(&mut awaiting_variant);

                let Some(resolved) = resolve_url(options.base_url, reference) else {
                    return Cow::Borrowed(raw);
                };

                let rewritten = if is_variant {
                    links.link(Endpoint::Manifest, &resolved)
                } else if options.allow_direct_cors {
                    resolved
                } else {
                    links.link(Endpoint::Segment, &resolved)
                };

                // crlf playlists stay crlf, the reference itself was trimmed
                if raw.ends_with('\r') {
                    Cow::Owned(format!("{}\r", rewritten))
                } else {
                    Cow::Owned(rewritten)
                }
            }
        })
        .collect();

    debug!("Rewrote manifest with {} lines", lines.len());

    lines.join("\n")
}
