use bytes::Bytes;
use futures::stream::{self, StreamExt};
use hls_edge::server::services::manifest_services::{
    Classification, classify, looks_like_manifest, read_sniff_prefix,
};
use url::Url;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

#[test]
fn trust_mpegurl_content_types() {
    let requested = url("https://cdn.test/video");

    assert_eq!(
        classify("application/vnd.apple.mpegurl", &requested),
        Classification::Manifest
    );
    assert_eq!(
        classify("Audio/X-MpegURL; charset=utf-8", &requested),
        Classification::Manifest
    );
}

#[test]
fn sniff_octet_streams_and_playlist_urls() {
    assert_eq!(
        classify("application/octet-stream", &url("https://cdn.test/a")),
        Classification::Sniff
    );
    assert_eq!(
        classify("video/mp2t", &url("https://cdn.test/live/INDEX.M3U8?token=1")),
        Classification::Sniff
    );
    assert_eq!(
        classify("", &url("https://cdn.test/index.m3u8")),
        Classification::Sniff
    );
}

#[test]
fn treat_everything_else_as_binary() {
    assert_eq!(
        classify("video/mp2t", &url("https://cdn.test/seg.ts")),
        Classification::Binary
    );
    assert_eq!(
        classify("text/html", &url("https://cdn.test/play?id=1")),
        Classification::Binary
    );
}

#[test]
fn recognize_playlists_by_their_first_bytes() {
    assert!(looks_like_manifest(b"#EXTM3U\n#EXT-X-VERSION:3"));
    assert!(looks_like_manifest(b"\xEF\xBB\xBF#EXTM3U\n"));
    assert!(looks_like_manifest(b"\r\n  #EXTM3U"));

    assert!(!looks_like_manifest(b"\x47\x40\x00\x10"));
    assert!(!looks_like_manifest(b"<html>#EXTM3U"));
    assert!(!looks_like_manifest(b""));
}

fn chunks(parts: &[&'static [u8]]) -> Vec<Result<Bytes, std::io::Error>> {
    parts.iter().map(|p| Ok(Bytes::from_static(p))).collect()
}

#[tokio::test]
async fn wait_for_enough_bytes_before_sniffing() {
    let mut body = stream::iter(chunks(&[b"\xEF", b"\xBB\xBF#E", b"XT", b"M3U\n#EXTINF:4,\n"]));

    let prefix = read_sniff_prefix(&mut body).await.unwrap();

    assert!(looks_like_manifest(&prefix));
    assert_eq!(&prefix[..], b"\xEF\xBB\xBF#EXTM3U\n#EXTINF:4,\n");
}

#[tokio::test]
async fn stop_reading_once_the_prefix_is_decidable() {
    // the body never ends, sniffing must not wait for it
    let mut body = stream::iter(chunks(&[b"\x47\x40\x00", b"\x10\x00\x00\xB0\x0D\x00\x01\xC1"]))
        .chain(stream::pending());

    let prefix = read_sniff_prefix(&mut body).await.unwrap();

    assert_eq!(prefix.len(), 11);
    assert!(!looks_like_manifest(&prefix));
}

#[tokio::test]
async fn sniff_short_bodies_whole() {
    let mut body = stream::iter(chunks(&[b"#EXT", b"M3U"]));

    let prefix = read_sniff_prefix(&mut body).await.unwrap();

    assert!(looks_like_manifest(&prefix));
}
