use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use hls_edge::server::services::stream_session::{ReleaseReason, StreamSession};

type Releases = Arc<Mutex<Vec<(ReleaseReason, u64)>>>;

fn chunks(parts: &[&'static str]) -> Vec<Result<Bytes, std::io::Error>> {
    parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect()
}

fn tracked(
    reader: impl futures::Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
) -> (StreamSession<std::io::Error>, Releases) {
    let releases: Releases = Arc::new(Mutex::new(Vec::new()));
    let sink = releases.clone();
    let session = StreamSession::open("http://origin.test/seg.ts", reader.boxed()).on_release(
        Box::new(move |reason, bytes| sink.lock().unwrap().push((reason, bytes))),
    );

    (session, releases)
}

#[tokio::test]
async fn release_once_when_the_upstream_completes() {
    let (mut session, releases) = tracked(stream::iter(chunks(&["abc", "defg"])));

    let mut forwarded = Vec::new();
    while let Some(chunk) = session.next().await {
        forwarded.extend_from_slice(&chunk.unwrap());
    }

    assert_eq!(forwarded, b"abcdefg");
    assert!(session.is_released());

    // dropping after completion must not release a second time
    drop(session);
    assert_eq!(*releases.lock().unwrap(), vec![(ReleaseReason::Completed, 7)]);
}

#[tokio::test]
async fn release_when_dropped_mid_transfer() {
    let endless = stream::iter(chunks(&["first"])).chain(stream::pending());
    let (mut session, releases) = tracked(endless);

    let first = session.next().await.unwrap().unwrap();
    assert_eq!(first, Bytes::from_static(b"first"));
    assert!(releases.lock().unwrap().is_empty());

    drop(session);

    assert_eq!(*releases.lock().unwrap(), vec![(ReleaseReason::Cancelled, 5)]);
}

#[tokio::test]
async fn release_on_a_read_error_and_stop_yielding() {
    let failing = stream::iter(vec![
        Ok(Bytes::from_static(b"ok")),
        Err(std::io::Error::other("connection reset")),
        Ok(Bytes::from_static(b"never")),
    ]);
    let (mut session, releases) = tracked(failing);

    assert!(session.next().await.unwrap().is_ok());
    assert!(session.next().await.unwrap().is_err());
    assert!(session.next().await.is_none());

    drop(session);
    assert_eq!(*releases.lock().unwrap(), vec![(ReleaseReason::ReadError, 2)]);
}

#[tokio::test]
async fn treat_a_second_release_as_a_no_op() {
    let (mut session, releases) = tracked(stream::pending());

    session.release(ReleaseReason::Cancelled);
    session.release(ReleaseReason::Completed);
    session.release(ReleaseReason::ReadError);
    drop(session);

    assert_eq!(*releases.lock().unwrap(), vec![(ReleaseReason::Cancelled, 0)]);
}

#[tokio::test]
async fn count_forwarded_bytes() {
    let (mut session, _releases) = tracked(stream::iter(chunks(&["12", "345", "6789"])));

    session.next().await;
    session.next().await;

    assert_eq!(session.bytes_forwarded(), 5);
}
