use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use metrics::{counter, gauge};
use tracing::debug;

/// why a session let go of its upstream reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    Completed,
    Cancelled,
    ReadError,
}

impl ReleaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::ReadError => "read_error",
        }
    }
}

/// called exactly once, after the reader has been dropped, with the reason and bytes forwarded
pub type ReleaseHook = Box<dyn FnOnce(ReleaseReason, u64) + Send + Sync>;

/// gets told about every session the upstream client opens and releases
pub trait SessionObserver: Send + Sync {
    fn opened(&self, target: &str);

    fn released(&self, target: &str, reason: ReleaseReason, bytes: u64);
}

/// Exclusive owner of one upstream body reader.
///
/// The reader is released on the first of: the upstream finishing, a read error, or the session
/// being dropped. Dropping covers the client going away mid-transfer, since hyper drops the
/// response body and with it the session. Releasing twice is a no-op.
///
/// The session is polled by whoever consumes it, so the upstream is only read as fast as the
/// downstream drains.
pub struct StreamSession<E> {
    reader: Option<BoxStream<'static, Result<Bytes, E>>>,
    target: String,
    forwarded: u64,
    on_release: Option<ReleaseHook>,
}

impl<E> StreamSession<E> {
    pub fn open(target: impl Into<String>, reader: BoxStream<'static, Result<Bytes, E>>) -> Self {
        gauge!("proxy_stream_sessions_open").increment(1.0);

        Self {
            reader: Some(reader),
            target: target.into(),
            forwarded: 0,
            on_release: None,
        }
    }

    pub fn on_release(mut self, hook: ReleaseHook) -> Self {
        self.on_release = Some(hook);
        self
    }

    pub fn is_released(&self) -> bool {
        self.reader.is_none()
    }

    pub fn bytes_forwarded(&self) -> u64 {
        self.forwarded
    }

    pub fn release(&mut self, reason: ReleaseReason) {
        let Some(reader) = self.reader.take() else {
            return;
        };
        // dropping the reader is what hands the connection back (or closes it mid-body)
        drop(reader);

        gauge!("proxy_stream_sessions_open").decrement(1.0);
        counter!("proxy_stream_sessions_released_total", "reason" => reason.as_str()).increment(1);
        counter!("proxy_stream_bytes_total").increment(self.forwarded);

        debug!(
            "Released upstream reader for {} ({}, {} bytes)",
            self.target,
            reason.as_str(),
            self.forwarded
        );

        if let Some(hook) = self.on_release.take() {
            hook(reason, self.forwarded);
        }
    }
}

impl<E> Stream for StreamSession<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(reader) = self.reader.as_mut() else {
            return Poll::Ready(None);
        };

        match reader.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.forwarded += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.release(ReleaseReason::ReadError);
                Poll::Ready(Some(Err(std::io::Error::other(e))))
            }
            Poll::Ready(None) => {
                self.release(ReleaseReason::Completed);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<E> Drop for StreamSession<E> {
    fn drop(&mut self) {
        self.release(ReleaseReason::Cancelled);
    }
}
