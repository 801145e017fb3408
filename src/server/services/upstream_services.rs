use std::sync::Arc;

use anyhow::Context;
use axum::http::header;
use futures::StreamExt;
use metrics::counter;
use tracing::{debug, error, warn};
use url::Url;

use super::domain_policy_services::DomainPolicy;
use super::stream_session::{SessionObserver, StreamSession};
use crate::server::error::{AppResult, Error};

const MAX_REDIRECTS: usize = 10;

/// everything that goes into one upstream GET
#[derive(Debug, Clone, Copy)]
pub struct UpstreamRequest<'a> {
    pub url: &'a Url,
    pub user_agent: &'a str,
    pub accept: &'static str,
    pub policy: &'a DomainPolicy,
    /// forwarded verbatim from the player
    pub range: Option<&'a str>,
    /// manifests are live documents, ask every cache in between to revalidate
    pub no_cache: bool,
    /// what the client gets told when the origin answers with a non-2xx
    pub failure_message: &'static str,
}

/// shared upstream http client. one connection pool for the whole process, every request carries
/// its own timeout from the domain policy
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl UpstreamClient {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .context("failed to build upstream http client")?;

        Ok(Self {
            http,
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// takes ownership of the response body. from here on the session is the only thing holding
    /// the upstream connection
    pub fn open_session(&self, response: reqwest::Response) -> StreamSession<reqwest::Error> {
        let target = response.url().to_string();
        let session = StreamSession::open(target.clone(), response.bytes_stream().boxed());

        match self.observer.clone() {
            Some(observer) => {
                observer.opened(&target);
                session.on_release(Box::new(move |reason, bytes| {
                    observer.released(&target, reason, bytes)
                }))
            }
            None => session,
        }
    }

    /// sends the request and hands back the response only if it's a 2xx. the timeout covers the
    /// body too, so a stalled transfer errors out of the body stream later on
    pub async fn get(&self, request: UpstreamRequest<'_>) -> AppResult<reqwest::Response> {
        let mut builder = self
            .http
            .get(request.url.clone())
            .timeout(request.policy.timeout)
            .header(header::USER_AGENT, request.user_agent)
            .header(header::ACCEPT, request.accept);

        if let Some(referer) = request.policy.referer.as_deref() {
            builder = builder.header(header::REFERER, referer);
        }

        if let Some(range) = request.range {
            builder = builder.header(header::RANGE, range);
        }

        if request.no_cache {
            builder = builder
                .header(header::ACCEPT_ENCODING, "identity")
                .header(header::CACHE_CONTROL, "no-cache");
        }

        debug!(
            "Sending upstream request to {} (timeout {:?}, range {:?})",
            request.url, request.policy.timeout, request.range
        );

        let response = builder.send().await.map_err(|e| {
            let err = Error::from(e);
            match &err {
                Error::Timeout => warn!("Upstream timed out: {}", request.url),
                other => error!("Upstream request to {} failed: {:?}", request.url, other),
            }
            counter!("proxy_upstream_errors_total", "kind" => err.kind()).increment(1);
            err
        })?;

        let status = response.status();
        if !status.is_success() {
            // the body is usually a cloudflare page, not worth reading. dropping the response
            // closes it
            error!("Upstream {} answered {}", request.url, status);
            counter!("proxy_upstream_errors_total", "kind" => "upstream_status").increment(1);
            return Err(Error::Upstream {
                status: status.as_u16(),
                message: request.failure_message,
            });
        }

        debug!(
            "Upstream {} answered {} (final url {})",
            request.url,
            status,
            response.url()
        );

        Ok(response)
    }
}
