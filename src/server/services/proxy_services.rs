use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::{config::AppConfig, database::DynSourceRegistry};

use super::{
    domain_policy_services::DomainPolicyTable, manifest_services::ManifestService,
    source_services::SourceService, stream_services::StreamService,
    upstream_services::UpstreamClient,
};

/// everything a proxy request needs, cloned into each handler through an extension
#[derive(Clone)]
pub struct ProxyServices {
    pub sources: SourceService,
    pub policies: Arc<DomainPolicyTable>,
    pub manifests: ManifestService,
    pub streams: StreamService,
    pub config: Arc<AppConfig>,
}

impl ProxyServices {
    pub fn new(
        config: Arc<AppConfig>,
        registry: DynSourceRegistry,
        upstream: UpstreamClient,
    ) -> Self {
        info!("starting proxy services...");

        let policies = Arc::new(DomainPolicyTable::new(Duration::from_millis(
            config.manifest_timeout_cap_ms,
        )));

        Self {
            sources: SourceService::new(registry),
            policies,
            manifests: ManifestService::new(upstream.clone()),
            streams: StreamService::new(upstream),
            config,
        }
    }
}
