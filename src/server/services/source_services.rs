use tracing::{debug, error};

use crate::database::{Catalog, DynSourceRegistry};
use crate::server::error::{AppResult, Error};

/// a source key that exists and is enabled in one of the catalogs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub key: String,
    pub catalog: Catalog,
    /// only live sources can carry their own ua
    pub user_agent: Option<String>,
}

#[derive(Clone)]
pub struct SourceService {
    registry: DynSourceRegistry,
}

impl SourceService {
    pub fn new(registry: DynSourceRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &DynSourceRegistry {
        &self.registry
    }

    /// live first, then vod. the first enabled entry wins and anything else fails closed before
    /// an upstream is ever contacted
    pub async fn resolve(&self, key: &str) -> AppResult<ResolvedSource> {
        for catalog in [Catalog::Live, Catalog::OnDemand] {
            let entry = self
                .registry
                .lookup_source(catalog, key)
                .await
                .map_err(|e| {
                    error!("Source registry lookup failed: {:#}", e);
                    Error::InternalServerErrorWithContext(format!("registry lookup failed: {}", e))
                })?;

            match entry {
                Some(entry) if !entry.disabled => {
                    debug!("Source {} resolved from the {} catalog", key, catalog.as_str());
                    return Ok(ResolvedSource {
                        key: entry.key,
                        catalog,
                        user_agent: entry.user_agent,
                    });
                }
                Some(_) => debug!("Source {} is disabled in the {} catalog", key, catalog.as_str()),
                None => {}
            }
        }

        Err(Error::SourceNotFound)
    }
}
