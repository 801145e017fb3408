use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use super::{Catalog, RegistryDocument, SourceEntry, SourceRegistryTrait};
use crate::database::RedisDatabase;

/// reads the admin config json the dashboard stores in redis
pub struct RedisSourceRegistry {
    redis: Arc<RedisDatabase>,
    config_key: String,
}

impl RedisSourceRegistry {
    pub fn new(redis: Arc<RedisDatabase>, config_key: String) -> Self {
        Self { redis, config_key }
    }

    async fn load(&self) -> Result<RegistryDocument> {
        let Some(raw) = self.redis.get_string(&self.config_key).await? else {
            // no config stored yet means no sources, every lookup fails closed
            debug!("registry key {} is empty", self.config_key);
            return Ok(RegistryDocument::default());
        };

        serde_json::from_str(&raw)
            .with_context(|| format!("registry document at {} is not valid json", self.config_key))
    }
}

#[async_trait::async_trait]
impl SourceRegistryTrait for RedisSourceRegistry {
    async fn lookup_source(&self, catalog: Catalog, key: &str) -> Result<Option<SourceEntry>> {
        Ok(self.load().await?.find(catalog, key))
    }

    async fn health_check(&self) -> Result<f64> {
        self.redis.health_check().await
    }
}
