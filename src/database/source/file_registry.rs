use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};

use super::{Catalog, RegistryDocument, SourceEntry, SourceRegistryTrait};

/// same document as the redis registry but read from disk, re-read on every lookup so edits
/// show up without a restart
pub struct FileSourceRegistry {
    path: PathBuf,
}

impl FileSourceRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<RegistryDocument> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read registry file {}", self.path.display()))?;

        serde_json::from_str(&raw)
            .with_context(|| format!("registry file {} is not valid json", self.path.display()))
    }
}

#[async_trait::async_trait]
impl SourceRegistryTrait for FileSourceRegistry {
    async fn lookup_source(&self, catalog: Catalog, key: &str) -> Result<Option<SourceEntry>> {
        Ok(self.load().await?.find(catalog, key))
    }

    async fn health_check(&self) -> Result<f64> {
        let start = Instant::now();
        self.load().await?;
        Ok(start.elapsed().as_secs_f64() * 1000.0)
    }
}
