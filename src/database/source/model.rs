use anyhow::Result;
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// the two source catalogs the admin config keeps. a key can show up in either one (or both, in
/// which case live is asked first since it's the only one that can carry a custom ua)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Catalog {
    Live,
    OnDemand,
}

impl Catalog {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::OnDemand => "vod",
        }
    }
}

/// what the proxy needs to know about a source, nothing else from the catalog matters here
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub key: String,
    pub user_agent: Option<String>,
    pub disabled: bool,
}

/// subset of the admin config document. everything we don't read is ignored by serde
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(rename = "SourceConfig", default)]
    pub source_config: Vec<VodSourceConfig>,
    #[serde(rename = "LiveConfig", default)]
    pub live_config: Vec<LiveSourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VodSourceConfig {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub api: String,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSourceConfig {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    pub ua: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl RegistryDocument {
    pub fn find(&self, catalog: Catalog, key: &str) -> Option<SourceEntry> {
        match catalog {
            Catalog::Live => self
                .live_config
                .iter()
                .find(|s| s.key == key)
                .map(|s| SourceEntry {
                    key: s.key.clone(),
                    // an empty ua in the admin panel means "not set"
                    user_agent: s.ua.clone().filter(|ua| !ua.trim().is_empty()),
                    disabled: s.disabled,
                }),
            Catalog::OnDemand => self
                .source_config
                .iter()
                .find(|s| s.key == key)
                .map(|s| SourceEntry {
                    key: s.key.clone(),
                    user_agent: None,
                    disabled: s.disabled,
                }),
        }
    }
}

pub type DynSourceRegistry = Arc<dyn SourceRegistryTrait + Send + Sync>;

/// read only view of the source catalogs. implementations fetch on every call, the proxy never
/// holds on to a copy between requests
#[automock]
#[async_trait::async_trait]
pub trait SourceRegistryTrait {
    async fn lookup_source(&self, catalog: Catalog, key: &str) -> Result<Option<SourceEntry>>;

    /// round trip to the backing store in milliseconds
    async fn health_check(&self) -> Result<f64>;
}
