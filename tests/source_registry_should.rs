use std::io::Write;
use std::sync::Arc;

use hls_edge::server::error::Error;
use hls_edge::server::services::source_services::SourceService;
use hls_edge::{
    Catalog, FileSourceRegistry, MockSourceRegistryTrait, SourceEntry, SourceRegistryTrait,
};
use mockall::predicate::eq;
use tempfile::NamedTempFile;

const ADMIN_CONFIG: &str = r#"{
    "ConfigSubscribtion": { "URL": "", "AutoUpdate": false },
    "SourceConfig": [
        { "key": "heimuer", "name": "Heimuer", "api": "https://json.heimuer.xyz/api.php/provide/vod", "from": "config" },
        { "key": "old", "name": "Old", "api": "https://old.example.com/api", "disabled": true }
    ],
    "LiveConfig": [
        { "key": "cctv", "name": "CCTV", "url": "https://live.example.com/cctv.m3u", "ua": "okhttp/3.15", "from": "custom" },
        { "key": "plain", "name": "Plain", "url": "https://live.example.com/plain.m3u", "ua": "  " }
    ]
}"#;

fn registry_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn entry(key: &str, user_agent: Option<&str>, disabled: bool) -> SourceEntry {
    SourceEntry {
        key: key.to_string(),
        user_agent: user_agent.map(str::to_string),
        disabled,
    }
}

#[tokio::test]
async fn read_live_sources_with_their_user_agent() {
    let file = registry_file(ADMIN_CONFIG);
    let registry = FileSourceRegistry::new(file.path());

    let live = registry.lookup_source(Catalog::Live, "cctv").await.unwrap();
    assert_eq!(live, Some(entry("cctv", Some("okhttp/3.15"), false)));

    // a blank ua is the same as no ua
    let plain = registry.lookup_source(Catalog::Live, "plain").await.unwrap();
    assert_eq!(plain, Some(entry("plain", None, false)));
}

#[tokio::test]
async fn read_vod_sources_and_their_disabled_flag() {
    let file = registry_file(ADMIN_CONFIG);
    let registry = FileSourceRegistry::new(file.path());

    assert_eq!(
        registry.lookup_source(Catalog::OnDemand, "heimuer").await.unwrap(),
        Some(entry("heimuer", None, false))
    );
    assert_eq!(
        registry.lookup_source(Catalog::OnDemand, "old").await.unwrap(),
        Some(entry("old", None, true))
    );
    // catalogs don't leak into each other
    assert_eq!(registry.lookup_source(Catalog::Live, "heimuer").await.unwrap(), None);
}

#[tokio::test]
async fn pick_up_edits_without_a_restart() {
    let file = registry_file(r#"{ "SourceConfig": [] }"#);
    let registry = FileSourceRegistry::new(file.path());

    assert_eq!(registry.lookup_source(Catalog::OnDemand, "new").await.unwrap(), None);

    std::fs::write(file.path(), r#"{ "SourceConfig": [{ "key": "new" }] }"#).unwrap();

    assert_eq!(
        registry.lookup_source(Catalog::OnDemand, "new").await.unwrap(),
        Some(entry("new", None, false))
    );
}

#[tokio::test]
async fn fail_on_unreadable_documents() {
    let file = registry_file("{ not json");
    let registry = FileSourceRegistry::new(file.path());

    assert!(registry.lookup_source(Catalog::Live, "cctv").await.is_err());
    assert!(registry.health_check().await.is_err());

    let missing = FileSourceRegistry::new("/definitely/not/here.json");
    assert!(missing.lookup_source(Catalog::Live, "cctv").await.is_err());
}

#[tokio::test]
async fn prefer_the_live_catalog() {
    let mut registry = MockSourceRegistryTrait::new();
    registry
        .expect_lookup_source()
        .with(eq(Catalog::Live), eq("both"))
        .times(1)
        .returning(|_, _| Ok(Some(entry("both", Some("LiveUA/2"), false))));
    registry
        .expect_lookup_source()
        .with(eq(Catalog::OnDemand), eq("both"))
        .never();

    let resolved = SourceService::new(Arc::new(registry)).resolve("both").await.unwrap();

    assert_eq!(resolved.catalog, Catalog::Live);
    assert_eq!(resolved.user_agent.as_deref(), Some("LiveUA/2"));
}

#[tokio::test]
async fn fall_back_to_vod_when_the_live_entry_is_disabled() {
    let mut registry = MockSourceRegistryTrait::new();
    registry
        .expect_lookup_source()
        .with(eq(Catalog::Live), eq("dup"))
        .returning(|_, _| Ok(Some(entry("dup", Some("LiveUA/2"), true))));
    registry
        .expect_lookup_source()
        .with(eq(Catalog::OnDemand), eq("dup"))
        .returning(|_, _| Ok(Some(entry("dup", None, false))));

    let resolved = SourceService::new(Arc::new(registry)).resolve("dup").await.unwrap();

    assert_eq!(resolved.catalog, Catalog::OnDemand);
    assert_eq!(resolved.user_agent, None);
}

#[tokio::test]
async fn fail_closed_for_unknown_or_disabled_sources() {
    let mut registry = MockSourceRegistryTrait::new();
    registry.expect_lookup_source().returning(|catalog, key| match (catalog, key) {
        (Catalog::OnDemand, "off") => Ok(Some(entry("off", None, true))),
        _ => Ok(None),
    });
    let sources = SourceService::new(Arc::new(registry));

    assert!(matches!(sources.resolve("missing").await, Err(Error::SourceNotFound)));
    assert!(matches!(sources.resolve("off").await, Err(Error::SourceNotFound)));
}

#[tokio::test]
async fn surface_registry_failures_as_internal_errors() {
    let mut registry = MockSourceRegistryTrait::new();
    registry
        .expect_lookup_source()
        .returning(|_, _| Err(anyhow::anyhow!("connection refused")));

    let result = SourceService::new(Arc::new(registry)).resolve("src1").await;

    assert!(matches!(result, Err(Error::InternalServerErrorWithContext(_))));
}
