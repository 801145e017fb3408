use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

/// which proxy route the upstream fetch is for, segments get more time since they're big
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Manifest,
    Segment,
    Key,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainClass {
    Normal,
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainMatcher {
    /// hostname contains the needle anywhere, subdomains and cdn prefixes included
    Contains(&'static str),
}

impl DomainMatcher {
    pub fn matches(&self, host: &str) -> bool {
        match self {
            Self::Contains(needle) => host.contains(needle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefererRule {
    Fixed(&'static str),
    /// `origin + "/"` of the target itself
    SameOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyRule {
    pub referer: RefererRule,
    pub class: DomainClass,
}

/// headers and deadline for one upstream fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainPolicy {
    /// None only when the target couldn't be parsed
    pub referer: Option<String>,
    pub timeout: Duration,
}

/// Ordered per-origin table, first match wins.
///
/// The fallback lives outside the list so every host resolves to something.
pub struct DomainPolicyTable {
    rules: Vec<(DomainMatcher, PolicyRule)>,
    fallback: PolicyRule,
    manifest_timeout_cap: Duration,
}

impl DomainPolicyTable {
    /// the origins we know about. the slow ones regularly take 20s+ for a first byte
    pub fn new(manifest_timeout_cap: Duration) -> Self {
        let slow = |referer| PolicyRule {
            referer: RefererRule::Fixed(referer),
            class: DomainClass::Slow,
        };

        Self::with_rules(
            vec![
                (
                    DomainMatcher::Contains("bvvvvvvv7f.com"),
                    slow("https://www.bvvvvvvv7f.com/"),
                ),
                (
                    DomainMatcher::Contains("dytt-music.com"),
                    slow("https://www.dytt-music.com/"),
                ),
                (
                    DomainMatcher::Contains("high25-playback.com"),
                    slow("https://www.high25-playback.com/"),
                ),
                (
                    DomainMatcher::Contains("ffzyread2.com"),
                    slow("https://www.ffzyread2.com/"),
                ),
                (
                    DomainMatcher::Contains("wlcdn88.com"),
                    PolicyRule {
                        referer: RefererRule::Fixed("https://www.wlcdn88.com/"),
                        class: DomainClass::Normal,
                    },
                ),
            ],
            manifest_timeout_cap,
        )
    }

    pub fn with_rules(
        rules: Vec<(DomainMatcher, PolicyRule)>,
        manifest_timeout_cap: Duration,
    ) -> Self {
        Self {
            rules,
            fallback: PolicyRule {
                referer: RefererRule::SameOrigin,
                class: DomainClass::Normal,
            },
            manifest_timeout_cap,
        }
    }

    pub fn rule_for(&self, host: &str) -> &PolicyRule {
        self.rules
            .iter()
            .find(|(matcher, _)| matcher.matches(host))
            .map(|(_, rule)| rule)
            .unwrap_or(&self.fallback)
    }

    pub fn resolve(&self, target: &str, kind: FetchKind) -> DomainPolicy {
        let parsed = Url::parse(target).ok();
        let host = parsed.as_ref().and_then(|u| u.host_str());

        let Some((url, host)) = parsed.as_ref().zip(host) else {
            warn!("Failed to parse URL for Referer: {}", target);
            return DomainPolicy {
                referer: None,
                timeout: self.timeout(kind, DomainClass::Normal),
            };
        };

        let rule = self.rule_for(host);
        let referer = match rule.referer {
            RefererRule::Fixed(referer) => referer.to_string(),
            RefererRule::SameOrigin => format!("{}/", url.origin().ascii_serialization()),
        };

        let policy = DomainPolicy {
            referer: Some(referer),
            timeout: self.timeout(kind, rule.class),
        };
        debug!("Policy for {} ({:?}): {:?}", host, kind, policy);

        policy
    }

    fn timeout(&self, kind: FetchKind, class: DomainClass) -> Duration {
        let secs = match (kind, class) {
            (FetchKind::Manifest, DomainClass::Normal) => 30,
            (FetchKind::Manifest, DomainClass::Slow) => 45,
            (FetchKind::Segment, DomainClass::Normal) => 60,
            (FetchKind::Segment, DomainClass::Slow) => 75,
            (FetchKind::Key, _) => 30,
        };
        let timeout = Duration::from_secs(secs);

        match kind {
            FetchKind::Manifest => timeout.min(self.manifest_timeout_cap),
            _ => timeout,
        }
    }
}
