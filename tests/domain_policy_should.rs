use std::time::Duration;

use hls_edge::server::services::domain_policy_services::{
    DomainClass, DomainMatcher, DomainPolicyTable, FetchKind, PolicyRule, RefererRule,
};

fn table() -> DomainPolicyTable {
    DomainPolicyTable::new(Duration::from_secs(15))
}

#[test]
fn use_the_fixed_referer_for_known_domains() {
    let policy = table().resolve("https://v3.bvvvvvvv7f.com/20240101/abc/index.m3u8", FetchKind::Segment);

    assert_eq!(policy.referer.as_deref(), Some("https://www.bvvvvvvv7f.com/"));
    assert_eq!(policy.timeout, Duration::from_secs(75));
}

#[test]
fn fall_back_to_the_target_origin() {
    let policy = table().resolve("https://cdn.example.com:8443/live/index.m3u8", FetchKind::Segment);

    assert_eq!(policy.referer.as_deref(), Some("https://cdn.example.com:8443/"));
    assert_eq!(policy.timeout, Duration::from_secs(60));
}

#[test]
fn give_known_fast_domains_their_referer_but_the_normal_timeout() {
    let policy = table().resolve("https://play.wlcdn88.com/a.ts", FetchKind::Segment);

    assert_eq!(policy.referer.as_deref(), Some("https://www.wlcdn88.com/"));
    assert_eq!(policy.timeout, Duration::from_secs(60));
}

#[test]
fn cap_manifest_timeouts() {
    let capped = table().resolve("https://dytt-music.com/index.m3u8", FetchKind::Manifest);
    assert_eq!(capped.timeout, Duration::from_secs(15));

    let uncapped = DomainPolicyTable::new(Duration::from_secs(120));
    assert_eq!(
        uncapped
            .resolve("https://dytt-music.com/index.m3u8", FetchKind::Manifest)
            .timeout,
        Duration::from_secs(45)
    );
    assert_eq!(
        uncapped
            .resolve("https://example.com/index.m3u8", FetchKind::Manifest)
            .timeout,
        Duration::from_secs(30)
    );
}

#[test]
fn give_keys_the_short_timeout_everywhere() {
    let table = table();

    assert_eq!(
        table.resolve("https://ffzyread2.com/k.key", FetchKind::Key).timeout,
        Duration::from_secs(30)
    );
    assert_eq!(
        table.resolve("https://example.com/k.key", FetchKind::Key).timeout,
        Duration::from_secs(30)
    );
}

#[test]
fn still_answer_for_unparseable_targets() {
    let policy = table().resolve("not a url", FetchKind::Segment);

    assert_eq!(policy.referer, None);
    assert_eq!(policy.timeout, Duration::from_secs(60));
}

#[test]
fn let_the_first_matching_rule_win() {
    let table = DomainPolicyTable::with_rules(
        vec![
            (
                DomainMatcher::Contains("example"),
                PolicyRule {
                    referer: RefererRule::Fixed("https://first/"),
                    class: DomainClass::Slow,
                },
            ),
            (
                DomainMatcher::Contains("cdn.example"),
                PolicyRule {
                    referer: RefererRule::Fixed("https://second/"),
                    class: DomainClass::Normal,
                },
            ),
        ],
        Duration::from_secs(60),
    );

    let policy = table.resolve("https://cdn.example.com/a.ts", FetchKind::Segment);
    assert_eq!(policy.referer.as_deref(), Some("https://first/"));
    assert_eq!(policy.timeout, Duration::from_secs(75));

    assert_eq!(table.rule_for("other.org").referer, RefererRule::SameOrigin);
}
