//! Scoped-thread fan-out/fan-in tests.
//!
//! These tests verify the `check_websites` contract: one evaluation per
//! submitted URL, one map entry per distinct URL, each holding the
//! checker's verdict.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use sitecheck::checker::PatternChecker;
use sitecheck::check_websites;

use crate::fixtures::{
    mixed_urls, mock_website_checker, sample_websites, ConcurrencyProbe, BROKEN_URL,
};

/// Test: Sample websites
/// Given two good URLs and one broken URL
/// When checked
/// Then only the broken URL maps to false
#[test]
fn test_check_websites_sample() {
    let websites = sample_websites();

    let got = check_websites(&mock_website_checker, websites.as_slice());

    let want: HashMap<String, bool> = HashMap::from([
        ("http://google.com".to_string(), true),
        ("http://blog.gypsydave5.com".to_string(), true),
        (BROKEN_URL.to_string(), false),
    ]);
    assert_eq!(got, want);
}

/// Test: Good/bad scenario
/// Given a checker rejecting bad.example
/// When both hosts are checked
/// Then the map holds one verdict per host
#[test]
fn test_check_websites_good_and_bad() {
    let checker = |url: &str| !url.contains("bad.example");
    let got = check_websites(&checker, &["http://good.example", "http://bad.example"]);

    assert_eq!(got.len(), 2);
    assert_eq!(got.get("http://good.example"), Some(&true));
    assert_eq!(got.get("http://bad.example"), Some(&false));
}

/// Test: Key set and values
/// Given many URLs with duplicates
/// When checked
/// Then keys are exactly the distinct URLs and each value is the checker's verdict
#[test]
fn test_keys_and_values_follow_checker() {
    let mut urls = mixed_urls(12);
    urls.extend(mixed_urls(4));
    let checker = PatternChecker::new().deny(r"bad\.example").unwrap();

    let got = check_websites(&checker, urls.as_slice());

    let distinct: HashSet<&str> = urls.iter().map(String::as_str).collect();
    let keys: HashSet<&str> = got.keys().map(String::as_str).collect();
    assert_eq!(keys, distinct);
    for (url, ok) in &got {
        assert_eq!(*ok, !url.contains("bad.example"), "wrong verdict for {}", url);
    }
}

/// Test: One evaluation per submission
/// Given duplicated URLs
/// When checked
/// Then the checker runs once per submitted URL, not once per distinct URL
#[test]
fn test_duplicates_evaluated_per_submission() {
    let probe = ConcurrencyProbe::new(Duration::from_millis(1));
    let urls = ["http://a.example", "http://a.example", "http://b.example"];

    let got = check_websites(&probe, &urls);

    assert_eq!(probe.calls(), 3);
    assert_eq!(got.len(), 2);
}

/// Test: No cap
/// Given 16 slow URLs
/// When checked
/// Then all of them are in flight together
#[test]
fn test_all_urls_dispatched_eagerly() {
    let probe = ConcurrencyProbe::new(Duration::from_millis(200));
    let urls = mixed_urls(16);

    check_websites(&probe, urls.as_slice());

    assert_eq!(probe.peak(), 16, "every URL should get its own thread");
}

/// Test: Trait object checker
/// Given a boxed checker
/// When checked
/// Then dynamic dispatch behaves like the concrete checker
#[test]
fn test_dyn_checker() {
    let checker: Box<dyn sitecheck::WebsiteChecker> = Box::new(PatternChecker::new());
    let got = check_websites(&*checker, &["https://ok.example", BROKEN_URL]);
    assert_eq!(got.get("https://ok.example"), Some(&true));
    assert_eq!(got.get(BROKEN_URL), Some(&false));
}
