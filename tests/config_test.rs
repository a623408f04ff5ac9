//! Cache policy file loading tests.

use std::path::PathBuf;
use std::time::Duration;

use coinpulse::cache::{CachePolicy, Category};
use tokio_test::{assert_err, assert_ok};

/// Helper to get the path to test fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[test]
fn test_policy_file_overrides_listed_fields() {
    let policy = assert_ok!(CachePolicy::load(&fixtures_dir().join("cache_policy.json")));
    let defaults = CachePolicy::default();

    assert_eq!(policy.ticker.stale_after, Duration::from_millis(500));
    assert_eq!(policy.ticker.refetch_every, Some(Duration::from_secs(1)));
    assert_eq!(policy.orders.stale_after, Duration::from_millis(1500));
    assert_eq!(policy.orders.refetch_every, defaults.orders.refetch_every);
    assert_eq!(policy.indicator, defaults.indicator);
}

#[test]
fn test_zero_refetch_disables_polling() {
    let policy = CachePolicy::load(&fixtures_dir().join("cache_policy.json"))
        .expect("Failed to load cache policy");

    assert_eq!(policy.for_category(Category::Markets).refetch_every, None);
}

#[test]
fn test_unknown_category_is_rejected() {
    assert_err!(CachePolicy::load(&fixtures_dir().join("invalid_cache_policy.json")));
}

#[test]
fn test_policy_file_not_found() {
    assert_err!(CachePolicy::load(&fixtures_dir().join("nonexistent.json")));
}
