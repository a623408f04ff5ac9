//! Per-category freshness windows and poll intervals.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::Category;

/// Freshness and polling for one cache category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CategoryPolicy {
    /// Age after which an entry no longer satisfies a read without refetching.
    pub stale_after: Duration,
    /// Interval between background refreshes; `None` disables polling.
    pub refetch_every: Option<Duration>,
}

impl CategoryPolicy {
    const fn new(stale_ms: u64, refetch_ms: Option<u64>) -> Self {
        Self {
            stale_after: Duration::from_millis(stale_ms),
            refetch_every: match refetch_ms {
                Some(ms) => Some(Duration::from_millis(ms)),
                None => None,
            },
        }
    }
}

/// Policy for every cache category. Categories are independent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    pub ticker: CategoryPolicy,
    pub indicator: CategoryPolicy,
    pub candles: CategoryPolicy,
    pub balances: CategoryPolicy,
    pub orders: CategoryPolicy,
    pub markets: CategoryPolicy,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ticker: CategoryPolicy::new(1_000, Some(2_000)),
            indicator: CategoryPolicy::new(30_000, Some(60_000)),
            candles: CategoryPolicy::new(30_000, Some(60_000)),
            balances: CategoryPolicy::new(5_000, Some(10_000)),
            orders: CategoryPolicy::new(3_000, Some(5_000)),
            markets: CategoryPolicy::new(3_600_000, None),
        }
    }
}

/// Overrides for one category. Missing fields keep the default;
/// `refetch_ms: 0` disables polling.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CategoryOverride {
    stale_ms: Option<u64>,
    refetch_ms: Option<u64>,
}

/// On-disk shape of the policy file. Missing categories keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyFile {
    #[serde(default)]
    ticker: Option<CategoryOverride>,
    #[serde(default)]
    indicator: Option<CategoryOverride>,
    #[serde(default)]
    candles: Option<CategoryOverride>,
    #[serde(default)]
    balances: Option<CategoryOverride>,
    #[serde(default)]
    orders: Option<CategoryOverride>,
    #[serde(default)]
    markets: Option<CategoryOverride>,
}

impl CachePolicy {
    /// Loads overrides from a JSON file on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::Config`](crate::PulseError::Config) if the
    /// file cannot be read, or a JSON error if it does not parse.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            crate::PulseError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&contents)
    }

    /// Applies overrides from a JSON document on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if the document does not parse.
    pub fn from_json(contents: &str) -> crate::Result<Self> {
        let file: PolicyFile = serde_json::from_str(contents)?;
        let mut policy = Self::default();

        apply(&mut policy.ticker, file.ticker);
        apply(&mut policy.indicator, file.indicator);
        apply(&mut policy.candles, file.candles);
        apply(&mut policy.balances, file.balances);
        apply(&mut policy.orders, file.orders);
        apply(&mut policy.markets, file.markets);

        Ok(policy)
    }

    /// Returns the effective policy for a category.
    pub fn for_category(&self, category: Category) -> CategoryPolicy {
        match category {
            Category::Ticker => self.ticker,
            Category::Indicator => self.indicator,
            Category::Candles => self.candles,
            Category::Balances => self.balances,
            Category::Orders => self.orders,
            Category::Markets => self.markets,
        }
    }
}

fn apply(target: &mut CategoryPolicy, overrides: Option<CategoryOverride>) {
    let Some(overrides) = overrides else {
        return;
    };
    if let Some(stale_ms) = overrides.stale_ms {
        target.stale_after = Duration::from_millis(stale_ms);
    }
    if let Some(refetch_ms) = overrides.refetch_ms {
        target.refetch_every = (refetch_ms > 0).then(|| Duration::from_millis(refetch_ms));
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_dashboard_intervals() {
        let policy = CachePolicy::default();
        assert_eq!(policy.ticker.stale_after, Duration::from_secs(1));
        assert_eq!(policy.ticker.refetch_every, Some(Duration::from_secs(2)));
        assert_eq!(policy.markets.refetch_every, None);
        assert_eq!(
            policy.for_category(Category::Orders).refetch_every,
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn overrides_only_named_fields() {
        let policy = CachePolicy::from_json(
            r#"{"ticker": {"refetch_ms": 500}, "candles": {"stale_ms": 10, "refetch_ms": 0}}"#,
        )
        .unwrap();

        assert_eq!(policy.ticker.stale_after, Duration::from_secs(1));
        assert_eq!(policy.ticker.refetch_every, Some(Duration::from_millis(500)));
        assert_eq!(policy.candles.stale_after, Duration::from_millis(10));
        assert_eq!(policy.candles.refetch_every, None);
        assert_eq!(policy.balances, CachePolicy::default().balances);
    }

    #[test]
    fn rejects_unknown_category() {
        assert!(CachePolicy::from_json(r#"{"orderbooks": {"stale_ms": 1}}"#).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"indicator": {{"stale_ms": 5000}}}}"#).unwrap();

        let policy = CachePolicy::load(file.path()).unwrap();

        assert_eq!(policy.indicator.stale_after, Duration::from_secs(5));
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CachePolicy::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
