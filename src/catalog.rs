use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Instant;

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Error;
use crate::http::Fetcher;

/// Upper bound for `recent-N`; Common Crawl does not reach further back.
pub const MAX_RECENT_YEARS: u32 = 50;

static SNAPSHOT_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CC-MAIN-(\d{4})").expect("snapshot year pattern is valid"));

/// One crawl index as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SnapshotDescriptor {
    pub id: String,
    #[serde(rename = "cdx-api")]
    pub query_endpoint: String,
}

impl SnapshotDescriptor {
    pub fn new(id: impl Into<String>, query_endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            query_endpoint: query_endpoint.into(),
        }
    }

    /// Year encoded in the id as `CC-MAIN-YYYY`.
    pub fn year(&self) -> Option<i32> {
        SNAPSHOT_YEAR
            .captures(&self.id)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

/// Which catalog years a run looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YearSelection {
    All,
    Years(BTreeSet<i32>),
    /// The N most recent calendar years, counting the current one.
    /// N is capped at [`MAX_RECENT_YEARS`].
    Recent(u32),
}

impl Default for YearSelection {
    fn default() -> Self {
        YearSelection::Recent(2)
    }
}

impl YearSelection {
    /// Concrete years, or `None` for `All`.
    pub fn resolve(&self, current_year: i32) -> Option<BTreeSet<i32>> {
        match self {
            YearSelection::All => None,
            YearSelection::Years(years) => Some(years.clone()),
            YearSelection::Recent(n) => {
                let span = (*n).min(MAX_RECENT_YEARS) as i32;
                Some((0..span).map(|i| current_year - i).collect())
            }
        }
    }

    pub fn resolve_now(&self) -> Option<BTreeSet<i32>> {
        self.resolve(Utc::now().year())
    }
}

impl fmt::Display for YearSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearSelection::All => f.write_str("all"),
            YearSelection::Recent(n) => write!(f, "recent-{}", n),
            YearSelection::Years(years) => {
                let joined = years
                    .iter()
                    .map(|y| y.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                f.write_str(&joined)
            }
        }
    }
}

impl FromStr for YearSelection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let invalid = || Error::InvalidYears(s.clone());

        if s == "all" {
            return Ok(YearSelection::All);
        }
        if s == "recent" {
            return Ok(YearSelection::default());
        }
        if let Some(n) = s.strip_prefix("recent-") {
            let n: u32 = n.parse().map_err(|_| invalid())?;
            if n == 0 || n > MAX_RECENT_YEARS {
                return Err(invalid());
            }
            return Ok(YearSelection::Recent(n));
        }

        let mut years = BTreeSet::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.len() != 4 || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            years.insert(part.parse().map_err(|_| invalid())?);
        }
        Ok(YearSelection::Years(years))
    }
}

/// Downloads the list of available snapshots. Any failure is fatal.
pub fn fetch_catalog(fetcher: &dyn Fetcher, config: &Config) -> Result<Vec<SnapshotDescriptor>, Error> {
    let start_time = Instant::now();
    let url = config.catalog_url.as_str();
    info!(action = "start", component = "catalog", url, "Fetching snapshot catalog");

    let unavailable = |reason: String| Error::CatalogUnavailable {
        url: url.to_string(),
        reason,
    };

    let response = fetcher
        .get(url, config.catalog_timeout)
        .map_err(|e| unavailable(e.to_string()))?;

    if !response.is_ok() {
        return Err(unavailable(format!("HTTP status {}", response.status)));
    }

    let body = response
        .into_string()
        .map_err(|e| unavailable(format!("failed to read body: {}", e)))?;
    let catalog: Vec<SnapshotDescriptor> = serde_json::from_str(&body)
        .map_err(|e| unavailable(format!("malformed catalog JSON: {}", e)))?;

    info!(
        action = "complete",
        component = "catalog",
        snapshot_count = catalog.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Snapshot catalog fetched"
    );
    Ok(catalog)
}

/// Picks at most `max_per_year` most recent snapshots for each selected year.
///
/// `None` keeps the whole catalog in its original order. Otherwise the
/// result runs newest year first, ids descending within a year. Ids start
/// with the crawl date, so lexicographic order is chronological.
pub fn filter_by_years(
    catalog: &[SnapshotDescriptor],
    years: Option<&BTreeSet<i32>>,
    max_per_year: usize,
) -> Vec<SnapshotDescriptor> {
    let Some(years) = years else {
        return catalog.to_vec();
    };

    let mut by_year: BTreeMap<i32, Vec<&SnapshotDescriptor>> = BTreeMap::new();
    for descriptor in catalog {
        if let Some(year) = descriptor.year() {
            if years.contains(&year) {
                by_year.entry(year).or_default().push(descriptor);
            }
        }
    }

    for year in years {
        if !by_year.contains_key(year) {
            warn!(action = "filter", component = "catalog", year, "No snapshots for year, skipping");
        }
    }

    by_year
        .into_iter()
        .rev()
        .flat_map(|(_, mut descriptors)| {
            descriptors.sort_by(|a, b| b.id.cmp(&a.id));
            descriptors.into_iter().take(max_per_year).cloned()
        })
        .collect()
}
