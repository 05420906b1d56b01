use std::path::PathBuf;
use std::time::Duration;

use crate::args::Args;
use crate::fingerprint::ScanPolicy;

pub const DEFAULT_CATALOG_URL: &str = "https://index.commoncrawl.org/collinfo.json";
pub const DEFAULT_USER_AGENT: &str = concat!("ccrawldns/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_PAGE_SIZE: u32 = 2000;
pub const DEFAULT_MAX_PER_YEAR: usize = 3;

/// How snapshots are scheduled across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Sequential,
    Parallel { workers: usize },
}

impl Schedule {
    pub fn parallel_default() -> Self {
        Schedule::Parallel {
            workers: num_cpus::get().max(1),
        }
    }
}

/// Everything a run needs, handed to each component at construction.
#[derive(Debug, Clone)]
pub struct Config {
    pub catalog_url: String,
    pub catalog_timeout: Duration,
    pub query_timeout: Duration,
    pub max_attempts: u32,
    /// First 503 backoff; doubled on every further throttled attempt.
    pub backoff_base: Duration,
    /// Fixed pause after a transport failure.
    pub retry_delay: Duration,
    pub page_size: u32,
    pub user_agent: String,
    pub scan_policy: ScanPolicy,
    pub schedule: Schedule,
    pub db_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            catalog_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(40),
            max_attempts: 3,
            backoff_base: Duration::from_secs(5),
            retry_delay: Duration::from_secs(5),
            page_size: DEFAULT_PAGE_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            scan_policy: ScanPolicy::AllUrls,
            schedule: Schedule::parallel_default(),
            db_dir: PathBuf::from("results"),
        }
    }
}

impl Config {
    pub fn from_args(args: &Args) -> Self {
        let defaults = Config::default();

        let schedule = if args.sequential {
            Schedule::Sequential
        } else {
            match args.workers {
                Some(workers) => Schedule::Parallel { workers },
                None => defaults.schedule,
            }
        };

        let scan_policy = if args.first_match {
            ScanPolicy::FirstMatch
        } else {
            ScanPolicy::AllUrls
        };

        Self {
            catalog_url: args
                .catalog_url
                .clone()
                .unwrap_or(defaults.catalog_url),
            user_agent: args.user_agent.clone().unwrap_or(defaults.user_agent),
            db_dir: args.db_dir.clone(),
            scan_policy,
            schedule,
            ..defaults
        }
    }

    /// Delay before retrying after the `attempt`-th (1-based) throttled response.
    pub fn throttle_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }
}
