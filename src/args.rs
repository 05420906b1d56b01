use clap::Parser;
use std::path::PathBuf;

use crate::catalog::YearSelection;
use crate::config::DEFAULT_MAX_PER_YEAR;

#[derive(Parser, Debug)]
#[command(
    name = "ccrawldns",
    about = "Discover subdomains of a target passively from Common Crawl archive indexes",
    version,
    long_about = None
)]
pub struct Args {
    /// Target domain to enumerate
    #[arg(short, long)]
    pub domain: String,

    /// Snapshot years: "all", a comma-separated list, or "recent-N"
    #[arg(short, long, default_value_t = YearSelection::default())]
    pub years: YearSelection,

    /// Maximum snapshots queried per selected year
    #[arg(short, long, default_value_t = DEFAULT_MAX_PER_YEAR)]
    pub max_per_year: usize,

    /// Number of worker threads (defaults to the CPU count)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Query snapshots one at a time
    #[arg(long, conflicts_with = "workers")]
    pub sequential: bool,

    /// Stop fingerprinting a subdomain at its first matching URL
    #[arg(long)]
    pub first_match: bool,

    /// Directory holding the per-domain result databases
    #[arg(long, default_value = "results")]
    pub db_dir: PathBuf,

    /// Override the snapshot catalog URL
    #[arg(long)]
    pub catalog_url: Option<String>,

    /// Override the HTTP User-Agent header
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
