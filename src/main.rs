use anyhow::Result;
use clap::Parser;
use tracing::error;

use ccrawldns::{
    print_summary, utils, Args, Config, Enumerator, HttpFetcher, ResultStore, TargetDomain,
};

fn run(args: &Args) -> Result<()> {
    let target = TargetDomain::parse(&args.domain)?;
    let config = Config::from_args(args);

    let fetcher = HttpFetcher::new(&config)?;
    let store = ResultStore::open(&config.db_dir, &target)?;

    let summary = Enumerator::new(&fetcher, &config, &store).run(&args.years, args.max_per_year)?;
    print_summary(&summary, &target);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    utils::setup_logging(args.verbose);
    utils::validate_args(&args)?;

    match run(&args) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Error: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
