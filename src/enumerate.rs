use std::collections::HashMap;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::catalog::{self, SnapshotDescriptor, YearSelection};
use crate::config::{Config, Schedule};
use crate::domain::{extract_subdomain, TargetDomain};
use crate::error::Result;
use crate::fingerprint::Fingerprinter;
use crate::http::Fetcher;
use crate::query::SnapshotQueryEngine;
use crate::sqlite::ResultStore;
use crate::stats::{RunSummary, SnapshotStats, SubdomainRecord};

/// Drives one enumeration run against a single target domain.
pub struct Enumerator<'a> {
    fetcher: &'a dyn Fetcher,
    config: &'a Config,
    store: &'a ResultStore,
    target: TargetDomain,
    fingerprinter: Fingerprinter,
}

impl<'a> Enumerator<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, config: &'a Config, store: &'a ResultStore) -> Self {
        Self {
            fetcher,
            config,
            store,
            target: store.domain().clone(),
            fingerprinter: Fingerprinter::new(config.scan_policy),
        }
    }

    /// Resets the store, selects snapshots, mines them, and summarizes.
    ///
    /// Only a missing catalog (or a broken store) fails the run; snapshots
    /// that cannot be queried are logged and skipped.
    pub fn run(&self, years: &YearSelection, max_per_year: usize) -> Result<RunSummary> {
        let total_start_time = Instant::now();
        info!(action = "start", component = "enumeration", domain = %self.target, years = %years, max_per_year, "Starting enumeration");

        self.store.reset()?;

        let catalog = catalog::fetch_catalog(self.fetcher, self.config)?;
        let selected_years = years.resolve_now();
        let descriptors = catalog::filter_by_years(&catalog, selected_years.as_ref(), max_per_year);

        if descriptors.is_empty() {
            warn!(action = "select", component = "enumeration", catalog_size = catalog.len(), "No snapshots matched the year selection");
        } else {
            info!(action = "select", component = "enumeration", selected = descriptors.len(), catalog_size = catalog.len(), "Snapshots selected");
        }

        let per_snapshot = self.process_all(&descriptors)?;

        let mut summary = RunSummary {
            snapshots_selected: descriptors.len(),
            snapshots_completed: 0,
            snapshots_abandoned: 0,
            urls_read: 0,
            records_inserted: 0,
            total_subdomains: self.store.count()?,
            records: self.store.list_all()?,
            duration: total_start_time.elapsed(),
        };
        for stats in &per_snapshot {
            if stats.abandoned {
                summary.snapshots_abandoned += 1;
            } else {
                summary.snapshots_completed += 1;
            }
            summary.urls_read += stats.urls_read;
            summary.records_inserted += stats.records_inserted;
        }

        info!(
            action = "complete",
            component = "enumeration",
            subdomains = summary.total_subdomains,
            completed = summary.snapshots_completed,
            abandoned = summary.snapshots_abandoned,
            duration_ms = summary.duration.as_millis(),
            "Enumeration completed"
        );
        Ok(summary)
    }

    fn process_all(&self, descriptors: &[SnapshotDescriptor]) -> Result<Vec<SnapshotStats>> {
        match self.config.schedule {
            Schedule::Sequential => {
                info!(action = "configure", component = "enumeration", "Processing snapshots sequentially");
                descriptors.iter().map(|d| self.process_snapshot(d)).collect()
            }
            Schedule::Parallel { workers } => {
                let workers = workers.max(1);
                info!(action = "configure", component = "enumeration", worker_count = workers, "Using workers for processing");

                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("snapshot-worker-{}", i))
                    .build()?;

                pool.install(|| {
                    descriptors
                        .par_iter()
                        .map(|d| self.process_snapshot(d))
                        .collect()
                })
            }
        }
    }

    /// Queries one snapshot and stores a record for every new subdomain in it.
    pub fn process_snapshot(&self, descriptor: &SnapshotDescriptor) -> Result<SnapshotStats> {
        let start_time = Instant::now();
        let engine = SnapshotQueryEngine::new(self.fetcher, self.config);
        let mut urls = engine.query(descriptor, &self.target);

        // Grouped in first-seen order so the fingerprint example is stable.
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        let mut stats = SnapshotStats::default();

        for url in urls.by_ref() {
            stats.urls_read += 1;
            if let Some(subdomain) = extract_subdomain(&url, &self.target) {
                groups
                    .entry(subdomain)
                    .or_insert_with_key(|key| {
                        order.push(key.clone());
                        Vec::new()
                    })
                    .push(url);
            }
        }
        stats.lines_skipped = urls.skipped();
        stats.abandoned = urls.is_abandoned();
        stats.subdomains_seen = order.len();

        for subdomain in order {
            if self.store.contains(&subdomain)? {
                continue;
            }
            let group = groups.remove(&subdomain).unwrap_or_default();
            let fingerprint = self.fingerprinter.classify(&group);
            let record = SubdomainRecord::from_fingerprint(subdomain, fingerprint);

            match self.store.upsert(&record, &descriptor.id) {
                Ok(true) => {
                    stats.records_inserted += 1;
                    debug!(
                        action = "discover",
                        component = "enumeration",
                        snapshot = %descriptor.id,
                        subdomain = %record.subdomain,
                        tags = %record.tags_display(),
                        "New subdomain"
                    );
                }
                Ok(false) => {}
                Err(e) => {
                    error!(action = "store", component = "enumeration", subdomain = %record.subdomain, error = %e, "Failed to store subdomain");
                    return Err(e);
                }
            }
        }

        if !stats.abandoned {
            info!(
                action = "complete",
                component = "snapshot",
                snapshot = %descriptor.id,
                urls_read = stats.urls_read,
                lines_skipped = stats.lines_skipped,
                subdomains_seen = stats.subdomains_seen,
                records_inserted = stats.records_inserted,
                duration_ms = start_time.elapsed().as_millis(),
                "Snapshot processed"
            );
        }
        Ok(stats)
    }
}

pub fn print_summary(summary: &RunSummary, target: &TargetDomain) {
    println!("\n--- Common Crawl subdomains of {} ---", target);
    println!(
        "Snapshots queried: {} ({} abandoned)",
        crate::utils::format_number(summary.snapshots_selected as u64),
        crate::utils::format_number(summary.snapshots_abandoned as u64)
    );
    println!(
        "Archived URLs read: {}",
        crate::utils::format_number(summary.urls_read as u64)
    );
    println!(
        "\n[+] In total {} unique subdomains were retrieved.",
        crate::utils::format_number(summary.total_subdomains as u64)
    );

    for record in &summary.records {
        let tags = if record.tech_tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", record.tags_display())
        };
        match &record.example_url {
            Some(example) => println!("Subdomain found: {}{} e.g. {}", record.subdomain, tags, example),
            None => println!("Subdomain found: {}{}", record.subdomain, tags),
        }
    }
}
