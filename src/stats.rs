use std::collections::BTreeSet;
use std::time::Duration;

use crate::fingerprint::{join_tags, Fingerprint};

/// One discovered subdomain, as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdomainRecord {
    pub subdomain: String,
    pub tech_tags: BTreeSet<String>,
    pub example_url: Option<String>,
}

impl SubdomainRecord {
    pub fn new(subdomain: String, tech_tags: BTreeSet<String>, example_url: Option<String>) -> Self {
        Self {
            subdomain,
            tech_tags,
            example_url,
        }
    }

    pub fn from_fingerprint(subdomain: String, fingerprint: Fingerprint) -> Self {
        Self::new(subdomain, fingerprint.tags, fingerprint.example_url)
    }

    pub fn tags_display(&self) -> String {
        join_tags(&self.tech_tags)
    }
}

/// What happened to a single snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub urls_read: usize,
    pub lines_skipped: usize,
    pub subdomains_seen: usize,
    pub records_inserted: usize,
    pub abandoned: bool,
}

#[derive(Debug)]
pub struct RunSummary {
    pub snapshots_selected: usize,
    pub snapshots_completed: usize,
    pub snapshots_abandoned: usize,
    pub urls_read: usize,
    pub records_inserted: usize,
    pub total_subdomains: usize,
    pub records: Vec<SubdomainRecord>,
    pub duration: Duration,
}
