pub mod args;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod enumerate;
pub mod error;
pub mod fingerprint;
pub mod http;
pub mod query;
pub mod sqlite;
pub mod stats;
pub mod utils;

pub use args::Args;
pub use catalog::{SnapshotDescriptor, YearSelection};
pub use config::{Config, Schedule};
pub use domain::{extract_subdomain, TargetDomain};
pub use enumerate::{print_summary, Enumerator};
pub use error::{Error, SnapshotError};
pub use fingerprint::{Fingerprint, Fingerprinter, ScanPolicy};
pub use http::{FetchResponse, Fetcher, HttpFetcher};
pub use query::{ArchivedUrls, SnapshotQueryEngine};
pub use sqlite::ResultStore;
pub use stats::{RunSummary, SubdomainRecord};
