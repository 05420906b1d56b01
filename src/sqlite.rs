use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use tracing::info;

use crate::domain::TargetDomain;
use crate::error::Result;
use crate::stats::SubdomainRecord;

const TAG_SEPARATOR: &str = ",";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS subdomains (
    subdomain TEXT NOT NULL PRIMARY KEY COLLATE NOCASE,
    tech_tags TEXT NOT NULL,
    example_url TEXT,
    snapshot_id TEXT NOT NULL,
    discovered_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

/// Per-domain subdomain records. Inserts go through one mutex-guarded
/// connection, so concurrent workers never race on the unique key.
pub struct ResultStore {
    conn: Mutex<Connection>,
    domain: TargetDomain,
    path: Option<PathBuf>,
}

impl ResultStore {
    /// Opens (creating if needed) `<dir>/<domain>.db`.
    pub fn open(dir: &Path, domain: &TargetDomain) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(database_file_name(domain));
        info!(action = "open", component = "result_store", path = ?path, "Opening result database");

        let conn = Connection::open(&path)?;
        conn.execute(CREATE_TABLE, [])?;

        Ok(Self {
            conn: Mutex::new(conn),
            domain: domain.clone(),
            path: Some(path),
        })
    }

    pub fn open_in_memory(domain: &TargetDomain) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(CREATE_TABLE, [])?;
        Ok(Self {
            conn: Mutex::new(conn),
            domain: domain.clone(),
            path: None,
        })
    }

    pub fn domain(&self) -> &TargetDomain {
        &self.domain
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Drops every record of this domain, leaving an empty table.
    pub fn reset(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute("DROP TABLE IF EXISTS subdomains", [])?;
        conn.execute(CREATE_TABLE, [])?;
        info!(action = "reset", component = "result_store", domain = %self.domain, "Result store reset");
        Ok(())
    }

    /// Inserts `record` unless the subdomain is already stored.
    /// Returns whether a row was written.
    pub fn upsert(&self, record: &SubdomainRecord, snapshot_id: &str) -> Result<bool> {
        let conn = self.lock();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO subdomains (subdomain, tech_tags, example_url, snapshot_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.subdomain,
                encode_tags(&record.tech_tags),
                record.example_url,
                snapshot_id
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn contains(&self, subdomain: &str) -> Result<bool> {
        let conn = self.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM subdomains WHERE subdomain = ?1",
                [subdomain],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get(&self, subdomain: &str) -> Result<Option<SubdomainRecord>> {
        let conn = self.lock();
        let record = conn
            .query_row(
                "SELECT subdomain, tech_tags, example_url FROM subdomains WHERE subdomain = ?1",
                [subdomain],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn list_all(&self) -> Result<Vec<SubdomainRecord>> {
        let start_time = Instant::now();
        let conn = self.lock();
        let records = conn
            .prepare("SELECT subdomain, tech_tags, example_url FROM subdomains ORDER BY subdomain")?
            .query_map([], row_to_record)?
            .collect::<SqliteResult<Vec<SubdomainRecord>>>()?;

        info!(
            action = "list",
            component = "result_store",
            record_count = records.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Listed stored subdomains"
        );
        Ok(records)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM subdomains", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // SQLite statements are atomic; a poisoned lock holds no partial state.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> SqliteResult<SubdomainRecord> {
    let tags: String = row.get(1)?;
    Ok(SubdomainRecord::new(row.get(0)?, decode_tags(&tags), row.get(2)?))
}

/// `example.com` → `example_com.db`.
pub fn database_file_name(domain: &TargetDomain) -> String {
    let stem: String = domain
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}.db", stem)
}

fn encode_tags(tags: &BTreeSet<String>) -> String {
    tags.iter().map(String::as_str).collect::<Vec<_>>().join(TAG_SEPARATOR)
}

fn decode_tags(raw: &str) -> BTreeSet<String> {
    raw.split(TAG_SEPARATOR)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
