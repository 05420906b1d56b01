use std::io::{self, BufRead};
use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};
use url::Url;

use crate::catalog::SnapshotDescriptor;
use crate::config::Config;
use crate::domain::TargetDomain;
use crate::error::{RecordParseError, SnapshotError};
use crate::http::Fetcher;

/// Queries one snapshot's index for every URL under the target domain.
pub struct SnapshotQueryEngine<'a> {
    fetcher: &'a dyn Fetcher,
    config: &'a Config,
}

impl<'a> SnapshotQueryEngine<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, config: &'a Config) -> Self {
        Self { fetcher, config }
    }

    /// Like `try_query`, but a failed snapshot is logged and comes back empty.
    pub fn query(&self, descriptor: &SnapshotDescriptor, target: &TargetDomain) -> ArchivedUrls {
        match self.try_query(descriptor, target) {
            Ok(urls) => urls,
            Err(e) => {
                warn!(
                    action = "abandon",
                    component = "snapshot_query",
                    snapshot = %descriptor.id,
                    error = %e,
                    "Abandoning snapshot"
                );
                ArchivedUrls::abandoned(descriptor.id.clone(), e)
            }
        }
    }

    /// Runs the request with the retry policy: 503 backs off exponentially,
    /// transport failures wait a fixed delay, any other status gives up at once.
    pub fn try_query(
        &self,
        descriptor: &SnapshotDescriptor,
        target: &TargetDomain,
    ) -> Result<ArchivedUrls, SnapshotError> {
        let start_time = Instant::now();
        let url = build_query_url(&descriptor.query_endpoint, target, self.config.page_size)?;
        let max_attempts = self.config.max_attempts.max(1);

        info!(action = "start", component = "snapshot_query", snapshot = %descriptor.id, "Processing snapshot");

        let mut attempt = 0;
        loop {
            attempt += 1;

            let failure = match self.fetcher.get(url.as_str(), self.config.query_timeout) {
                Ok(response) if response.status == 200 => match read_lines(response.body) {
                    Ok(lines) => {
                        info!(
                            action = "response",
                            component = "snapshot_query",
                            snapshot = %descriptor.id,
                            attempt,
                            line_count = lines.len(),
                            duration_ms = start_time.elapsed().as_millis(),
                            "Snapshot responded"
                        );
                        return Ok(ArchivedUrls::from_lines(descriptor.id.clone(), lines));
                    }
                    Err(e) => format!("response body broke off: {}", e),
                },
                Ok(response) if response.status == 503 => {
                    if attempt >= max_attempts {
                        return Err(SnapshotError::Throttled { attempts: attempt });
                    }
                    let delay = self.config.throttle_delay(attempt);
                    warn!(
                        action = "backoff",
                        component = "snapshot_query",
                        snapshot = %descriptor.id,
                        attempt,
                        delay_ms = delay.as_millis(),
                        "Throttled by archive index, backing off"
                    );
                    thread::sleep(delay);
                    continue;
                }
                Ok(response) => {
                    return Err(SnapshotError::Status {
                        status: response.status,
                    });
                }
                Err(e) => e.message,
            };

            if attempt >= max_attempts {
                return Err(SnapshotError::Transport {
                    attempts: attempt,
                    message: failure,
                });
            }
            warn!(
                action = "retry",
                component = "snapshot_query",
                snapshot = %descriptor.id,
                attempt,
                error = %failure,
                "Transport failure, retrying"
            );
            thread::sleep(self.config.retry_delay);
        }
    }
}

/// Drains a response body. A timeout mid-body surfaces here, inside the
/// retry loop, instead of silently truncating the snapshot.
fn read_lines(body: Box<dyn BufRead + Send>) -> io::Result<Vec<String>> {
    body.lines().collect()
}

fn build_query_url(
    endpoint: &str,
    target: &TargetDomain,
    page_size: u32,
) -> Result<Url, SnapshotError> {
    let mut url = Url::parse(endpoint).map_err(|_| SnapshotError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
    })?;
    url.query_pairs_mut()
        .append_pair("url", target.as_str())
        .append_pair("matchType", "domain")
        .append_pair("fl", "url")
        .append_pair("output", "json")
        .append_pair("pageSize", &page_size.to_string());
    Ok(url)
}

/// Archived URLs of one snapshot, parsed lazily from the NDJSON lines.
///
/// Bad lines are skipped and counted.
pub struct ArchivedUrls {
    snapshot_id: String,
    lines: std::vec::IntoIter<String>,
    abandoned: Option<SnapshotError>,
    skipped: usize,
}

impl ArchivedUrls {
    pub fn from_lines(snapshot_id: String, lines: Vec<String>) -> Self {
        Self {
            snapshot_id,
            lines: lines.into_iter(),
            abandoned: None,
            skipped: 0,
        }
    }

    pub fn abandoned(snapshot_id: String, reason: SnapshotError) -> Self {
        Self {
            snapshot_id,
            lines: Vec::new().into_iter(),
            abandoned: Some(reason),
            skipped: 0,
        }
    }

    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.is_some()
    }

    pub fn abandon_reason(&self) -> Option<&SnapshotError> {
        self.abandoned.as_ref()
    }

    /// Lines dropped so far because they did not parse.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for ArchivedUrls {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        for line in self.lines.by_ref() {
            if line.trim().is_empty() {
                continue;
            }

            match parse_record(&line) {
                Ok(url) => return Some(url),
                Err(e) => {
                    self.skipped += 1;
                    debug!(
                        action = "parse",
                        component = "snapshot_query",
                        snapshot = %self.snapshot_id,
                        error = %e,
                        "Skipping response line"
                    );
                }
            }
        }
        None
    }
}

/// Pulls the `url` field out of one response line.
pub fn parse_record(line: &str) -> Result<String, RecordParseError> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    value
        .get("url")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or(RecordParseError::MissingUrl)
}
