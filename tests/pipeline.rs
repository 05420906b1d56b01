use std::collections::{BTreeSet, HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Datelike;
use ccrawldns::error::TransportError;
use ccrawldns::{
    Config, Enumerator, Error, FetchResponse, Fetcher, ResultStore, ScanPolicy, Schedule,
    SubdomainRecord, TargetDomain, YearSelection,
};

const CATALOG_URL: &str = "https://cc.test/collinfo.json";

/// Serves canned responses per URL prefix and remembers every request.
struct CannedFetcher {
    routes: Mutex<HashMap<String, VecDeque<Result<(u16, String), TransportError>>>>,
    requests: Mutex<Vec<String>>,
}

impl CannedFetcher {
    fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn route(self, prefix: &str, status: u16, body: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(prefix.to_string())
            .or_default()
            .push_back(Ok((status, body.to_string())));
        self
    }

    fn fail(self, prefix: &str, message: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(prefix.to_string())
            .or_default()
            .push_back(Err(TransportError::new(message)));
        self
    }

    fn requests_to(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.starts_with(prefix))
            .count()
    }
}

impl Fetcher for CannedFetcher {
    fn get(&self, url: &str, _timeout: Duration) -> Result<FetchResponse, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());
        let mut routes = self.routes.lock().unwrap();
        let queue = routes
            .iter_mut()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, queue)| queue);

        match queue.and_then(|q| q.pop_front()) {
            Some(Ok((status, body))) => Ok(FetchResponse::new(status, Cursor::new(body))),
            Some(Err(e)) => Err(e),
            None => Err(TransportError::new(format!("no route for {}", url))),
        }
    }
}

fn endpoint(id: &str) -> String {
    format!("https://cc.test/{}-index", id)
}

fn catalog_json(ids: &[&str]) -> String {
    let entries: Vec<String> = ids
        .iter()
        .map(|id| format!(r#"{{"id": "{}", "name": "{}", "cdx-api": "{}"}}"#, id, id, endpoint(id)))
        .collect();
    format!("[{}]", entries.join(","))
}

fn ndjson(urls: &[&str]) -> String {
    urls.iter()
        .map(|u| format!("{{\"url\": \"{}\"}}\n", u))
        .collect()
}

fn config(schedule: Schedule) -> Config {
    Config {
        catalog_url: CATALOG_URL.to_string(),
        backoff_base: Duration::ZERO,
        retry_delay: Duration::ZERO,
        schedule,
        ..Config::default()
    }
}

fn target() -> TargetDomain {
    TargetDomain::parse("example.com").unwrap()
}

fn only_2024() -> YearSelection {
    YearSelection::Years(BTreeSet::from([2024]))
}

fn subdomains(records: &[SubdomainRecord]) -> Vec<&str> {
    records.iter().map(|r| r.subdomain.as_str()).collect()
}

#[test]
fn max_per_year_limits_queries_to_newest_snapshot() {
    let fetcher = CannedFetcher::new()
        .route(CATALOG_URL, 200, &catalog_json(&["CC-MAIN-2024-10", "CC-MAIN-2024-33"]))
        .route(
            &endpoint("CC-MAIN-2024-33"),
            200,
            &ndjson(&["https://www.example.com/index.php", "https://example.com/"]),
        )
        .route(
            &endpoint("CC-MAIN-2024-10"),
            200,
            &ndjson(&["https://old.example.com/"]),
        );
    let config = config(Schedule::Sequential);
    let store = ResultStore::open_in_memory(&target()).unwrap();

    let summary = Enumerator::new(&fetcher, &config, &store)
        .run(&only_2024(), 1)
        .unwrap();

    assert_eq!(fetcher.requests_to(&endpoint("CC-MAIN-2024-33")), 1);
    assert_eq!(fetcher.requests_to(&endpoint("CC-MAIN-2024-10")), 0);
    assert_eq!(summary.snapshots_selected, 1);
    assert_eq!(summary.total_subdomains, 2);
    assert_eq!(subdomains(&summary.records), vec!["example.com", "www.example.com"]);

    let www = store.get("www.example.com").unwrap().unwrap();
    assert_eq!(www.tags_display(), "PHP");
    assert_eq!(www.example_url.as_deref(), Some("https://www.example.com/index.php"));
}

#[test]
fn throttled_snapshot_is_abandoned_and_run_continues() {
    let fetcher = CannedFetcher::new()
        .route(CATALOG_URL, 200, &catalog_json(&["CC-MAIN-2024-33", "CC-MAIN-2024-26"]))
        .route(&endpoint("CC-MAIN-2024-33"), 503, "")
        .route(&endpoint("CC-MAIN-2024-33"), 503, "")
        .route(&endpoint("CC-MAIN-2024-33"), 503, "")
        .route(
            &endpoint("CC-MAIN-2024-26"),
            200,
            &ndjson(&["https://api.example.com/graphql"]),
        );
    let config = config(Schedule::Sequential);
    let store = ResultStore::open_in_memory(&target()).unwrap();

    let summary = Enumerator::new(&fetcher, &config, &store)
        .run(&only_2024(), 3)
        .unwrap();

    assert_eq!(fetcher.requests_to(&endpoint("CC-MAIN-2024-33")), 3);
    assert_eq!(summary.snapshots_abandoned, 1);
    assert_eq!(summary.snapshots_completed, 1);
    assert_eq!(subdomains(&summary.records), vec!["api.example.com"]);
    assert_eq!(summary.records[0].tags_display(), "GraphQL");
}

#[test]
fn catalog_failure_aborts_the_run() {
    let fetcher = CannedFetcher::new().route(CATALOG_URL, 500, "oops");
    let config = config(Schedule::Sequential);
    let store = ResultStore::open_in_memory(&target()).unwrap();

    let result = Enumerator::new(&fetcher, &config, &store).run(&only_2024(), 3);
    assert!(matches!(result, Err(Error::CatalogUnavailable { .. })));
}

#[test]
fn malformed_catalog_aborts_the_run() {
    let fetcher = CannedFetcher::new().route(CATALOG_URL, 200, "<html>maintenance</html>");
    let config = config(Schedule::Sequential);
    let store = ResultStore::open_in_memory(&target()).unwrap();

    let result = Enumerator::new(&fetcher, &config, &store).run(&YearSelection::All, 3);
    assert!(matches!(result, Err(Error::CatalogUnavailable { .. })));
}

#[test]
fn parallel_run_keeps_one_record_per_subdomain() {
    let ids = ["CC-MAIN-2024-10", "CC-MAIN-2024-18", "CC-MAIN-2024-26", "CC-MAIN-2024-33"];
    let mut fetcher = CannedFetcher::new().route(CATALOG_URL, 200, &catalog_json(&ids));
    for id in ids {
        fetcher = fetcher.route(
            &endpoint(id),
            200,
            &ndjson(&[
                "https://www.example.com/",
                "https://WWW.example.com:443/wp-admin/",
                &format!("https://{}.example.com/", id.to_ascii_lowercase()),
                "https://www.other.org/",
                "garbage",
            ]),
        );
    }
    let config = Config {
        scan_policy: ScanPolicy::AllUrls,
        ..config(Schedule::Parallel { workers: 4 })
    };
    let store = ResultStore::open_in_memory(&target()).unwrap();

    let summary = Enumerator::new(&fetcher, &config, &store)
        .run(&YearSelection::All, 1)
        .unwrap();

    assert_eq!(summary.snapshots_completed, 4);
    assert_eq!(summary.total_subdomains, 5);
    assert_eq!(summary.urls_read, 20);
    let www = store.get("www.example.com").unwrap().unwrap();
    assert_eq!(www.tags_display(), "WordPress");
}

#[test]
fn a_new_run_starts_from_an_empty_store() {
    let store = ResultStore::open_in_memory(&target()).unwrap();
    store
        .upsert(
            &SubdomainRecord::new("stale.example.com".into(), BTreeSet::new(), None),
            "CC-MAIN-2019-04",
        )
        .unwrap();

    let fetcher = CannedFetcher::new()
        .route(CATALOG_URL, 200, &catalog_json(&["CC-MAIN-2024-33"]))
        .route(&endpoint("CC-MAIN-2024-33"), 200, "");
    let config = config(Schedule::Sequential);

    let summary = Enumerator::new(&fetcher, &config, &store)
        .run(&only_2024(), 3)
        .unwrap();

    assert_eq!(summary.total_subdomains, 0);
    assert!(!store.contains("stale.example.com").unwrap());
}

#[test]
fn years_missing_from_catalog_select_nothing() {
    let fetcher = CannedFetcher::new().route(CATALOG_URL, 200, &catalog_json(&["CC-MAIN-2023-50"]));
    let config = config(Schedule::Sequential);
    let store = ResultStore::open_in_memory(&target()).unwrap();

    let summary = Enumerator::new(&fetcher, &config, &store)
        .run(&only_2024(), 3)
        .unwrap();

    assert_eq!(summary.snapshots_selected, 0);
    assert_eq!(fetcher.requests_to("https://cc.test/CC-MAIN"), 0);
}

#[test]
fn default_policy_unions_tags_across_a_subdomains_urls() {
    let fetcher = CannedFetcher::new()
        .route(CATALOG_URL, 200, &catalog_json(&["CC-MAIN-2024-33"]))
        .route(
            &endpoint("CC-MAIN-2024-33"),
            200,
            &ndjson(&[
                "https://www.example.com/",
                "https://www.example.com/a.php",
                "https://www.example.com/b.asp",
            ]),
        );
    let config = config(Schedule::Sequential);
    assert_eq!(config.scan_policy, ScanPolicy::AllUrls);
    let store = ResultStore::open_in_memory(&target()).unwrap();

    let summary = Enumerator::new(&fetcher, &config, &store)
        .run(&only_2024(), 3)
        .unwrap();

    assert_eq!(subdomains(&summary.records), vec!["www.example.com"]);
    let www = store.get("www.example.com").unwrap().unwrap();
    assert_eq!(www.tags_display(), "Classic ASP, PHP");
    assert_eq!(www.example_url.as_deref(), Some("https://www.example.com/a.php"));
}

#[test]
fn transport_failure_within_budget_still_yields_results() {
    let fetcher = CannedFetcher::new()
        .route(CATALOG_URL, 200, &catalog_json(&["CC-MAIN-2024-33"]))
        .fail(&endpoint("CC-MAIN-2024-33"), "connection reset by peer")
        .route(
            &endpoint("CC-MAIN-2024-33"),
            200,
            &ndjson(&["https://mail.example.com/owa/"]),
        );
    let config = config(Schedule::Sequential);
    let store = ResultStore::open_in_memory(&target()).unwrap();

    let summary = Enumerator::new(&fetcher, &config, &store)
        .run(&only_2024(), 3)
        .unwrap();

    assert_eq!(fetcher.requests_to(&endpoint("CC-MAIN-2024-33")), 2);
    assert_eq!(summary.snapshots_completed, 1);
    assert_eq!(summary.snapshots_abandoned, 0);
    assert_eq!(subdomains(&summary.records), vec!["mail.example.com"]);
    assert_eq!(summary.records[0].tags_display(), "Outlook Web Access");
}

#[test]
fn recent_selection_queries_the_current_years_snapshot() {
    let current = format!("CC-MAIN-{}-10", chrono::Utc::now().year());
    let fetcher = CannedFetcher::new()
        .route(CATALOG_URL, 200, &catalog_json(&[current.as_str(), "CC-MAIN-2009-01"]))
        .route(&endpoint(&current), 200, &ndjson(&["https://dev.example.com/"]));
    let config = config(Schedule::Sequential);
    let store = ResultStore::open_in_memory(&target()).unwrap();

    let summary = Enumerator::new(&fetcher, &config, &store)
        .run(&YearSelection::Recent(1), 3)
        .unwrap();

    assert_eq!(summary.snapshots_selected, 1);
    assert_eq!(fetcher.requests_to(&endpoint(&current)), 1);
    assert_eq!(fetcher.requests_to(&endpoint("CC-MAIN-2009-01")), 0);
    assert_eq!(subdomains(&summary.records), vec!["dev.example.com"]);
}
