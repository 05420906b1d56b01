//! Path-based technology fingerprinting.
//!
//! Archived URLs say a lot about what runs behind a host: script extensions
//! betray the server-side language, well-known directories betray the CMS,
//! and leftovers like `/.git/` point at exposed resources. Two static tables
//! drive the classification: one keyed by file suffix, one by path fragment.

use std::collections::BTreeSet;
use std::time::Instant;

use tracing::debug;
use url::Url;

/// File suffix of the URL path → tag.
pub const EXTENSION_TAGS: &[(&str, &str)] = &[
    (".php", "PHP"),
    (".php3", "PHP"),
    (".php4", "PHP"),
    (".php5", "PHP"),
    (".phtml", "PHP"),
    (".asp", "Classic ASP"),
    (".aspx", "ASP.NET"),
    (".ashx", "ASP.NET"),
    (".asmx", "ASP.NET"),
    (".axd", "ASP.NET"),
    (".jsp", "Java (JSP)"),
    (".jspx", "Java (JSP)"),
    (".do", "Java (Struts)"),
    (".action", "Java (Struts)"),
    (".jsf", "Java (JSF)"),
    (".cfm", "ColdFusion"),
    (".cfml", "ColdFusion"),
    (".cgi", "CGI"),
    (".pl", "Perl"),
    (".py", "Python"),
    (".rb", "Ruby"),
    (".shtml", "Server Side Includes"),
    (".nsf", "Lotus Domino"),
    (".wsdl", "SOAP Web Service"),
    (".bak", "Backup File"),
    (".old", "Backup File"),
    (".swp", "Backup File"),
    (".zip", "Archive File"),
    (".tar.gz", "Archive File"),
    (".sql", "Database Dump"),
    (".mdb", "Database Dump"),
    (".log", "Log File"),
    (".env", "Environment File"),
    (".ini", "Configuration File"),
    (".conf", "Configuration File"),
    (".yml", "Configuration File"),
];

/// Characteristic path fragment → tag.
pub const PATH_TAGS: &[(&str, &str)] = &[
    ("/wp-content/", "WordPress"),
    ("/wp-includes/", "WordPress"),
    ("/wp-admin", "WordPress"),
    ("/wp-json/", "WordPress"),
    ("/administrator/", "Joomla"),
    ("/components/com_", "Joomla"),
    ("/sites/default/files", "Drupal"),
    ("/typo3/", "TYPO3"),
    ("/umbraco/", "Umbraco"),
    ("/skin/frontend/", "Magento"),
    ("/static/version", "Magento"),
    ("/bitrix/", "Bitrix"),
    ("/admin", "Admin Panel"),
    ("/login", "Login Page"),
    ("/phpmyadmin", "phpMyAdmin"),
    ("/phpinfo", "PHP"),
    ("/cgi-bin/", "CGI"),
    ("/web-inf/", "Java (WEB-INF)"),
    ("/servlet/", "Java Servlet"),
    ("/actuator", "Spring Boot Actuator"),
    ("/jenkins", "Jenkins"),
    ("/jmx-console", "JBoss"),
    ("/owa/", "Outlook Web Access"),
    ("/ecp/", "Exchange Control Panel"),
    ("/_vti_bin/", "SharePoint"),
    ("/_layouts/", "SharePoint"),
    ("/server-status", "Apache Status Page"),
    ("/graphql", "GraphQL"),
    ("/swagger", "Swagger / OpenAPI"),
    ("/api-docs", "Swagger / OpenAPI"),
    ("/api/", "API Endpoint"),
    ("/.git/", "Exposed Git Repository"),
    ("/.svn/", "Exposed SVN Repository"),
    ("/.hg/", "Exposed Mercurial Repository"),
    ("/.env", "Environment File"),
    ("/.ds_store", "Exposed .DS_Store"),
    ("/.htaccess", "Exposed .htaccess"),
    ("/backup", "Backup File"),
    ("/config", "Configuration File"),
    ("/debug", "Debug Endpoint"),
];

/// How many URLs of a subdomain are inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPolicy {
    /// Stop at the first URL that matched anything.
    FirstMatch,
    /// Inspect every URL and union the tags.
    #[default]
    AllUrls,
}

/// Outcome of classifying one subdomain's URLs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fingerprint {
    pub tags: BTreeSet<String>,
    pub example_url: Option<String>,
}

impl Fingerprint {
    /// Tags sorted and comma-joined for display.
    pub fn tags_display(&self) -> String {
        join_tags(&self.tags)
    }
}

pub fn join_tags(tags: &BTreeSet<String>) -> String {
    tags.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Fingerprinter {
    policy: ScanPolicy,
}

impl Fingerprinter {
    pub fn new(policy: ScanPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ScanPolicy {
        self.policy
    }

    pub fn classify<S: AsRef<str>>(&self, urls: &[S]) -> Fingerprint {
        let start_time = Instant::now();
        let mut tags = BTreeSet::new();
        let mut example_url = None;
        let mut scanned = 0usize;

        for url in urls {
            let url = url.as_ref();
            scanned += 1;

            let matched = match lowercase_path(url) {
                Some(path) => match_path(&path, &mut tags),
                None => false,
            };

            if matched {
                if example_url.is_none() {
                    example_url = Some(url.to_string());
                }
                if self.policy == ScanPolicy::FirstMatch {
                    break;
                }
            }
        }

        if example_url.is_none() {
            example_url = urls.first().map(|u| u.as_ref().to_string());
        }

        debug!(
            action = "classify",
            component = "fingerprint",
            url_count = urls.len(),
            scanned,
            tag_count = tags.len(),
            duration_us = start_time.elapsed().as_micros(),
            "Classified subdomain URLs"
        );

        Fingerprint { tags, example_url }
    }
}

/// Adds every table hit for `path` to `tags`; true if anything matched.
fn match_path(path: &str, tags: &mut BTreeSet<String>) -> bool {
    let mut matched = false;

    for (extension, tag) in EXTENSION_TAGS {
        if path.ends_with(extension) {
            tags.insert((*tag).to_string());
            matched = true;
        }
    }

    for (fragment, tag) in PATH_TAGS {
        if path.contains(fragment) {
            tags.insert((*tag).to_string());
            matched = true;
        }
    }

    matched
}

fn lowercase_path(raw_url: &str) -> Option<String> {
    let raw_url = raw_url.trim();
    let parsed = if raw_url.contains("://") {
        Url::parse(raw_url)
    } else {
        Url::parse(&format!("http://{}", raw_url))
    }
    .ok()?;
    Some(parsed.path().to_ascii_lowercase())
}
