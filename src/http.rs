use std::io::{BufRead, BufReader, Read};
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, TransportError};

/// A response whose body is read lazily, line by line.
pub struct FetchResponse {
    pub status: u16,
    pub body: Box<dyn BufRead + Send>,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl BufRead + Send + 'static) -> Self {
        Self {
            status,
            body: Box::new(body),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn into_string(self) -> std::io::Result<String> {
        let mut body = self.body;
        let mut text = String::new();
        body.read_to_string(&mut text)?;
        Ok(text)
    }
}

/// Blocking HTTP GET. Shared by every worker, so it must be `Sync`.
pub trait Fetcher: Send + Sync {
    fn get(&self, url: &str, timeout: Duration) -> Result<FetchResponse, TransportError>;
}

/// `Fetcher` backed by a pooled `reqwest` client.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &str, timeout: Duration) -> Result<FetchResponse, TransportError> {
        debug!(action = "request", component = "http", url, timeout_s = timeout.as_secs(), "Sending GET");
        let response = self.client.get(url).timeout(timeout).send()?;
        let status = response.status().as_u16();
        Ok(FetchResponse::new(status, BufReader::new(response)))
    }
}
