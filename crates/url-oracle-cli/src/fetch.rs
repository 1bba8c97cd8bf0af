//! HTTP content fetcher.

use std::time::Duration;

use tracing::debug;
use url_oracle_core::{ContentFetcher, FetchError, FetchedContent};

/// Blocking HTTP GET, one attempt.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("url-oracle/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl ContentFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        debug!(%url, "fetching content");
        let response = self.client.get(url).send().map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().map_err(transport)?;
        Ok(FetchedContent::from_bytes(bytes.to_vec()))
    }
}
