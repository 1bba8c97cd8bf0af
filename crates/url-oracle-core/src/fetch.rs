//! Content fetching seam.

use url_oracle_canonical::Digest;

use crate::errors::FetchError;

/// Bytes fetched from a URL, with the digest and size the fetcher computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    /// Response body.
    pub bytes: Vec<u8>,
    /// SHA-256 of `bytes` as reported by the fetcher.
    pub digest: Digest,
    /// Length of `bytes` as reported by the fetcher.
    pub size: u64,
}

impl FetchedContent {
    /// Wraps a body, computing its digest and size.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            digest: Digest::sha256(&bytes),
            size: bytes.len() as u64,
            bytes,
        }
    }
}

/// Retrieves the content at a URL. One attempt, no retries.
pub trait ContentFetcher {
    /// Fetches `url`.
    fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError>;
}

impl<F: ContentFetcher + ?Sized> ContentFetcher for &F {
    fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        (**self).fetch(url)
    }
}
