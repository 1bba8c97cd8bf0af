//! Check command implementation.

use std::path::PathBuf;

use url_oracle_canonical::Digest;
use url_oracle_core::ContentFetcher;
use url_oracle_store::check_for_change;

use crate::fetch::HttpFetcher;

pub fn run(
    url: Option<String>,
    file: Option<PathBuf>,
    previous: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let digest = match (url, file) {
        (_, Some(path)) => {
            let bytes = std::fs::read(&path)
                .map_err(|e| format!("Failed to read file {}: {}", path.display(), e))?;
            Digest::sha256(&bytes)
        }
        (Some(url), None) => HttpFetcher::new()?.fetch(&url)?.digest,
        (None, None) => return Err("either --url or --file is required".into()),
    };

    if check_for_change(&digest, previous.as_deref()) {
        println!("changed");
    } else {
        println!("unchanged");
    }
    Ok(())
}
