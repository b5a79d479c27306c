//! Network access used by the update search and staging steps.

use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, UpdateError};
use crate::release::ReleaseInfo;

/// Abstraction over the network, substituted in tests.
pub trait Fetch {
    /// Fetches and parses a remote release manifest.
    fn fetch_manifest(&self, url: &str) -> Result<ReleaseInfo>;

    /// Downloads an artifact to `dest`.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// reqwest-backed fetcher used in production.
pub struct HttpFetch {
    client: reqwest::blocking::Client,
}

impl HttpFetch {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetch {
    fn fetch_manifest(&self, url: &str) -> Result<ReleaseInfo> {
        tracing::debug!("fetching release manifest from {url}");
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.json()?)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        tracing::info!("downloading {url}");
        let response = self.client.get(url).send()?.error_for_status()?;
        let bytes = response.bytes()?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| UpdateError::Io {
                operation: "create directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(dest, &bytes).map_err(|source| UpdateError::Io {
            operation: "write",
            path: dest.to_path_buf(),
            source,
        })
    }
}
