use std::path::Path;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use dropship_platform::Platform;

use crate::version::ReleaseVersion;

/// Where the update client learns about and fetches published releases.
///
/// `latest` degrades to `None` on any failure: an unreachable remote means
/// "cannot determine, proceed conservatively", never a crash. Fetching the
/// archive is different — by the time it runs the caller has committed to
/// an update, so failures there are errors.
#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn latest(&self, platform: Platform) -> Option<ReleaseVersion>;

    async fn fetch_archive(&self, platform: Platform, dest: &Path) -> Result<(), FetchError>;
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("download failed with HTTP {status}")]
    HttpStatus { status: reqwest::StatusCode },
    #[error("failed to write download to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Discovery over the publish authority's HTTP surface.
pub struct HttpVersionSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct LatestResponse {
    version: String,
    #[serde(default)]
    platform: Option<String>,
}

impl HttpVersionSource {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Ask the dedicated latest endpoint for one platform.
    async fn latest_from_endpoint(&self, platform: Platform) -> Option<ReleaseVersion> {
        let url = format!("{}/versions/latest/{platform}", self.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(error) => {
                debug!("latest endpoint unreachable ({url}): {error}");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!("latest endpoint returned HTTP {} for {url}", response.status());
            return None;
        }

        let body: LatestResponse = match response.json().await {
            Ok(body) => body,
            Err(error) => {
                warn!("malformed latest response from {url}: {error}");
                return None;
            }
        };

        if let Some(reported) = &body.platform
            && reported.as_str() != platform.name()
        {
            warn!("latest endpoint answered for {reported}, expected {platform}");
            return None;
        }

        match body.version.parse() {
            Ok(version) => Some(version),
            Err(error) => {
                warn!("latest endpoint returned unparseable version {:?}: {error}", body.version);
                None
            }
        }
    }

    /// Fall back to the full artifact listing and pick the newest matching
    /// name ourselves.
    async fn latest_from_listing(&self, platform: Platform) -> Option<ReleaseVersion> {
        let url = format!("{}/versions", self.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!("version listing unreachable ({url}): {error}");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!("version listing returned HTTP {} for {url}", response.status());
            return None;
        }

        let names: Vec<String> = match response.json().await {
            Ok(names) => names,
            Err(error) => {
                warn!("malformed version listing from {url}: {error}");
                return None;
            }
        };

        newest_in_listing(names.iter().map(String::as_str), platform)
    }
}

/// Pick the maximum version among artifact names that match one platform's
/// naming convention. Malformed or foreign entries are skipped, not errors.
pub fn newest_in_listing<'a>(
    names: impl Iterator<Item = &'a str>,
    platform: Platform,
) -> Option<ReleaseVersion> {
    names
        .filter_map(ReleaseVersion::parse_artifact_name)
        .filter(|(_, p)| *p == platform)
        .map(|(version, _)| version)
        .max()
}

#[async_trait]
impl VersionSource for HttpVersionSource {
    async fn latest(&self, platform: Platform) -> Option<ReleaseVersion> {
        if let Some(version) = self.latest_from_endpoint(platform).await {
            debug!("latest {platform} version (endpoint): {version}");
            return Some(version);
        }
        let version = self.latest_from_listing(platform).await;
        match &version {
            Some(version) => debug!("latest {platform} version (listing): {version}"),
            None => info!("no published version found for {platform}"),
        }
        version
    }

    async fn fetch_archive(&self, platform: Platform, dest: &Path) -> Result<(), FetchError> {
        use futures_util::StreamExt;

        let url = format!(
            "{}/{}",
            self.base_url,
            ReleaseVersion::latest_file_name(platform)
        );
        info!("downloading {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(FetchError::Request)?;
        if !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                status: response.status(),
            });
        }

        let io_error = |source| FetchError::Io {
            path: dest.display().to_string(),
            source,
        };

        let mut file = tokio::fs::File::create(dest).await.map_err(io_error)?;
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(FetchError::Request)?;
            file.write_all(&chunk).await.map_err(io_error)?;
            downloaded += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error)?;

        info!("download complete: {downloaded} bytes");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(s: &str) -> ReleaseVersion {
        s.parse().unwrap()
    }

    #[test]
    fn newest_in_listing_picks_the_maximum_for_the_platform() {
        let names = [
            "2024-01-05.1-linux.tar.gz",
            "2024-01-05.3-linux.tar.gz",
            "2024-01-05.2-linux.tar.gz",
            "2024-01-09.1-windows.zip",
        ];

        assert_eq!(
            newest_in_listing(names.iter().copied(), Platform::Linux),
            Some(version("2024-01-05.3"))
        );
        assert_eq!(
            newest_in_listing(names.iter().copied(), Platform::Windows),
            Some(version("2024-01-09.1"))
        );
    }

    #[test]
    fn newest_in_listing_skips_malformed_entries() {
        let names = [
            "garbage",
            "latest-linux.tar.gz",
            "2024-01-05.0-linux.tar.gz",
            "2024-13-05.1-linux.tar.gz",
            "2024-01-05.2-linux.tar.gz",
        ];

        assert_eq!(
            newest_in_listing(names.iter().copied(), Platform::Linux),
            Some(version("2024-01-05.2"))
        );
    }

    #[test]
    fn newest_in_listing_is_absent_for_empty_or_foreign_listings() {
        assert_eq!(
            newest_in_listing(std::iter::empty::<&str>(), Platform::Linux),
            None
        );

        let windows_only = ["2024-01-05.1-windows.zip"];
        assert_eq!(
            newest_in_listing(windows_only.iter().copied(), Platform::Linux),
            None
        );
    }

    #[tokio::test]
    async fn unreachable_remote_yields_absent_not_error() {
        // Port 9 (discard) with nothing listening; connection is refused.
        let source = HttpVersionSource::new("http://127.0.0.1:9");
        assert_eq!(source.latest(Platform::Linux).await, None);
    }
}
