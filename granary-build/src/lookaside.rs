//! Client for the checksum-addressed upload cache holding the large source
//! archives the manifest references.
//!
//! Archives live under `<base>/<package>/<filename>/<md5>/<filename>`, so
//! a stale manifest entry can never fetch the wrong bytes: the checksum is
//! part of the address.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use url::Url;

use granary_hub::CONNECT_TIMEOUT;
use granary_sources::SourcesManifest;
use granary_utils_hash::Md5Digest;

use crate::error::BuildError;

pub struct LookasideCache {
    base: Url,
    client: reqwest::Client,
}

impl LookasideCache {
    pub fn new(base: Url) -> Result<Self, BuildError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| BuildError::Io {
                context: "failed to build HTTP client".to_owned(),
                source: std::io::Error::other(e),
            })?;
        Ok(Self { base, client })
    }

    /// Address of one archive in the cache.
    pub fn url_for(&self, package: &str, filename: &str, checksum: &Md5Digest) -> Url {
        let checksum = checksum.to_string();
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend([package, filename, checksum.as_str(), filename]);
        }
        url
    }

    /// Fetch every manifest entry that is absent or stale in `dir`,
    /// verifying each download against its manifest checksum before it is
    /// written into place. Returns the filenames fetched.
    pub async fn download_missing(
        &self,
        package: &str,
        manifest: &SourcesManifest,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, BuildError> {
        let missing = manifest.sources_to_download(dir).await?;
        for filename in &missing {
            if cancel.is_cancelled() {
                return Err(BuildError::Pipeline(granary_command::PipelineError::Cancelled));
            }

            let checksum = manifest
                .checksum_for(filename)
                .expect("missing entries come from the manifest");
            let url = self.url_for(package, filename, checksum);
            tracing::info!(%filename, %url, "downloading source archive");

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| BuildError::Download {
                    filename: filename.clone(),
                    reason: e.to_string(),
                })?;
            if !response.status().is_success() {
                return Err(BuildError::Download {
                    filename: filename.clone(),
                    reason: format!("cache returned HTTP {}", response.status()),
                });
            }
            let body = response.bytes().await.map_err(|e| BuildError::Download {
                filename: filename.clone(),
                reason: e.to_string(),
            })?;

            if Md5Digest::of(&body) != *checksum {
                return Err(BuildError::ChecksumMismatch {
                    filename: filename.clone(),
                });
            }

            let destination = dir.join(filename);
            tokio::fs::write(&destination, &body)
                .await
                .map_err(|e| BuildError::Io {
                    context: format!("failed to write {}", destination.display()),
                    source: e,
                })?;
        }
        Ok(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_address_embeds_checksum() {
        let cache = LookasideCache::new(Url::parse("https://cache.example.org/repo").unwrap()).unwrap();
        let checksum = Md5Digest::of(b"abc");
        let url = cache.url_for("pkg", "pkg-1.0.tar.gz", &checksum);
        assert_eq!(
            url.as_str(),
            "https://cache.example.org/repo/pkg/pkg-1.0.tar.gz/900150983cd24fb0d6963f7d28e17f72/pkg-1.0.tar.gz"
        );
    }
}
