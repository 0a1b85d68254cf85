//! The `sources` manifest: an ordered ledger of archive checksums.
//!
//! Each line records one uploaded archive as `"<md5>  <filename>"` (two
//! spaces). Large archives live in the upload cache, not in version
//! control; the manifest is what decides whether a local file still matches
//! what was deposited there.

use std::path::Path;

use granary_utils_hash::{Md5Digest, digest_file};

use crate::error::{IoErrorContext, SourcesError};

/// One tracked archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub filename: String,
    pub checksum: Md5Digest,
}

/// Ordered mapping of archive filename to upload-time checksum.
///
/// Insertion order is preserved so that saving and re-parsing reproduces
/// the file byte for byte. Membership is keyed on the filename alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcesManifest {
    entries: Vec<SourceEntry>,
}

impl SourcesManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.checksum_for(filename).is_some()
    }

    pub fn checksum_for(&self, filename: &str) -> Option<&Md5Digest> {
        self.entries
            .iter()
            .find(|e| e.filename == filename)
            .map(|e| &e.checksum)
    }

    /// Parse the on-disk line format.
    pub fn parse(text: &str) -> Result<Self, SourcesError> {
        let mut entries = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            if raw.trim().is_empty() {
                continue;
            }
            let (checksum, filename) =
                raw.split_once("  ").ok_or_else(|| SourcesError::Malformed {
                    line,
                    content: raw.to_owned(),
                })?;
            if filename.is_empty() {
                return Err(SourcesError::Malformed {
                    line,
                    content: raw.to_owned(),
                });
            }
            let checksum = checksum
                .parse::<Md5Digest>()
                .map_err(|source| SourcesError::BadChecksum { line, source })?;
            entries.push(SourceEntry {
                filename: filename.to_owned(),
                checksum,
            });
        }
        Ok(Self { entries })
    }

    /// Render the manifest back into its on-disk form.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.checksum.to_string());
            out.push_str("  ");
            out.push_str(&entry.filename);
            out.push('\n');
        }
        out
    }

    /// Load a manifest file; a missing file is an empty manifest.
    pub async fn load(path: &Path) -> Result<Self, SourcesError> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(SourcesError::Io {
                context: format!("failed to read sources manifest {}", path.display()),
                source: e,
            }),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<(), SourcesError> {
        tokio::fs::write(path, self.serialize())
            .await
            .io_context(format!("failed to write sources manifest {}", path.display()))
    }

    /// Track an entry.
    ///
    /// With `replace_existing`, the most-recently-tracked entry is swapped
    /// out (a new source superseding the current one). Otherwise the entry
    /// is appended; a filename already tracked keeps its position and only
    /// its checksum is updated.
    pub fn record(&mut self, filename: impl Into<String>, checksum: Md5Digest, replace_existing: bool) {
        let filename = filename.into();
        if replace_existing {
            if let Some(last) = self.entries.last_mut() {
                *last = SourceEntry { filename, checksum };
                return;
            }
        } else if let Some(existing) = self.entries.iter_mut().find(|e| e.filename == filename) {
            existing.checksum = checksum;
            return;
        }
        self.entries.push(SourceEntry { filename, checksum });
    }

    /// Digest `file` and track it under its base filename.
    pub async fn record_upload(
        &mut self,
        file: &Path,
        replace_existing: bool,
    ) -> Result<Md5Digest, SourcesError> {
        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SourcesError::Io {
                context: format!("source path {} has no usable filename", file.display()),
                source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
            })?
            .to_owned();
        let (checksum, size) = digest_file(file)
            .await
            .io_context(format!("failed to checksum {}", file.display()))?;
        tracing::debug!(%checksum, size, %filename, "tracking source archive");
        self.record(filename, checksum, replace_existing);
        Ok(checksum)
    }

    /// Which tracked archives are absent or stale in `dir`.
    ///
    /// An archive is missing when no file of that name exists, or when the
    /// local file's checksum disagrees with the manifest's. Returned in
    /// manifest order.
    pub async fn sources_to_download(&self, dir: &Path) -> Result<Vec<String>, SourcesError> {
        let mut missing = Vec::new();
        for entry in &self.entries {
            let candidate = dir.join(&entry.filename);
            if !candidate.is_file() {
                missing.push(entry.filename.clone());
                continue;
            }
            let (checksum, _) = digest_file(&candidate)
                .await
                .io_context(format!("failed to checksum {}", candidate.display()))?;
            if checksum != entry.checksum {
                tracing::debug!(
                    filename = %entry.filename,
                    expected = %entry.checksum,
                    actual = %checksum,
                    "local source differs from manifest",
                );
                missing.push(entry.filename.clone());
            }
        }
        Ok(missing)
    }
}
