use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{ArchiveError, Result};

use super::archive::{Archive, Entry, PartialRead};
use super::options::DecodeOptions;

/// Gzip archive extractor over a file loaded into memory
pub struct GzipExtractor {
    data: Vec<u8>,
    options: DecodeOptions,
}

impl GzipExtractor {
    /// Read the whole archive from disk
    pub async fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_bytes(fs::read(path).await?))
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            options: DecodeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn archive(&self) -> Archive<'_> {
        Archive::with_options(&self.data, self.options)
    }

    /// List all members in the archive
    pub fn list_members(&self) -> std::result::Result<Vec<Entry>, PartialRead> {
        self.archive().read_all()
    }

    /// Payload of the last member named `name`
    pub fn extract_to_memory(
        &self,
        name: &[u8],
    ) -> std::result::Result<Option<Vec<u8>>, ArchiveError> {
        Ok(self.archive().find(name)?.map(|entry| entry.payload))
    }

    /// Write a member to disk, restoring its modification time when known
    pub async fn extract_to_file(&self, entry: &Entry, output_path: &Path) -> Result<()> {
        // Create parent directories if needed
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = fs::File::create(output_path).await?;
        file.write_all(&entry.payload).await?;
        file.flush().await?;

        let mtime = entry.header().mtime;
        if mtime != 0 {
            let modified = UNIX_EPOCH + Duration::from_secs(u64::from(mtime));
            file.into_std().await.set_modified(modified)?;
        }

        Ok(())
    }

    /// Write a member's payload to stdout
    pub async fn extract_to_stdout(&self, entry: &Entry) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(&entry.payload).await?;
        stdout.flush().await?;

        Ok(())
    }
}
