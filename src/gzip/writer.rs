//! Appending members to an archive on disk.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::{GzipError, Result};

use super::cursor::ByteWriter;
use super::member::encode_member_into;
use super::options::EncodeOptions;
use super::structures::{DEFAULT_LEVEL, ExtraField, FieldText, Member, MemberHeader, Os};

/// Per-member settings for [`GzipWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOptions {
    pub level: u32,
    pub os: Os,
    /// Overrides the name derived from the source path
    pub filename: Option<String>,
    /// Overrides the source file's modification time, or the current time
    pub mtime: Option<u32>,
    pub comment: Option<String>,
    pub extra: Option<Vec<u8>>,
    pub header_crc: bool,
    pub text: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            os: Os::current(),
            filename: None,
            mtime: None,
            comment: None,
            extra: None,
            header_crc: false,
            text: false,
        }
    }
}

impl AddOptions {
    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            level: self.level,
            os: self.os,
        }
    }

    /// Build the member header. Header strings are stored as latin-1.
    pub fn header(&self, default_mtime: u32) -> Result<MemberHeader> {
        let mut header = MemberHeader::new();
        header.mtime = self.mtime.unwrap_or(default_mtime);

        if let Some(ref filename) = self.filename {
            header.set_filename(FieldText::from_latin1(filename)?);
        }
        if let Some(ref extra) = self.extra {
            header.set_extra(ExtraField::new(extra.clone())?);
        }
        if let Some(ref comment) = self.comment {
            header.set_comment(FieldText::from_latin1(comment)?);
        }
        if self.header_crc {
            header.set_header_crc();
        }
        if self.text {
            header.set_text();
        }

        Ok(header)
    }
}

/// Seconds since the epoch as stored in MTIME; 0 when not representable.
pub fn unix_mtime(time: SystemTime) -> u32 {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| u32::try_from(d.as_secs()).ok())
        .unwrap_or(0)
}

/// Writes members to the end of an archive file
pub struct GzipWriter {
    file: fs::File,
    path: PathBuf,
    position: usize,
}

impl GzipWriter {
    /// Create a new archive, truncating any existing file
    pub async fn create(path: &Path) -> Result<Self> {
        let file = fs::File::create(path).await?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            position: 0,
        })
    }

    /// Open an archive for appending, creating it if missing
    pub async fn append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        let position = file.metadata().await?.len() as usize;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            position,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add literal bytes. Without an explicit mtime the current time is used.
    pub async fn add_data(&mut self, data: &[u8], options: &AddOptions) -> Result<Member> {
        let header = options.header(unix_mtime(SystemTime::now()))?;
        self.write_member(&header, data, options).await
    }

    /// Add a file, naming the member after its basename and taking its
    /// modification time
    pub async fn add_file(&mut self, path: &Path, options: &AddOptions) -> Result<Member> {
        let metadata = fs::metadata(path).await?;
        let data = fs::read(path).await?;

        let mut options = options.clone();
        if options.filename.is_none() {
            let name = path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .ok_or_else(|| GzipError::InvalidField {
                    field: "filename",
                    reason: format!("{} has no file name", path.display()),
                })?;
            options.filename = Some(name);
        }

        let header = options.header(unix_mtime(metadata.modified()?))?;
        self.write_member(&header, &data, &options).await
    }

    async fn write_member(
        &mut self,
        header: &MemberHeader,
        data: &[u8],
        options: &AddOptions,
    ) -> Result<Member> {
        let mut writer = ByteWriter::new();
        let mut member =
            encode_member_into(header, data, &options.encode_options(), &mut writer)?;
        self.file.write_all(writer.as_slice()).await?;

        // Offsets in the returned member are relative to the file.
        member.offset += self.position;
        member.data = member.data.start + self.position..member.data.end + self.position;
        self.position += writer.len();

        Ok(member)
    }

    /// Flush buffered output to disk
    pub async fn finish(mut self) -> Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_from_options() {
        let options = AddOptions {
            filename: Some("notes.txt".to_string()),
            comment: Some("onion".to_string()),
            extra: Some(vec![1, 2]),
            header_crc: true,
            text: true,
            mtime: Some(5),
            ..AddOptions::default()
        };
        let header = options.header(99).unwrap();
        assert_eq!(header.mtime, 5);
        assert_eq!(header.filename.unwrap().to_latin1_string(), "notes.txt");
        assert_eq!(header.comment.unwrap().to_latin1_string(), "onion");
        assert_eq!(header.extra.unwrap().as_bytes(), &[1, 2]);
        assert_eq!(header.flags.bits(), 0b0001_1111);
    }

    #[test]
    fn plain_options_set_no_flags() {
        let header = AddOptions::default().header(42).unwrap();
        assert_eq!(header.mtime, 42);
        assert_eq!(header.flags.bits(), 0);
    }

    #[test]
    fn mtime_outside_u32_is_unknown() {
        assert_eq!(unix_mtime(UNIX_EPOCH), 0);
        assert_eq!(
            unix_mtime(UNIX_EPOCH + std::time::Duration::from_secs(1412132400)),
            1412132400
        );
        assert_eq!(
            unix_mtime(UNIX_EPOCH + std::time::Duration::from_secs(1 << 33)),
            0
        );
    }
}
