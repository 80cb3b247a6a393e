//! Encode and decode configuration.

use super::structures::{DEFAULT_LEVEL, Os};
use crate::error::{ErrorKind, GzipError, Result};

/// Settings applied when writing members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Deflate level, 0 (store) through 9 (best). Defaults to 6.
    pub level: u32,
    /// OS byte for headers that do not set one. Defaults to [`Os::current`].
    pub os: Os,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
            os: Os::current(),
        }
    }
}

impl EncodeOptions {
    pub fn with_level(level: u32) -> Result<Self> {
        let options = Self {
            level,
            ..Self::default()
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.level > 9 {
            return Err(GzipError::InvalidLevel(self.level));
        }
        Ok(())
    }
}

/// What to do when a verification check fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Policy {
    /// Report the failure and stop reading the archive
    #[default]
    Abort,
    /// Report the failure and resume at the next member
    Continue,
    /// Do not perform the check
    Ignore,
}

/// What to do with bytes after the last member that are not another member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrailingPolicy {
    /// Fail with `TrailingGarbage`
    #[default]
    Reject,
    /// Stop cleanly, as gzip(1) does
    Ignore,
}

/// Settings applied when reading members. The default is fail-fast with every
/// check enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub header_crc: Policy,
    pub payload_crc: Policy,
    pub size: Policy,
    pub trailing: TrailingPolicy,
}

impl DecodeOptions {
    /// Report checksum and size mismatches but keep reading.
    pub fn continue_on_mismatch() -> Self {
        Self {
            header_crc: Policy::Continue,
            payload_crc: Policy::Continue,
            size: Policy::Continue,
            ..Self::default()
        }
    }

    /// Skip all checksum and size verification.
    pub fn lenient() -> Self {
        Self {
            header_crc: Policy::Ignore,
            payload_crc: Policy::Ignore,
            size: Policy::Ignore,
            ..Self::default()
        }
    }

    /// Policy for a failure kind. Structural failures always abort.
    pub fn policy_for(&self, kind: ErrorKind) -> Policy {
        if !kind.is_verification() {
            return Policy::Abort;
        }
        match kind {
            ErrorKind::HeaderChecksumMismatch => self.header_crc,
            ErrorKind::PayloadChecksumMismatch => self.payload_crc,
            _ => self.size,
        }
    }
}
