//! Error types for gzip member and archive decoding.
//!
//! Structural failures (bad magic, truncation, corrupt deflate data) leave the
//! reader without a known position for the next member. Verification failures
//! (header CRC16, payload CRC32, ISIZE) do not: the trailer is always 8 bytes,
//! so the next member boundary is still known and a caller may keep going.

use thiserror::Error;

/// Errors produced by the gzip codec.
#[derive(Debug, Error)]
pub enum GzipError {
    /// The member does not start with `1f 8b`
    #[error("not in gzip format: expected magic 1f 8b, found {found:02x?}")]
    NotGzipFormat { found: [u8; 2] },

    /// Compression method other than deflate (8)
    #[error("unsupported compression method: {method}")]
    UnsupportedMethod { method: u8 },

    /// A field declares more bytes than the input holds
    #[error("truncated input at offset {offset}: need {needed} bytes, {available} available")]
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// The deflate stream ran out of input before its final block
    #[error("unexpected end of compressed data at offset {offset}")]
    UnexpectedEof { offset: usize },

    /// The deflate stream itself is malformed
    #[error("corrupt deflate data at offset {offset}: {reason}")]
    CorruptData { offset: usize, reason: String },

    /// Stored FHCRC value does not match the header bytes
    #[error("header CRC16 mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    HeaderChecksumMismatch { stored: u16, computed: u16 },

    /// Trailer CRC32 does not match the decompressed payload
    #[error("CRC32 mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    PayloadChecksumMismatch { stored: u32, computed: u32 },

    /// Trailer ISIZE does not match the decompressed length mod 2^32
    #[error("ISIZE mismatch: stored {stored}, computed {computed}")]
    SizeMismatch { stored: u32, computed: u32 },

    /// Bytes after the last member that do not form another member
    #[error("trailing garbage: {len} bytes at offset {offset}")]
    TrailingGarbage { offset: usize, len: usize },

    /// Compression level outside 0..=9
    #[error("invalid compression level {0}: expected 0-9")]
    InvalidLevel(u32),

    /// A header field is longer than its length prefix can express
    #[error("{field} too long: {len} bytes (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A header field value cannot be serialized
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// A flag bit is set but the field it gates has no value
    #[error("flag bit set for {0} but no value given")]
    MissingField(&'static str),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Discriminant of [`GzipError`], used to choose a policy per failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotGzipFormat,
    UnsupportedMethod,
    TruncatedInput,
    UnexpectedEof,
    CorruptData,
    HeaderChecksumMismatch,
    PayloadChecksumMismatch,
    SizeMismatch,
    TrailingGarbage,
    InvalidLevel,
    FieldTooLong,
    InvalidField,
    MissingField,
    Io,
}

impl ErrorKind {
    /// True for checksum and size mismatches, after which the next member
    /// boundary is still known.
    pub fn is_verification(self) -> bool {
        matches!(
            self,
            ErrorKind::HeaderChecksumMismatch
                | ErrorKind::PayloadChecksumMismatch
                | ErrorKind::SizeMismatch
        )
    }
}

impl GzipError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GzipError::NotGzipFormat { .. } => ErrorKind::NotGzipFormat,
            GzipError::UnsupportedMethod { .. } => ErrorKind::UnsupportedMethod,
            GzipError::TruncatedInput { .. } => ErrorKind::TruncatedInput,
            GzipError::UnexpectedEof { .. } => ErrorKind::UnexpectedEof,
            GzipError::CorruptData { .. } => ErrorKind::CorruptData,
            GzipError::HeaderChecksumMismatch { .. } => ErrorKind::HeaderChecksumMismatch,
            GzipError::PayloadChecksumMismatch { .. } => ErrorKind::PayloadChecksumMismatch,
            GzipError::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            GzipError::TrailingGarbage { .. } => ErrorKind::TrailingGarbage,
            GzipError::InvalidLevel(_) => ErrorKind::InvalidLevel,
            GzipError::FieldTooLong { .. } => ErrorKind::FieldTooLong,
            GzipError::InvalidField { .. } => ErrorKind::InvalidField,
            GzipError::MissingField(_) => ErrorKind::MissingField,
            GzipError::Io(_) => ErrorKind::Io,
        }
    }
}

/// A member-level failure with its position in the archive.
#[derive(Debug, Error)]
#[error("member #{index} at offset {offset}: {source}")]
pub struct ArchiveError {
    /// Zero-based member index
    pub index: usize,
    /// Byte offset where the member starts
    pub offset: usize,
    #[source]
    pub source: GzipError,
}

impl ArchiveError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, GzipError>;
