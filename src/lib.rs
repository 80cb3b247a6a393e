//! # arcgz
//!
//! A metadata-aware gzip archiver.
//!
//! Unlike minimal gzip implementations, this library exposes and round-trips
//! every field of the RFC 1952 member header: original file name, comment,
//! modification time, source OS, extra field and the optional CRC16 header
//! checksum. Files holding several concatenated members are treated as
//! archives of independent entries.
//!
//! ## Features
//!
//! - Read and write all header fields, including reserved flag bits
//! - Verify CRC16, CRC32 and ISIZE, with per-check fail/continue/ignore policies
//! - Iterate, index and search multi-member archives
//! - Create, append to and extract archives on disk
//!
//! ## Example
//!
//! ```
//! use arcgz::{Archive, EncodeOptions, FieldText, MemberHeader, encode_archive};
//!
//! let mut header = MemberHeader::new();
//! header.set_filename(FieldText::from_latin1("hello.txt")?);
//!
//! let bytes = encode_archive(&[(header, b"hello".to_vec())], &EncodeOptions::default())?;
//!
//! for entry in Archive::new(&bytes).members() {
//!     let entry = entry?;
//!     assert_eq!(entry.payload, b"hello");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod error;
pub mod gzip;

pub use cli::Cli;
pub use error::{ArchiveError, ErrorKind, GzipError};
pub use gzip::{
    AddOptions, Archive, ArchiveBuilder, DecodeOptions, EncodeOptions, Entry, ExtraField,
    FieldText, GzipExtractor, GzipWriter, MemberHeader, Os, PartialRead, Policy, TextEncoding,
    TrailingPolicy, encode_archive,
};
