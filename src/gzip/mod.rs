//! Gzip archive parsing and writing.
//!
//! This module reads and writes gzip files as archives: every member keeps its
//! full RFC 1952 metadata, and a file may hold many members back to back.
//!
//! ## Architecture
//!
//! - [`structures`]: Data model (header, trailer, flags, OS byte, extra field)
//! - [`cursor`]: Little-endian byte reader and writer
//! - [`header`] and [`trailer`]: Codecs for the two fixed-order parts of a member
//! - [`member`]: One complete member, including inflate/deflate and checksums
//! - [`archive`]: Walking and building multi-member archives
//! - [`extractor`] and [`writer`]: Async file-level API for end users
//!
//! ## Gzip Format Overview
//!
//! A gzip file is a sequence of members. Each member is:
//! 1. A header with a 10-byte fixed part and optional fields gated by flag bits
//! 2. A raw deflate stream, which marks its own end
//! 3. An 8-byte trailer holding the CRC32 and length (mod 2^32) of the payload
//!
//! Nothing links one member to the next, so the end of a member can only be
//! found by inflating it.
//!
//! ## Limitations
//!
//! - Input is read fully into memory; no streaming
//! - Deflate (method 8) only

pub mod archive;
pub mod cursor;
mod extractor;
pub mod header;
pub mod member;
mod options;
pub mod structures;
pub mod trailer;
mod writer;

pub use archive::{Archive, ArchiveBuilder, Entry, MemberIndex, Members, PartialRead, encode_archive};
pub use extractor::GzipExtractor;
pub use member::{DecodedMember, MemberFailure, decode_member, decode_member_with, encode_member};
pub use options::{DecodeOptions, EncodeOptions, Policy, TrailingPolicy};
pub use structures::*;
pub use writer::{AddOptions, GzipWriter, unix_mtime};
