//! Multi-member archives.
//!
//! An archive is nothing more than members laid end to end. Member boundaries
//! are only found by inflating each body in turn, so reading is a strict
//! left-to-right scan. [`Archive::index`] records the start offsets in one pass
//! so later lookups can jump straight to a member with [`Archive::decode_at`].

use std::fmt;
use std::iter::FusedIterator;

use super::cursor::ByteWriter;
use super::member::{DecodedMember, decode_member_with, encode_member_into};
use super::options::{DecodeOptions, EncodeOptions, Policy, TrailingPolicy};
use super::structures::{FIXED_HEADER_SIZE, MAGIC, Member, MemberHeader};
use crate::error::{ArchiveError, GzipError, Result};

/// One decoded member and its payload.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Zero-based position in the archive
    pub index: usize,
    pub member: Member,
    pub payload: Vec<u8>,
}

impl Entry {
    pub fn offset(&self) -> usize {
        self.member.offset
    }

    pub fn header(&self) -> &MemberHeader {
        &self.member.header
    }

    /// Whether this entry's FNAME equals `name` byte for byte.
    pub fn has_name(&self, name: &[u8]) -> bool {
        self.member
            .header
            .filename
            .as_ref()
            .is_some_and(|f| f.as_bytes() == name)
    }
}

/// Entries decoded before a read failed, along with every failure seen.
#[derive(Debug)]
pub struct PartialRead {
    pub entries: Vec<Entry>,
    /// Never empty. Only the last one can be fatal.
    pub errors: Vec<ArchiveError>,
}

impl PartialRead {
    /// The failure that ended the read, or the last skipped one.
    pub fn last_error(&self) -> Option<&ArchiveError> {
        self.errors.last()
    }
}

impl fmt::Display for PartialRead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} member(s) decoded", self.entries.len())?;
        if let Some(err) = self.last_error() {
            write!(f, ", failed at {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for PartialRead {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.last_error()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Start offsets of every member, from one sequential pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberIndex {
    pub offsets: Vec<usize>,
    /// Offset just past the last member
    pub end: usize,
}

impl MemberIndex {
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// A read-only view of a gzip archive held in memory.
#[derive(Debug, Clone, Copy)]
pub struct Archive<'a> {
    data: &'a [u8],
    options: DecodeOptions,
}

impl<'a> Archive<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_options(data, DecodeOptions::default())
    }

    pub fn with_options(data: &'a [u8], options: DecodeOptions) -> Self {
        Self { data, options }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Iterate over members from the start of the archive.
    ///
    /// Each call starts a fresh pass over the same bytes.
    pub fn members(&self) -> Members<'a> {
        Members {
            data: self.data,
            options: self.options,
            offset: 0,
            index: 0,
            done: false,
        }
    }

    /// Decode every member. On failure the entries read so far are kept.
    pub fn read_all(&self) -> std::result::Result<Vec<Entry>, PartialRead> {
        let mut entries = Vec::new();
        let mut errors = Vec::new();

        for item in self.members() {
            match item {
                Ok(entry) => entries.push(entry),
                Err(err) => errors.push(err),
            }
        }

        if errors.is_empty() {
            Ok(entries)
        } else {
            Err(PartialRead { entries, errors })
        }
    }

    /// Record the start offset of every member. Fails on the first error.
    pub fn index(&self) -> std::result::Result<MemberIndex, ArchiveError> {
        let mut index = MemberIndex::default();
        for item in self.members() {
            let entry = item?;
            index.end = entry.member.offset + entry.member.encoded_len();
            index.offsets.push(entry.member.offset);
        }
        Ok(index)
    }

    /// Decode the member at a known offset, e.g. one taken from [`MemberIndex`].
    pub fn decode_at(&self, offset: usize) -> Result<DecodedMember> {
        Ok(decode_member_with(self.data, offset, &self.options)?)
    }

    /// The last member named `name`; later members shadow earlier ones.
    pub fn find(&self, name: &[u8]) -> std::result::Result<Option<Entry>, ArchiveError> {
        let mut found = None;
        for item in self.members() {
            let entry = item?;
            if entry.has_name(name) {
                found = Some(entry);
            }
        }
        Ok(found)
    }
}

/// Iterator over the members of an [`Archive`].
///
/// Yields `Err` for each failed member. After a failure whose policy is
/// [`Policy::Continue`] iteration resumes at the next member; any other
/// failure ends it.
pub struct Members<'a> {
    data: &'a [u8],
    options: DecodeOptions,
    offset: usize,
    index: usize,
    done: bool,
}

impl Members<'_> {
    fn fail(&mut self, error: GzipError) -> ArchiveError {
        self.done = true;
        ArchiveError {
            index: self.index,
            offset: self.offset,
            source: error,
        }
    }
}

impl Iterator for Members<'_> {
    type Item = std::result::Result<Entry, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.data.len() {
            self.done = true;
            return None;
        }

        let rest = &self.data[self.offset..];
        if self.index > 0 && (rest.len() < FIXED_HEADER_SIZE || !rest.starts_with(&MAGIC)) {
            let error = GzipError::TrailingGarbage {
                offset: self.offset,
                len: rest.len(),
            };
            self.done = true;
            return match self.options.trailing {
                TrailingPolicy::Ignore => None,
                TrailingPolicy::Reject => Some(Err(self.fail(error))),
            };
        }

        match decode_member_with(self.data, self.offset, &self.options) {
            Ok(decoded) => {
                let entry = Entry {
                    index: self.index,
                    member: decoded.member,
                    payload: decoded.payload,
                };
                self.offset = decoded.next_offset;
                self.index += 1;
                Some(Ok(entry))
            }
            Err(failure) => {
                let policy = self.options.policy_for(failure.error.kind());
                match (failure.next_offset, policy) {
                    (Some(next), Policy::Continue) => {
                        let err = ArchiveError {
                            index: self.index,
                            offset: self.offset,
                            source: failure.error,
                        };
                        self.offset = next;
                        self.index += 1;
                        Some(Err(err))
                    }
                    _ => Some(Err(self.fail(failure.error))),
                }
            }
        }
    }
}

impl FusedIterator for Members<'_> {}

/// Builds an archive by concatenating independently encoded members.
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    options: EncodeOptions,
    writer: ByteWriter,
    members: Vec<Member>,
}

impl ArchiveBuilder {
    pub fn new(options: EncodeOptions) -> Self {
        Self {
            options,
            writer: ByteWriter::new(),
            members: Vec::new(),
        }
    }

    /// Continue after the bytes of an existing archive. The existing bytes are
    /// not re-validated.
    pub fn append_to(existing: Vec<u8>, options: EncodeOptions) -> Self {
        Self {
            options,
            writer: ByteWriter::from_vec(existing),
            members: Vec::new(),
        }
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    /// Encode and append one member.
    pub fn add(&mut self, header: &MemberHeader, payload: &[u8]) -> Result<&Member> {
        let member = encode_member_into(header, payload, &self.options, &mut self.writer)?;
        self.members.push(member);
        Ok(&self.members[self.members.len() - 1])
    }

    /// Members added through this builder.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.writer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writer.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

/// Encode `(header, payload)` pairs into one archive.
pub fn encode_archive<P: AsRef<[u8]>>(
    members: &[(MemberHeader, P)],
    options: &EncodeOptions,
) -> Result<Vec<u8>> {
    let mut builder = ArchiveBuilder::new(*options);
    for (header, payload) in members {
        builder.add(header, payload.as_ref())?;
    }
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::gzip::member::tests::{stored_member, textfile_header};
    use crate::gzip::structures::{FieldText, Os};
    use pretty_assertions::assert_eq;

    fn named(name: &str, mtime: u32) -> MemberHeader {
        let mut header = MemberHeader::new();
        header.mtime = mtime;
        header.set_filename(FieldText::from_latin1(name).unwrap());
        header
    }

    fn options() -> EncodeOptions {
        EncodeOptions {
            level: 6,
            os: Os::Unix,
        }
    }

    fn two_members() -> Vec<u8> {
        encode_archive(
            &[
                (named("a.txt", 1), b"first".to_vec()),
                (named("b.txt", 2), b"second".to_vec()),
            ],
            &options(),
        )
        .unwrap()
    }

    #[test]
    fn empty_buffer_has_no_members() {
        assert_eq!(Archive::new(&[]).members().count(), 0);
        assert!(Archive::new(&[]).read_all().unwrap().is_empty());
    }

    #[test]
    fn members_come_back_in_order() {
        let bytes = two_members();
        let entries = Archive::new(&bytes).read_all().unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].index, 0);
        assert_eq!(entries[0].payload, b"first");
        assert!(entries[0].has_name(b"a.txt"));
        assert_eq!(entries[1].payload, b"second");
        assert!(entries[1].has_name(b"b.txt"));
        assert_eq!(entries[1].offset(), entries[0].member.encoded_len());
        assert_eq!(
            entries[1].offset() + entries[1].member.encoded_len(),
            bytes.len()
        );
    }

    #[test]
    fn iteration_is_restartable() {
        let bytes = two_members();
        let archive = Archive::new(&bytes);
        let first: Vec<_> = archive.members().map(|e| e.unwrap().payload).collect();
        let second: Vec<_> = archive.members().map(|e| e.unwrap().payload).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn builder_matches_decoded_members() {
        let mut builder = ArchiveBuilder::new(options());
        builder.add(&named("x", 5), b"xx").unwrap();
        builder.add(&MemberHeader::new(), b"").unwrap();
        let written = builder.members().to_vec();
        let bytes = builder.finish();

        let decoded: Vec<Member> = Archive::new(&bytes)
            .members()
            .map(|e| e.unwrap().member)
            .collect();
        assert_eq!(decoded, written);
    }

    #[test]
    fn append_produces_new_concatenation() {
        let original = two_members();
        let mut builder = ArchiveBuilder::append_to(original.clone(), options());
        builder.add(&named("c.txt", 3), b"third").unwrap();
        let appended = builder.finish();

        assert_eq!(&appended[..original.len()], &original[..]);
        let entries = Archive::new(&appended).read_all().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].payload, b"third");
    }

    #[test]
    fn trailing_garbage_is_rejected_by_default() {
        let mut bytes = stored_member(&textfile_header(), b"asparagus\n");
        let end = bytes.len();
        bytes.extend_from_slice(b"\n\n\0junk bytes");

        let partial = Archive::new(&bytes).read_all().unwrap_err();
        assert_eq!(partial.entries.len(), 1);
        let err = partial.last_error().unwrap();
        assert_eq!(err.index, 1);
        assert!(matches!(
            err.source,
            GzipError::TrailingGarbage { offset, len: 13 } if offset == end
        ));
    }

    #[test]
    fn trailing_garbage_can_be_ignored() {
        let mut bytes = stored_member(&textfile_header(), b"asparagus\n");
        bytes.extend_from_slice(&[0u8; 32]);
        let options = DecodeOptions {
            trailing: TrailingPolicy::Ignore,
            ..DecodeOptions::default()
        };
        let entries = Archive::with_options(&bytes, options).read_all().unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn short_magic_tail_is_trailing_garbage() {
        let mut bytes = stored_member(&textfile_header(), b"asparagus\n");
        bytes.extend_from_slice(&MAGIC);
        let partial = Archive::new(&bytes).read_all().unwrap_err();
        assert_eq!(
            partial.last_error().unwrap().kind(),
            ErrorKind::TrailingGarbage
        );
    }

    #[test]
    fn first_member_bad_magic() {
        let err = Archive::new(b"hello world, not gzip")
            .members()
            .next()
            .unwrap()
            .unwrap_err();
        assert_eq!(err.index, 0);
        assert_eq!(err.kind(), ErrorKind::NotGzipFormat);
    }

    #[test]
    fn truncated_second_member_stops_iteration() {
        let bytes = two_members();
        let first_len = Archive::new(&bytes).index().unwrap().offsets[1];
        let cut = &bytes[..first_len + 12];

        let mut members = Archive::new(cut).members();
        assert!(members.next().unwrap().is_ok());
        let err = members.next().unwrap().unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.offset, first_len);
        assert!(members.next().is_none());
    }

    #[test]
    fn truncated_mid_extra_field() {
        let mut header = MemberHeader::new();
        header.set_extra(crate::gzip::ExtraField::new(vec![7u8; 20]).unwrap());
        let bytes = encode_archive(&[(header, b"x".to_vec())], &options()).unwrap();

        let err = Archive::new(&bytes[..18])
            .members()
            .next()
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
    }

    fn corrupt_first_crc(bytes: &mut [u8], first_len: usize) {
        bytes[first_len - 8] ^= 0xff;
    }

    #[test]
    fn checksum_failure_aborts_by_default() {
        let mut bytes = two_members();
        let first_len = Archive::new(&bytes).index().unwrap().offsets[1];
        corrupt_first_crc(&mut bytes, first_len);

        let results: Vec<_> = Archive::new(&bytes).members().collect();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].as_ref().unwrap_err().kind(),
            ErrorKind::PayloadChecksumMismatch
        );
    }

    #[test]
    fn checksum_failure_can_continue() {
        let mut bytes = two_members();
        let first_len = Archive::new(&bytes).index().unwrap().offsets[1];
        corrupt_first_crc(&mut bytes, first_len);

        let archive = Archive::with_options(&bytes, DecodeOptions::continue_on_mismatch());
        let partial = archive.read_all().unwrap_err();
        assert_eq!(partial.errors.len(), 1);
        assert_eq!(partial.errors[0].index, 0);
        assert_eq!(partial.entries.len(), 1);
        assert_eq!(partial.entries[0].index, 1);
        assert_eq!(partial.entries[0].payload, b"second");
    }

    #[test]
    fn index_and_random_access() {
        let bytes = two_members();
        let archive = Archive::new(&bytes);
        let index = archive.index().unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.offsets[0], 0);
        assert_eq!(index.end, bytes.len());

        let second = archive.decode_at(index.offsets[1]).unwrap();
        assert_eq!(second.payload, b"second");
        assert_eq!(second.next_offset, bytes.len());
    }

    #[test]
    fn later_members_shadow_earlier_ones() {
        let bytes = encode_archive(
            &[
                (named("same", 1), b"old".to_vec()),
                (named("other", 2), b"x".to_vec()),
                (named("same", 3), b"new".to_vec()),
            ],
            &options(),
        )
        .unwrap();
        let found = Archive::new(&bytes).find(b"same").unwrap().unwrap();
        assert_eq!(found.payload, b"new");
        assert_eq!(found.index, 2);
        assert!(Archive::new(&bytes).find(b"missing").unwrap().is_none());
    }

    #[test]
    fn concurrent_readers_share_a_buffer() {
        let bytes = two_members();
        let archive = Archive::new(&bytes);
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(move || archive.read_all().unwrap().len()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), 2);
            }
        });
    }
}
