//! Member codec: header, raw deflate body and trailer as one unit.
//!
//! Decoding finds the end of the body by running the inflater until the
//! deflate stream reports its final block, then reads the 8-byte trailer that
//! follows. The trailer is checked against the CRC32 and length of what was
//! actually inflated.

use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;
use thiserror::Error;

use super::cursor::{ByteReader, ByteWriter};
use super::header::{decode_header_unverified, encode_header};
use super::options::{DecodeOptions, EncodeOptions, Policy};
use super::structures::*;
use super::trailer::{decode_trailer, encode_trailer};
use crate::error::{GzipError, Result};

/// Inflate the raw deflate stream at the start of `input`.
///
/// Returns the payload and the number of input bytes the stream occupied.
/// `offset` is the position of `input` in the archive and is only used for
/// error reporting.
pub fn inflate(input: &[u8], offset: usize) -> Result<(Vec<u8>, usize)> {
    let mut decoder = Decompress::new(false);
    let mut output = Vec::with_capacity(input.len().saturating_mul(4).clamp(64, 1 << 20));

    loop {
        if output.len() == output.capacity() {
            output.reserve(output.capacity());
        }

        let in_before = decoder.total_in();
        let out_before = decoder.total_out();
        let consumed = in_before as usize;

        let status = decoder
            .decompress_vec(&input[consumed..], &mut output, FlushDecompress::None)
            .map_err(|e| GzipError::CorruptData {
                offset: offset + consumed,
                reason: e.to_string(),
            })?;

        match status {
            Status::StreamEnd => return Ok((output, decoder.total_in() as usize)),
            Status::Ok | Status::BufError => {
                let progressed =
                    decoder.total_in() != in_before || decoder.total_out() != out_before;
                if !progressed && output.len() < output.capacity() {
                    return Err(GzipError::UnexpectedEof {
                        offset: offset + input.len(),
                    });
                }
            }
        }
    }
}

/// Compress `payload` as a raw deflate stream.
pub fn deflate(payload: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(
        Vec::with_capacity(payload.len() / 2 + 16),
        Compression::new(level),
    );
    encoder.write_all(payload)?;
    Ok(encoder.finish()?)
}

/// A successfully decoded member with its payload.
#[derive(Debug, Clone)]
pub struct DecodedMember {
    pub member: Member,
    pub payload: Vec<u8>,
    /// Offset of the byte after the trailer
    pub next_offset: usize,
}

/// A failed member decode.
///
/// `next_offset` is known for verification failures, since the trailer was
/// still located, and unknown for structural ones.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct MemberFailure {
    #[source]
    pub error: GzipError,
    pub next_offset: Option<usize>,
}

impl From<MemberFailure> for GzipError {
    fn from(failure: MemberFailure) -> Self {
        failure.error
    }
}

fn fatal(error: GzipError) -> MemberFailure {
    MemberFailure {
        error,
        next_offset: None,
    }
}

/// Decode the member starting at `offset` with every check enabled.
pub fn decode_member(data: &[u8], offset: usize) -> Result<DecodedMember> {
    Ok(decode_member_with(data, offset, &DecodeOptions::default())?)
}

/// Decode the member starting at `offset`, skipping checks whose policy is
/// [`Policy::Ignore`].
pub fn decode_member_with(
    data: &[u8],
    offset: usize,
    options: &DecodeOptions,
) -> std::result::Result<DecodedMember, MemberFailure> {
    let mut reader = ByteReader::at(data, offset);

    let decoded = decode_header_unverified(&mut reader).map_err(fatal)?;
    let header_check = match options.header_crc {
        Policy::Ignore => Ok(()),
        Policy::Abort | Policy::Continue => decoded.verify(),
    };

    let data_start = reader.position();
    let (payload, consumed) = match inflate(reader.rest(), data_start) {
        Ok(inflated) => inflated,
        // A bad header checksum is the better explanation for a bad body.
        Err(error) => return Err(fatal(header_check.err().unwrap_or(error))),
    };
    reader.skip(consumed).map_err(fatal)?;
    let data_end = reader.position();

    let trailer = decode_trailer(&mut reader).map_err(fatal)?;
    let next_offset = reader.position();
    let resumable = |error| MemberFailure {
        error,
        next_offset: Some(next_offset),
    };

    header_check.map_err(resumable)?;

    let actual = MemberTrailer::for_payload(&payload);
    if options.payload_crc != Policy::Ignore && actual.crc32 != trailer.crc32 {
        return Err(resumable(GzipError::PayloadChecksumMismatch {
            stored: trailer.crc32,
            computed: actual.crc32,
        }));
    }
    if options.size != Policy::Ignore && actual.isize != trailer.isize {
        return Err(resumable(GzipError::SizeMismatch {
            stored: trailer.isize,
            computed: actual.isize,
        }));
    }

    Ok(DecodedMember {
        member: Member {
            header: decoded.header,
            offset,
            data: data_start..data_end,
            trailer,
        },
        payload,
        next_offset,
    })
}

/// Encode one member.
pub fn encode_member(
    header: &MemberHeader,
    payload: &[u8],
    options: &EncodeOptions,
) -> Result<Vec<u8>> {
    let mut writer = ByteWriter::new();
    encode_member_into(header, payload, options, &mut writer)?;
    Ok(writer.into_inner())
}

/// Append one encoded member to `writer` and describe what was written.
///
/// Nothing is appended if encoding fails.
pub fn encode_member_into(
    header: &MemberHeader,
    payload: &[u8],
    options: &EncodeOptions,
    writer: &mut ByteWriter,
) -> Result<Member> {
    options.validate()?;

    let mut header_bytes = ByteWriter::new();
    let header_crc = encode_header(header, options, &mut header_bytes)?;
    let body = deflate(payload, options.level)?;
    let trailer = MemberTrailer::for_payload(payload);

    let offset = writer.len();
    writer.write_bytes(header_bytes.as_slice());
    let data_start = writer.len();
    writer.write_bytes(&body);
    let data_end = writer.len();
    encode_trailer(&trailer, writer);

    let mut written = header.clone();
    written.extra_flags = Some(
        header
            .extra_flags
            .unwrap_or_else(|| ExtraFlags::for_level(options.level)),
    );
    written.os = Some(header.os.unwrap_or(options.os));
    written.header_crc = header_crc;

    Ok(Member {
        header: written,
        offset,
        data: data_start..data_end,
        trailer,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    /// A member whose body is a single stored deflate block, built without the
    /// encoder.
    pub(crate) fn stored_member(header: &[u8], payload: &[u8]) -> Vec<u8> {
        let len = payload.len() as u16;
        let mut bytes = header.to_vec();
        bytes.push(0x01);
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&(!len).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes
    }

    /// Header of textfile.gz: FNAME "textfile", mtime 2014-10-01, Unix.
    pub(crate) fn textfile_header() -> Vec<u8> {
        let mut header = vec![0x1f, 0x8b, 8, Flags::FNAME];
        header.extend_from_slice(&1412132400u32.to_le_bytes());
        header.extend_from_slice(&[0, 3]);
        header.extend_from_slice(b"textfile\0");
        header
    }

    fn unix_options(level: u32) -> EncodeOptions {
        EncodeOptions {
            level,
            os: Os::Unix,
        }
    }

    #[test]
    fn decodes_hand_built_member() {
        let bytes = stored_member(&textfile_header(), b"asparagus\n");
        let decoded = decode_member(&bytes, 0).unwrap();

        let header = &decoded.member.header;
        assert_eq!(header.method, CompressionMethod::Deflate);
        assert_eq!(header.flags.bits(), Flags::FNAME);
        assert_eq!(header.mtime, 1412132400);
        assert_eq!(header.extra_flags, Some(0));
        assert_eq!(header.os, Some(Os::Unix));
        assert_eq!(header.filename.as_ref().unwrap().as_bytes(), b"textfile");
        assert_eq!(decoded.payload, b"asparagus\n");
        assert_eq!(decoded.member.trailer.isize, 10);
        assert_eq!(decoded.next_offset, bytes.len());
        assert_eq!(decoded.member.encoded_len(), bytes.len());
    }

    #[test]
    fn concrete_example() {
        let payload = b"0123456789";
        let mut header = MemberHeader::new();
        header.mtime = 1412132400;
        header.os = Some(Os::Unix);
        header.set_filename(FieldText::from_latin1("test.txt").unwrap());

        let bytes = encode_member(&header, payload, &EncodeOptions::default()).unwrap();
        let decoded = decode_member(&bytes, 0).unwrap();
        let member = decoded.member;

        assert_eq!(member.header.method.as_u8(), 8);
        assert_eq!(member.header.filename.unwrap().to_latin1_string(), "test.txt");
        assert_eq!(member.header.mtime, 1412132400);
        assert_eq!(member.header.os, Some(Os::Unix));
        assert_eq!(member.header.extra, None);
        assert_eq!(member.header.comment, None);
        assert_eq!(member.header.header_crc, None);
        assert_eq!(member.trailer.crc32, crc32fast::hash(payload));
        assert_eq!(member.trailer.isize, 10);
        assert_eq!(decoded.payload, payload);
    }

    #[rstest]
    #[case::empty(b"".to_vec())]
    #[case::one_byte(b"x".to_vec())]
    #[case::text(b"The quick brown fox jumps over the lazy dog. ".repeat(200))]
    #[case::binary((0..=255u8).cycle().take(70_000).collect())]
    fn round_trip_payloads(#[case] payload: Vec<u8>) {
        let mut header = MemberHeader::new();
        header.mtime = 99;
        header
            .set_extra(ExtraField::new(b"AB\x02\x00hi".to_vec()).unwrap())
            .set_comment(FieldText::from_latin1("comment").unwrap())
            .set_header_crc();

        let mut writer = ByteWriter::new();
        let written =
            encode_member_into(&header, &payload, &unix_options(6), &mut writer).unwrap();
        let bytes = writer.into_inner();
        let decoded = decode_member(&bytes, 0).unwrap();

        assert_eq!(decoded.payload, payload);
        assert_eq!(decoded.member, written);
        assert_eq!(decoded.member.trailer.crc32, crc32fast::hash(&payload));
        assert_eq!(decoded.member.trailer.isize, payload.len() as u32);
    }

    #[test]
    fn empty_payload_has_zero_trailer() {
        let bytes = encode_member(&MemberHeader::new(), b"", &unix_options(6)).unwrap();
        let decoded = decode_member(&bytes, 0).unwrap();
        assert_eq!(decoded.member.trailer, MemberTrailer { crc32: 0, isize: 0 });
        assert!(decoded.payload.is_empty());
    }

    #[rstest]
    #[case(9, ExtraFlags::MAX_COMPRESSION)]
    #[case(1, ExtraFlags::FASTEST)]
    #[case(6, 0)]
    fn extra_flags_reflect_level(#[case] level: u32, #[case] xfl: u8) {
        let bytes = encode_member(&MemberHeader::new(), b"data", &unix_options(level)).unwrap();
        let decoded = decode_member(&bytes, 0).unwrap();
        assert_eq!(decoded.member.header.extra_flags, Some(xfl));
    }

    #[test]
    fn explicit_extra_flags_win() {
        let mut header = MemberHeader::new();
        header.extra_flags = Some(0);
        let bytes = encode_member(&header, b"data", &unix_options(9)).unwrap();
        assert_eq!(bytes[8], 0);
    }

    #[test]
    fn bad_crc32() {
        let mut bytes = stored_member(&textfile_header(), b"asparagus\n");
        let crc_at = bytes.len() - 8;
        bytes[crc_at] ^= 0x01;

        let failure = decode_member_with(&bytes, 0, &DecodeOptions::default()).unwrap_err();
        assert!(matches!(
            failure.error,
            GzipError::PayloadChecksumMismatch { .. }
        ));
        assert_eq!(failure.next_offset, Some(bytes.len()));
    }

    #[test]
    fn bad_isize() {
        let mut bytes = stored_member(&textfile_header(), b"asparagus\n");
        let isize_at = bytes.len() - 4;
        bytes[isize_at] = 11;

        let failure = decode_member_with(&bytes, 0, &DecodeOptions::default()).unwrap_err();
        assert!(matches!(
            failure.error,
            GzipError::SizeMismatch {
                stored: 11,
                computed: 10
            }
        ));
    }

    #[test]
    fn lenient_skips_verification() {
        let mut bytes = stored_member(&textfile_header(), b"asparagus\n");
        let crc_at = bytes.len() - 8;
        bytes[crc_at] ^= 0xff;
        let decoded = decode_member_with(&bytes, 0, &DecodeOptions::lenient()).unwrap();
        assert_eq!(decoded.payload, b"asparagus\n");
    }

    #[test]
    fn header_crc_mismatch_is_resumable() {
        let mut header = MemberHeader::new();
        header.set_header_crc();
        let mut bytes = encode_member(&header, b"payload", &unix_options(6)).unwrap();
        bytes[4] ^= 0x10; // mtime

        let failure = decode_member_with(&bytes, 0, &DecodeOptions::default()).unwrap_err();
        assert!(matches!(
            failure.error,
            GzipError::HeaderChecksumMismatch { .. }
        ));
        assert_eq!(failure.next_offset, Some(bytes.len()));
    }

    #[test]
    fn truncated_body() {
        let bytes = encode_member(
            &MemberHeader::new(),
            &b"abcdefgh".repeat(100),
            &unix_options(6),
        )
        .unwrap();
        let cut = FIXED_HEADER_SIZE + 3;
        let err = decode_member(&bytes[..cut], 0).unwrap_err();
        assert!(matches!(err, GzipError::UnexpectedEof { .. }));
    }

    #[test]
    fn truncated_trailer() {
        let bytes = stored_member(&textfile_header(), b"asparagus\n");
        let err = decode_member(&bytes[..bytes.len() - 3], 0).unwrap_err();
        assert!(matches!(
            err,
            GzipError::TruncatedInput {
                needed: 8,
                available: 5,
                ..
            }
        ));
    }

    #[test]
    fn invalid_block_type_is_corrupt() {
        let mut bytes = textfile_header();
        // BFINAL=1, BTYPE=11 (reserved)
        bytes.push(0x07);
        bytes.extend_from_slice(&[0u8; 8]);
        let err = decode_member(&bytes, 0).unwrap_err();
        assert!(matches!(err, GzipError::CorruptData { .. }));
    }

    #[test]
    fn bit_flips_never_decode_silently_wrong() {
        let payload = b"It was the best of times, it was the worst of times. ".repeat(20);
        let bytes = encode_member(&MemberHeader::new(), &payload, &unix_options(6)).unwrap();
        let body = decode_member(&bytes, 0).unwrap().member.data;

        for index in body {
            for bit in 0..8 {
                let mut corrupted = bytes.clone();
                corrupted[index] ^= 1 << bit;
                if let Ok(decoded) = decode_member(&corrupted, 0) {
                    // Only padding bits after the final block can flip unnoticed.
                    assert_eq!(decoded.payload, payload);
                }
            }
        }
    }

    #[test]
    fn decodes_at_offset() {
        let mut bytes = vec![0xaa; 5];
        let member = stored_member(&textfile_header(), b"asparagus\n");
        bytes.extend_from_slice(&member);
        let decoded = decode_member(&bytes, 5).unwrap();
        assert_eq!(decoded.member.offset, 5);
        assert_eq!(decoded.next_offset, bytes.len());
    }

    #[test]
    fn failed_encode_appends_nothing() {
        let mut header = MemberHeader::new();
        header.flags.insert(Flags::FNAME);
        let mut writer = ByteWriter::from_vec(vec![1, 2, 3]);
        assert!(encode_member_into(&header, b"x", &unix_options(6), &mut writer).is_err());
        assert_eq!(writer.as_slice(), &[1, 2, 3]);

        let err = encode_member(&MemberHeader::new(), b"x", &unix_options(12)).unwrap_err();
        assert!(matches!(err, GzipError::InvalidLevel(12)));
    }
}
