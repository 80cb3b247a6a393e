//! Member header codec.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! +---+---+----+-----+---+---+---+---+-----+----+
//! |ID1|ID2| CM | FLG |     MTIME     | XFL | OS |
//! +---+---+----+-----+---+---+---+---+-----+----+
//! (if FEXTRA)   XLEN u16, XLEN bytes
//! (if FNAME)    bytes, NUL
//! (if FCOMMENT) bytes, NUL
//! (if FHCRC)    CRC16 u16
//! ```
//!
//! Optional parts are read and written in that fixed order, driven only by the
//! flag bits. CRC16 is the low half of the CRC32 over every header byte that
//! precedes it.

use super::cursor::{ByteReader, ByteWriter};
use super::options::EncodeOptions;
use super::structures::*;
use crate::error::{GzipError, Result};

/// A header as read from the input, before its CRC16 is checked.
#[derive(Debug, Clone)]
pub struct DecodedHeader {
    pub header: MemberHeader,
    /// CRC16 recomputed over the header bytes, present iff FHCRC is set
    pub computed_crc: Option<u16>,
}

impl DecodedHeader {
    /// Compare the stored CRC16 with the recomputed one.
    pub fn verify(&self) -> Result<()> {
        match (self.header.header_crc, self.computed_crc) {
            (Some(stored), Some(computed)) if stored != computed => {
                Err(GzipError::HeaderChecksumMismatch { stored, computed })
            }
            _ => Ok(()),
        }
    }
}

/// Low 16 bits of the CRC32 of `bytes`.
pub fn header_crc16(bytes: &[u8]) -> u16 {
    (crc32fast::hash(bytes) & 0xffff) as u16
}

/// Read a header without checking FHCRC.
pub fn decode_header_unverified(reader: &mut ByteReader<'_>) -> Result<DecodedHeader> {
    let start = reader.position();

    let id = reader.read_bytes(2)?;
    if id != MAGIC {
        return Err(GzipError::NotGzipFormat {
            found: [id[0], id[1]],
        });
    }

    let method = reader.read_u8()?;
    if method != CompressionMethod::Deflate.as_u8() {
        return Err(GzipError::UnsupportedMethod { method });
    }

    let flags = Flags::from_bits(reader.read_u8()?);
    let mtime = reader.read_u32_le()?;
    let extra_flags = reader.read_u8()?;
    let os = Os::from_u8(reader.read_u8()?);

    let extra = if flags.contains(Flags::FEXTRA) {
        let xlen = reader.read_u16_le()? as usize;
        Some(ExtraField::new(reader.read_bytes(xlen)?)?)
    } else {
        None
    };

    let filename = if flags.contains(Flags::FNAME) {
        Some(FieldText::new(reader.read_cstring()?)?)
    } else {
        None
    };

    let comment = if flags.contains(Flags::FCOMMENT) {
        Some(FieldText::new(reader.read_cstring()?)?)
    } else {
        None
    };

    let (header_crc, computed_crc) = if flags.contains(Flags::FHCRC) {
        let computed = header_crc16(reader.consumed_since(start));
        (Some(reader.read_u16_le()?), Some(computed))
    } else {
        (None, None)
    };

    Ok(DecodedHeader {
        header: MemberHeader {
            method: CompressionMethod::from_u8(method),
            flags,
            mtime,
            extra_flags: Some(extra_flags),
            os: Some(os),
            extra,
            filename,
            comment,
            header_crc,
        },
        computed_crc,
    })
}

/// Read a header and fail on a CRC16 mismatch.
pub fn decode_header(reader: &mut ByteReader<'_>) -> Result<MemberHeader> {
    let decoded = decode_header_unverified(reader)?;
    decoded.verify()?;
    Ok(decoded.header)
}

/// Serialize `header`, returning the CRC16 that was written if FHCRC is set.
///
/// The checksum is taken over the bytes just written, so the stored value
/// always matches the output exactly.
pub fn encode_header(
    header: &MemberHeader,
    options: &EncodeOptions,
    writer: &mut ByteWriter,
) -> Result<Option<u16>> {
    if header.method != CompressionMethod::Deflate {
        return Err(GzipError::UnsupportedMethod {
            method: header.method.as_u8(),
        });
    }

    let flags = header.flags;
    let start = writer.len();

    writer.write_bytes(&MAGIC);
    writer.write_u8(header.method.as_u8());
    writer.write_u8(flags.bits());
    writer.write_u32_le(header.mtime);
    writer.write_u8(
        header
            .extra_flags
            .unwrap_or_else(|| ExtraFlags::for_level(options.level)),
    );
    writer.write_u8(header.os.unwrap_or(options.os).as_u8());

    if flags.contains(Flags::FEXTRA) {
        let extra = header
            .extra
            .as_ref()
            .ok_or(GzipError::MissingField("extra field"))?;
        // ExtraField::new bounds the length to u16.
        writer.write_u16_le(extra.len() as u16);
        writer.write_bytes(extra.as_bytes());
    }

    if flags.contains(Flags::FNAME) {
        let filename = header
            .filename
            .as_ref()
            .ok_or(GzipError::MissingField("filename"))?;
        writer.write_cstring(filename.as_bytes());
    }

    if flags.contains(Flags::FCOMMENT) {
        let comment = header
            .comment
            .as_ref()
            .ok_or(GzipError::MissingField("comment"))?;
        writer.write_cstring(comment.as_bytes());
    }

    if flags.contains(Flags::FHCRC) {
        let crc = header_crc16(writer.written_since(start));
        writer.write_u16_le(crc);
        return Ok(Some(crc));
    }

    Ok(None)
}
