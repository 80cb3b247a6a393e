use std::fmt;
use std::ops::Range;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{GzipError, Result};

/// Gzip member magic number (ID1, ID2)
pub const MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Size of the fixed part of a member header
pub const FIXED_HEADER_SIZE: usize = 10;

/// Size of the CRC32 + ISIZE trailer
pub const TRAILER_SIZE: usize = 8;

/// Maximum payload of the FEXTRA field (its length prefix is a u16)
pub const MAX_EXTRA_LEN: usize = u16::MAX as usize;

/// Fastest and slowest deflate levels, as accepted by zlib
pub const BEST_SPEED: u32 = 1;
pub const BEST_COMPRESSION: u32 = 9;
pub const DEFAULT_LEVEL: u32 = 6;

/// Gzip compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Deflate,
    Unknown(u8),
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Self {
        match value {
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// The FLG byte of a member header.
///
/// Reserved bits (0xE0) are carried through unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(u8);

impl Flags {
    pub const FTEXT: u8 = 1;
    pub const FHCRC: u8 = 1 << 1;
    pub const FEXTRA: u8 = 1 << 2;
    pub const FNAME: u8 = 1 << 3;
    pub const FCOMMENT: u8 = 1 << 4;
    pub const RESERVED: u8 = 0xe0;

    pub fn from_bits(bits: u8) -> Self {
        Flags(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, bit: u8) -> bool {
        self.0 & bit == bit
    }

    pub fn insert(&mut self, bit: u8) {
        self.0 |= bit;
    }

    pub fn reserved(&self) -> u8 {
        self.0 & Self::RESERVED
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010b}", self.0)
    }
}

/// XFL hint values for deflate
pub struct ExtraFlags;

impl ExtraFlags {
    pub const MAX_COMPRESSION: u8 = 2;
    pub const FASTEST: u8 = 4;

    /// The XFL byte gzip tools write for a given deflate level.
    pub fn for_level(level: u32) -> u8 {
        match level {
            BEST_COMPRESSION => Self::MAX_COMPRESSION,
            BEST_SPEED => Self::FASTEST,
            _ => 0,
        }
    }
}

/// Operating system on which the member was written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Fat,
    Amiga,
    Vms,
    Unix,
    VmCms,
    AtariTos,
    Hpfs,
    Macintosh,
    ZSystem,
    CpM,
    Tops20,
    Ntfs,
    Qdos,
    AcornRiscos,
    Unknown,
    Other(u8),
}

impl Os {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Os::Fat,
            1 => Os::Amiga,
            2 => Os::Vms,
            3 => Os::Unix,
            4 => Os::VmCms,
            5 => Os::AtariTos,
            6 => Os::Hpfs,
            7 => Os::Macintosh,
            8 => Os::ZSystem,
            9 => Os::CpM,
            10 => Os::Tops20,
            11 => Os::Ntfs,
            12 => Os::Qdos,
            13 => Os::AcornRiscos,
            255 => Os::Unknown,
            _ => Os::Other(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            Os::Fat => 0,
            Os::Amiga => 1,
            Os::Vms => 2,
            Os::Unix => 3,
            Os::VmCms => 4,
            Os::AtariTos => 5,
            Os::Hpfs => 6,
            Os::Macintosh => 7,
            Os::ZSystem => 8,
            Os::CpM => 9,
            Os::Tops20 => 10,
            Os::Ntfs => 11,
            Os::Qdos => 12,
            Os::AcornRiscos => 13,
            Os::Unknown => 255,
            Os::Other(v) => *v,
        }
    }

    /// The OS byte for the platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Os::Fat
        } else if cfg!(target_os = "linux") {
            Os::Unix
        } else if cfg!(target_os = "macos") {
            Os::Macintosh
        } else {
            Os::Unknown
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Os::Fat => "FAT",
            Os::Amiga => "Amiga",
            Os::Vms => "VMS",
            Os::Unix => "Unix",
            Os::VmCms => "VM/CMS",
            Os::AtariTos => "Atari TOS",
            Os::Hpfs => "HPFS",
            Os::Macintosh => "Macintosh",
            Os::ZSystem => "Z-System",
            Os::CpM => "CP/M",
            Os::Tops20 => "TOPS-20",
            Os::Ntfs => "NTFS",
            Os::Qdos => "QDOS",
            Os::AcornRiscos => "Acorn RISCOS",
            Os::Unknown => "unknown",
            Os::Other(v) => return write!(f, "other({})", v),
        };
        f.write_str(name)
    }
}

/// Text encodings for converting FNAME/FCOMMENT bytes and literal content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    /// ISO-8859-1, the encoding RFC 1952 prescribes for header strings
    #[default]
    Latin1,
    /// UTF-8; invalid sequences are replaced when decoding
    Utf8,
}

impl TextEncoding {
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| GzipError::InvalidField {
                        field: "text",
                        reason: format!("{:?} is not representable in latin-1", c),
                    })
                })
                .collect(),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

/// Raw bytes of a NUL-terminated header string (FNAME or FCOMMENT).
///
/// The terminator is not stored. The value never contains a NUL byte.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldText(Vec<u8>);

impl FieldText {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if let Some(pos) = bytes.iter().position(|&b| b == 0) {
            return Err(GzipError::InvalidField {
                field: "header string",
                reason: format!("embedded NUL at byte {}", pos),
            });
        }
        Ok(FieldText(bytes))
    }

    pub fn from_latin1(text: &str) -> Result<Self> {
        Self::new(TextEncoding::Latin1.encode(text)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn decode(&self, encoding: TextEncoding) -> String {
        encoding.decode(&self.0)
    }

    pub fn to_latin1_string(&self) -> String {
        self.decode(TextEncoding::Latin1)
    }
}

impl fmt::Display for FieldText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_latin1_string())
    }
}

/// One `(id, length, data)` record inside the FEXTRA field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraSubfield {
    pub id: [u8; 2],
    pub data: Vec<u8>,
}

/// Payload of the FEXTRA field, kept opaque unless [`ExtraField::subfields`]
/// is asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraField(Vec<u8>);

impl ExtraField {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() > MAX_EXTRA_LEN {
            return Err(GzipError::FieldTooLong {
                field: "extra field",
                len: bytes.len(),
                max: MAX_EXTRA_LEN,
            });
        }
        Ok(ExtraField(bytes))
    }

    pub fn from_subfields(subfields: &[ExtraSubfield]) -> Result<Self> {
        let mut bytes = Vec::new();
        for sub in subfields {
            let len = u16::try_from(sub.data.len()).map_err(|_| GzipError::FieldTooLong {
                field: "extra subfield",
                len: sub.data.len(),
                max: MAX_EXTRA_LEN,
            })?;
            let mut len_buf = [0u8; 2];
            LittleEndian::write_u16(&mut len_buf, len);
            bytes.extend_from_slice(&sub.id);
            bytes.extend_from_slice(&len_buf);
            bytes.extend_from_slice(&sub.data);
        }
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the field as a sequence of subfield records.
    ///
    /// Offsets in errors are relative to the start of the extra field.
    pub fn subfields(&self) -> Result<Vec<ExtraSubfield>> {
        let data = &self.0;
        let mut subfields = Vec::new();
        let mut pos = 0;

        while pos < data.len() {
            if data.len() - pos < 4 {
                return Err(GzipError::TruncatedInput {
                    offset: pos,
                    needed: 4,
                    available: data.len() - pos,
                });
            }
            let id = [data[pos], data[pos + 1]];
            let len = LittleEndian::read_u16(&data[pos + 2..pos + 4]) as usize;
            pos += 4;

            if data.len() - pos < len {
                return Err(GzipError::TruncatedInput {
                    offset: pos,
                    needed: len,
                    available: data.len() - pos,
                });
            }
            subfields.push(ExtraSubfield {
                id,
                data: data[pos..pos + len].to_vec(),
            });
            pos += len;
        }

        Ok(subfields)
    }
}

/// Header metadata of one gzip member.
///
/// `os` and `extra_flags` are `None` only on the write path, where they are
/// filled in from [`EncodeOptions`](super::EncodeOptions). Decoded headers
/// always carry both. Optional fields are written iff their flag bit is set;
/// the `set_*` helpers keep the two in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberHeader {
    pub method: CompressionMethod,
    pub flags: Flags,
    /// Seconds since the Unix epoch, 0 if unknown
    pub mtime: u32,
    pub extra_flags: Option<u8>,
    pub os: Option<Os>,
    pub extra: Option<ExtraField>,
    pub filename: Option<FieldText>,
    pub comment: Option<FieldText>,
    /// Stored FHCRC value; filled in by the codec, ignored when encoding
    pub header_crc: Option<u16>,
}

impl Default for MemberHeader {
    fn default() -> Self {
        Self {
            method: CompressionMethod::Deflate,
            flags: Flags::default(),
            mtime: 0,
            extra_flags: None,
            os: None,
            extra: None,
            filename: None,
            comment: None,
            header_crc: None,
        }
    }
}

impl MemberHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_filename(&mut self, filename: FieldText) -> &mut Self {
        self.flags.insert(Flags::FNAME);
        self.filename = Some(filename);
        self
    }

    pub fn set_comment(&mut self, comment: FieldText) -> &mut Self {
        self.flags.insert(Flags::FCOMMENT);
        self.comment = Some(comment);
        self
    }

    pub fn set_extra(&mut self, extra: ExtraField) -> &mut Self {
        self.flags.insert(Flags::FEXTRA);
        self.extra = Some(extra);
        self
    }

    /// Request a CRC16 header checksum; the value is computed when encoding.
    pub fn set_header_crc(&mut self) -> &mut Self {
        self.flags.insert(Flags::FHCRC);
        self
    }

    /// Mark the payload as probably ASCII text.
    pub fn set_text(&mut self) -> &mut Self {
        self.flags.insert(Flags::FTEXT);
        self
    }

    pub fn is_text(&self) -> bool {
        self.flags.contains(Flags::FTEXT)
    }
}

/// CRC32 and ISIZE trailer of a member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberTrailer {
    /// CRC32 of the uncompressed payload
    pub crc32: u32,
    /// Uncompressed length modulo 2^32
    pub isize: u32,
}

impl MemberTrailer {
    /// Trailer values for an uncompressed payload.
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            crc32: crc32fast::hash(payload),
            isize: isize_of(payload.len()),
        }
    }
}

/// Uncompressed length as stored in ISIZE.
pub fn isize_of(len: usize) -> u32 {
    (len as u64 & 0xffff_ffff) as u32
}

/// A decoded member: its header, where its compressed data lives, and its
/// trailer. The payload is not kept here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub header: MemberHeader,
    /// Byte offset of the first header byte
    pub offset: usize,
    /// Byte range of the raw deflate stream
    pub data: Range<usize>,
    pub trailer: MemberTrailer,
}

impl Member {
    /// Total encoded length of the member
    pub fn encoded_len(&self) -> usize {
        self.data.end + TRAILER_SIZE - self.offset
    }
}
