//! CRC32 + ISIZE trailer codec. Verification against the payload happens in
//! the member codec.

use super::cursor::{ByteReader, ByteWriter};
use super::structures::{MemberTrailer, TRAILER_SIZE};
use crate::error::Result;

pub fn decode_trailer(reader: &mut ByteReader<'_>) -> Result<MemberTrailer> {
    // Take all 8 bytes at once so a short trailer reports its full size.
    let bytes = reader.read_bytes(TRAILER_SIZE)?;
    let mut trailer = ByteReader::new(bytes);
    Ok(MemberTrailer {
        crc32: trailer.read_u32_le()?,
        isize: trailer.read_u32_le()?,
    })
}

pub fn encode_trailer(trailer: &MemberTrailer, writer: &mut ByteWriter) {
    writer.write_u32_le(trailer.crc32);
    writer.write_u32_le(trailer.isize);
}
