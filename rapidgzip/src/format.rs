//! Format sniffing: gzip / zlib / raw deflate / BGZF / bzip2.

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Gzip,
    Bgzf,
    Zlib,
    Deflate,
    Bzip2,
    Unknown,
}

/// Gzip extra-subfield identifiers this crate recognizes as chunking
/// hints (purely advisory — none are required to decode correctly).
pub const KNOWN_EXTRA_SUBFIELDS: &[[u8; 2]] = &[
    *b"BC", // BGZF block size
    *b"IG", // pigz independent gzip member boundary hint
    *b"MZ", *b"QZ", *b"ZC", *b"GC", *b"IX", *b"RA",
];

/// Detects the container format of `bytes` (the gzip-before-BGZF-before-
/// zlib-before-deflate order mirrors the original detection order: gzip's
/// magic is checked first, and only if it matches do we additionally look
/// for the BGZF extra-field marker).
pub fn sniff(bytes: &[u8]) -> FileType {
    if is_gzip_magic(bytes) {
        return if is_bgzf(bytes) {
            FileType::Bgzf
        } else {
            FileType::Gzip
        };
    }
    if is_bzip2_magic(bytes) {
        return FileType::Bzip2;
    }
    if is_zlib_magic(bytes) {
        return FileType::Zlib;
    }
    // Raw deflate has no magic bytes; callers must opt into this mode
    // explicitly rather than relying on sniffing.
    FileType::Unknown
}

fn is_gzip_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 3 && bytes[0] == 0x1F && bytes[1] == 0x8B && bytes[2] == 0x08
}

fn is_bzip2_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 4
        && bytes[0] == b'B'
        && bytes[1] == b'Z'
        && bytes[2] == b'h'
        && (b'1'..=b'9').contains(&bytes[3])
}

fn is_zlib_magic(bytes: &[u8]) -> bool {
    if bytes.len() < 2 {
        return false;
    }
    let cmf = bytes[0];
    let flg = bytes[1];
    let method = cmf & 0x0F;
    method == 8 && (u16::from(cmf) * 256 + u16::from(flg)) % 31 == 0
}

/// Returns true if the zlib header at `bytes[0..2]` sets FDICT, which this
/// crate does not support (see DESIGN.md Non-goals).
pub fn zlib_has_preset_dictionary(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && (bytes[1] & 0b0010_0000) != 0
}

/// Scans a gzip header's FEXTRA subfields (if present) for the 'BC' BGZF
/// marker, returning the declared total block size (BSIZE + 1) if found.
fn is_bgzf(bytes: &[u8]) -> bool {
    bgzf_block_size(bytes).is_some()
}

pub fn bgzf_block_size(bytes: &[u8]) -> Option<u32> {
    if !is_gzip_magic(bytes) || bytes.len() < 12 {
        return None;
    }
    let flags = bytes[3];
    const FEXTRA: u8 = 0b0000_0100;
    if flags & FEXTRA == 0 {
        return None;
    }

    let mut offset = 10usize;
    let xlen = u16::from_le_bytes([bytes.get(offset)?.to_owned(), bytes.get(offset + 1)?.to_owned()])
        as usize;
    offset += 2;
    let end = offset.checked_add(xlen)?;
    if end > bytes.len() {
        return None;
    }

    while offset + 4 <= end {
        let id = [bytes[offset], bytes[offset + 1]];
        let len = u16::from_le_bytes([bytes[offset + 2], bytes[offset + 3]]) as usize;
        let field_start = offset + 4;
        if id == *b"BC" && len == 2 && field_start + 2 <= end {
            let bsize = u16::from_le_bytes([bytes[field_start], bytes[field_start + 1]]);
            return Some(bsize as u32 + 1);
        }
        offset = field_start + len;
    }
    None
}

/// Computes the byte offset where the deflate stream begins inside a
/// single gzip member, accounting for every optional FLG field (RFC 1952
/// §2.3): FEXTRA, FNAME, FCOMMENT, FHCRC.
pub fn gzip_header_size(bytes: &[u8]) -> Result<usize> {
    if !is_gzip_magic(bytes) {
        return Err(Error::InvalidHeader);
    }
    if bytes.len() < 10 {
        return Err(Error::UnexpectedEof);
    }
    let flags = bytes[3];
    let mut offset = 10usize;

    const FEXTRA: u8 = 0b0000_0100;
    const FNAME: u8 = 0b0000_1000;
    const FCOMMENT: u8 = 0b0001_0000;
    const FHCRC: u8 = 0b0000_0010;

    if flags & FEXTRA != 0 {
        let xlen_bytes = bytes.get(offset..offset + 2).ok_or(Error::UnexpectedEof)?;
        let xlen = u16::from_le_bytes([xlen_bytes[0], xlen_bytes[1]]) as usize;
        offset += 2 + xlen;
    }
    if flags & FNAME != 0 {
        offset += find_nul(bytes, offset)? + 1;
    }
    if flags & FCOMMENT != 0 {
        offset += find_nul(bytes, offset)? + 1;
    }
    if flags & FHCRC != 0 {
        offset += 2;
    }
    if offset > bytes.len() {
        return Err(Error::UnexpectedEof);
    }
    Ok(offset)
}

fn find_nul(bytes: &[u8], start: usize) -> Result<usize> {
    bytes[start..]
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::UnexpectedEof)
}

/// Validates a zlib header, returning an error if it requests an
/// unsupported preset dictionary.
pub fn validate_zlib_header(bytes: &[u8]) -> Result<()> {
    if !is_zlib_magic(bytes) {
        return Err(Error::InvalidHeader);
    }
    if zlib_has_preset_dictionary(bytes) {
        return Err(Error::PresetDictionaryUnsupported);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_gzip() {
        assert_eq!(sniff(&[0x1F, 0x8B, 0x08, 0x00]), FileType::Gzip);
    }

    #[test]
    fn sniffs_bzip2() {
        assert_eq!(sniff(b"BZh9abc"), FileType::Bzip2);
    }

    #[test]
    fn sniffs_zlib_default_header() {
        // CMF=0x78 (method 8, 32K window), FLG=0x9C is a common zlib header.
        assert_eq!(sniff(&[0x78, 0x9C]), FileType::Zlib);
    }

    #[test]
    fn unknown_for_garbage() {
        assert_eq!(sniff(&[0, 1, 2, 3]), FileType::Unknown);
    }

    #[test]
    fn detects_bgzf_extra_field() {
        // Minimal gzip header with FEXTRA set and a BC subfield of size 2.
        let mut header = vec![0x1F, 0x8B, 0x08, 0b0000_0100, 0, 0, 0, 0, 0, 0xFF];
        let xlen: u16 = 6; // BC subfield: 2 (id) + 2 (len) + 2 (payload)
        header.extend_from_slice(&xlen.to_le_bytes());
        header.extend_from_slice(b"BC");
        header.extend_from_slice(&2u16.to_le_bytes());
        header.extend_from_slice(&999u16.to_le_bytes());

        assert_eq!(sniff(&header), FileType::Bgzf);
        assert_eq!(bgzf_block_size(&header), Some(1000));
    }
}
