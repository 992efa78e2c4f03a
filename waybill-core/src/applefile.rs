//! AppleSingle container layout.
//!
//! One stream multiplexing finder info, resource fork and data fork
//! behind a fixed 26-byte header and a three-entry directory:
//!
//! ```text
//! header:  magic (4) | version (4) | filler (16) | entry count (2)
//! entries: 3 x { id (4) | offset (4) | length (4) }
//! data:    finder info (32) | resource fork | data fork
//! ```
//!
//! All integers big-endian. The codec does no I/O; the retrieval client
//! hands it byte slices it has already read off the wire.

use thiserror::Error;

pub const AS_HEADERLEN: usize = 26;
pub const AS_MAGIC: u32 = 0x0005_1600;
pub const AS_VERSION: u32 = 0x0002_0000;
pub const AS_NENTRIES: u16 = 3;
pub const ENTRY_LEN: usize = 12;
pub const ENTRIES_LEN: usize = AS_NENTRIES as usize * ENTRY_LEN;
pub const FINFOLEN: usize = 32;

pub const ASEID_DFORK: u32 = 1;
pub const ASEID_RFORK: u32 = 2;
pub const ASEID_FINFO: u32 = 9;

/// Fixed slots in the entry table: finder info, resource fork, data fork.
pub const AS_FIE: usize = 0;
pub const AS_RFE: usize = 1;
pub const AS_DFE: usize = 2;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerError {
    #[error("not a recognized AppleSingle stream")]
    NotRecognized,
}

/// The only header this client accepts: known magic and version, zero
/// filler, exactly three entries.
pub fn header_bytes() -> [u8; AS_HEADERLEN] {
    let mut buf = [0u8; AS_HEADERLEN];
    buf[0..4].copy_from_slice(&AS_MAGIC.to_be_bytes());
    buf[4..8].copy_from_slice(&AS_VERSION.to_be_bytes());
    buf[24..26].copy_from_slice(&AS_NENTRIES.to_be_bytes());
    buf
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub version: u32,
    pub num_entries: u16,
}

impl Header {
    /// Byte-for-byte validation; any deviation rejects the whole stream
    /// before any fork bytes are consumed.
    pub fn parse(buf: &[u8; AS_HEADERLEN]) -> Result<Self, ContainerError> {
        if buf != &header_bytes() {
            return Err(ContainerError::NotRecognized);
        }
        Ok(Self {
            magic: AS_MAGIC,
            version: AS_VERSION,
            num_entries: AS_NENTRIES,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Entry {
    pub id: u32,
    pub offset: u32,
    pub length: u32,
}

pub fn parse_entries(buf: &[u8; ENTRIES_LEN]) -> [Entry; AS_NENTRIES as usize] {
    let mut out = [Entry::default(); AS_NENTRIES as usize];
    for (i, e) in out.iter_mut().enumerate() {
        let off = i * ENTRY_LEN;
        e.id = u32::from_be_bytes(buf[off..off + 4].try_into().unwrap());
        e.offset = u32::from_be_bytes(buf[off + 4..off + 8].try_into().unwrap());
        e.length = u32::from_be_bytes(buf[off + 8..off + 12].try_into().unwrap());
    }
    out
}
