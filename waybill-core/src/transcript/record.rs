//! One transcript line, parsed.
//!
//! Line grammar (whitespace-separated, path percent-escaped on disk):
//!
//! ```text
//! [-] type path mode owner group mtime size checksum
//! ```
//!
//! Only `f` and `a` records carry the full eight checksummed fields;
//! every other kind is opaque and passes through the engine verbatim.

use crate::error::{Result, WaybillError};
use crate::util::{code, tokenize};

#[derive(Debug, Clone)]
pub struct Record {
    /// Type field as written; only its first byte is significant.
    pub kind: String,
    /// Leading `-` marker: this path should be absent. Removal records
    /// are never checksum-verified.
    pub remove: bool,
    /// Path exactly as stored in the transcript.
    pub epath: String,
    /// Percent-decoded path, used for ordering, filtering and lookup.
    pub path: String,
    /// Field count after the remove marker, for the structural check.
    pub nfields: usize,
    /// Checksummed-record fields; present only when all eight are.
    pub meta: Option<Meta>,
    /// Untouched original text, so unchanged lines re-emit byte-identical.
    pub raw: String,
}

#[derive(Debug, Clone)]
pub struct Meta {
    pub mode: String,
    pub owner: String,
    pub group: String,
    /// Opaque unless the line is rewritten with a fresh mtime.
    pub mtime: String,
    pub size: u64,
    /// Base64 digest text, or `-` for "not tracked".
    pub cksum: String,
}

impl Record {
    /// True when this record's checksum must be reconciled.
    pub fn checksummed(&self) -> bool {
        !self.remove && matches!(self.kind.as_bytes().first(), Some(b'f') | Some(b'a'))
    }
}

/// Parse one line. `Ok(None)` is a blank or comment line, re-emitted
/// verbatim by the caller.
pub fn parse_line(raw: &str, linenum: u64) -> Result<Option<Record>> {
    let fields = tokenize::tokenize(raw);
    if fields.is_empty() || fields[0].starts_with('#') {
        return Ok(None);
    }
    if fields.len() == 1 {
        return Err(WaybillError::Structural {
            line: linenum,
            msg: "invalid transcript line".into(),
        });
    }

    let (remove, fields) = if fields[0].starts_with('-') {
        (true, &fields[1..])
    } else {
        (false, &fields[..])
    };
    if fields.len() < 2 {
        return Err(WaybillError::Structural {
            line: linenum,
            msg: "invalid transcript line".into(),
        });
    }

    let kind = fields[0].to_string();
    let epath = fields[1].to_string();
    let path = code::decode(&epath);

    let checksummed_kind = !remove && matches!(kind.as_bytes().first(), Some(b'f') | Some(b'a'));
    let meta = if checksummed_kind && fields.len() == 8 {
        Some(Meta {
            mode: fields[2].to_string(),
            owner: fields[3].to_string(),
            group: fields[4].to_string(),
            mtime: fields[5].to_string(),
            size: parse_decimal(fields[6]),
            cksum: fields[7].to_string(),
        })
    } else {
        None
    };

    Ok(Some(Record {
        kind,
        remove,
        epath,
        path,
        nfields: fields.len(),
        meta,
        raw: raw.to_string(),
    }))
}

/// Decimal prefix parse: stops at the first non-digit, so trailing
/// garbage after the digits is accepted rather than rejected.
pub fn parse_decimal(s: &str) -> u64 {
    let s = s.trim_start();
    let end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    s[..end].parse().unwrap_or(0)
}
