use crate::error::{Result, WaybillError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Sha1,
    Sha256,
}

impl Algorithm {
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
        }
    }
}

impl FromStr for Algorithm {
    type Err = std::io::Error;

    fn from_str(s: &str) -> std::io::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha1" => Ok(Algorithm::Sha1),
            "sha256" => Ok(Algorithm::Sha256),
            _ => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{s}: unsupported checksum"),
            )),
        }
    }
}

enum Inner {
    Sha1(Sha1),
    Sha256(Sha256),
}

/// Incremental digest context.
pub struct Cksum {
    inner: Inner,
}

impl Cksum {
    pub fn new(algorithm: Algorithm) -> Self {
        let inner = match algorithm {
            Algorithm::Sha1 => Inner::Sha1(Sha1::new()),
            Algorithm::Sha256 => Inner::Sha256(Sha256::new()),
        };
        Self { inner }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.inner {
            Inner::Sha1(h) => h.update(data),
            Inner::Sha256(h) => h.update(data),
        }
    }

    pub fn finish(self) -> Vec<u8> {
        match self.inner {
            Inner::Sha1(h) => h.finalize().to_vec(),
            Inner::Sha256(h) => h.finalize().to_vec(),
        }
    }
}

/// Render a digest to the textual form transcripts store. Digests are
/// only ever compared in this form.
pub fn encode(digest: &[u8]) -> String {
    STANDARD.encode(digest)
}

pub fn decode(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| WaybillError::Integrity(format!("bad checksum encoding: {e}")))
}

/// Digest a whole file, returning the digest and the exact number of
/// bytes read so callers can cross-check against an expected size.
pub fn cksum_file(path: &Path, algorithm: Algorithm) -> Result<(Vec<u8>, u64)> {
    let mut f = BufReader::new(File::open(path)?);
    let mut ctx = Cksum::new(algorithm);
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        ctx.update(&buf[..n]);
        total += n as u64;
    }
    Ok((ctx.finish(), total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn algorithm_names_parse() {
        assert_eq!("sha1".parse::<Algorithm>().unwrap(), Algorithm::Sha1);
        assert_eq!("SHA256".parse::<Algorithm>().unwrap(), Algorithm::Sha256);
        assert!("md5".parse::<Algorithm>().is_err());
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut a = Cksum::new(Algorithm::Sha1);
        a.update(b"hello ");
        a.update(b"world");

        let mut b = Cksum::new(Algorithm::Sha1);
        b.update(b"hello world");

        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn sha1_known_vector() {
        let mut ctx = Cksum::new(Algorithm::Sha1);
        ctx.update(b"abc");
        // SHA-1("abc") = a9993e364706816aba3e25717850c26c9cd0d89d
        assert_eq!(encode(&ctx.finish()), "qZk+NkcGgWq6PiVxeFDCbJzQ2J0=");
    }

    #[test]
    fn encode_decode_round_trip() {
        let mut ctx = Cksum::new(Algorithm::Sha256);
        ctx.update(b"round trip");
        let digest = ctx.finish();
        assert_eq!(decode(&encode(&digest)).unwrap(), digest);
    }

    #[test]
    fn file_digest_reports_byte_count() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"twelve bytes").unwrap();
        temp.flush().unwrap();

        let (digest, n) = cksum_file(temp.path(), Algorithm::Sha1).unwrap();
        assert_eq!(n, 12);

        let mut ctx = Cksum::new(Algorithm::Sha1);
        ctx.update(b"twelve bytes");
        assert_eq!(digest, ctx.finish());
    }

    #[test]
    fn file_digest_missing_path_is_io_error() {
        let err = cksum_file(Path::new("/no/such/file"), Algorithm::Sha1).unwrap_err();
        assert!(matches!(err, crate::error::WaybillError::Io(_)));
    }
}
