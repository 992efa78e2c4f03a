//! Retrieval protocol client: one fetch per call, streaming the payload
//! to an exclusive-create temp file while the digest runs over the exact
//! bytes the wire carried.
//!
//! ```text
//! C: RETR <path-description>
//! S: <status line, first char '2' = success>   (continuations allowed)
//! S: <decimal byte count>
//! S: <payload, plain or AppleSingle-framed>
//! S: .
//! ```
//!
//! The client never renames a temp into place; ownership of the temp
//! artifacts transfers to the caller on success, and every failure path
//! removes whatever was created.

use crate::applefile;
use crate::cksum::{self, Algorithm, Cksum};
use crate::error::{Result, WaybillError};
use crate::report::Report;
use crate::transcript::record::parse_decimal;
use crate::util::guard::TempGuard;
use crate::wire::net::{LineStream, Transport};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

const CHUNK: usize = 8192;

pub struct FetchContext<T: Transport> {
    pub net: LineStream<T>,
    pub algorithm: Algorithm,
    /// Verify the payload digest against the transcript checksum.
    pub verify: bool,
    /// Echo `>>>`/`<<<` protocol trace lines to the sink.
    pub verbose: bool,
    /// Emit a progress dot per chunk.
    pub dots: bool,
}

/// Ownership of the listed temp artifacts passes to the caller, which
/// performs the final rename into place.
#[derive(Debug)]
pub struct FetchResult {
    pub data_path: PathBuf,
    /// Sibling resource-fork artifact, when the platform stores the fork
    /// as a separate file rather than a named sub-stream.
    pub rsrc_path: Option<PathBuf>,
    /// Finder info from the container, for the caller to apply.
    pub finder_info: Option<[u8; applefile::FINFOLEN]>,
    /// Computed payload digest, base64, when verification was on.
    pub cksum: Option<String>,
}

impl<T: Transport> FetchContext<T> {
    pub fn new(net: LineStream<T>, algorithm: Algorithm) -> Self {
        Self {
            net,
            algorithm,
            verify: true,
            verbose: false,
            dots: false,
        }
    }

    /// Fetch `pathdesc` as a plain byte stream into a temp file next to
    /// `dest`. `expected_size` of 0 means "no expectation".
    pub fn retrieve(
        &mut self,
        report: &mut dyn Report,
        pathdesc: &str,
        dest: &Path,
        expected_size: u64,
        expected_cksum: &str,
    ) -> Result<FetchResult> {
        let mut sum = self.begin(report, pathdesc, expected_cksum)?;
        let size = self.read_size(report, dest, expected_size)?;

        let temppath = temp_name(dest);
        let mut file = create_excl(&temppath)?;
        let mut guard = TempGuard::new(temppath.clone());

        self.stream_payload(&mut file, size, &mut sum)?;
        drop(file);

        self.read_terminator(report)?;
        let computed = self.check_digest(sum, dest, expected_cksum)?;

        guard.disarm();
        Ok(FetchResult {
            data_path: temppath,
            rsrc_path: None,
            finder_info: None,
            cksum: computed,
        })
    }

    /// Fetch `pathdesc` as an AppleSingle container, splitting it into a
    /// data-fork temp file and a resource-fork sub-stream. The digest
    /// covers the wire payload in order: header, entries, finder info,
    /// resource bytes, data bytes.
    pub fn retrieve_applefile(
        &mut self,
        report: &mut dyn Report,
        pathdesc: &str,
        dest: &Path,
        expected_size: u64,
        expected_cksum: &str,
    ) -> Result<FetchResult> {
        let mut sum = self.begin(report, pathdesc, expected_cksum)?;
        let size = self.read_size(report, dest, expected_size)?;

        // fixed preamble, consumed and digested before any output exists
        let mut header = [0u8; applefile::AS_HEADERLEN];
        self.read_exact_wire(&mut header)?;
        applefile::Header::parse(&header)?;
        if let Some(s) = sum.as_mut() {
            s.update(&header);
        }
        self.dot();

        let mut entry_buf = [0u8; applefile::ENTRIES_LEN];
        self.read_exact_wire(&mut entry_buf)?;
        let entries = applefile::parse_entries(&entry_buf);
        if let Some(s) = sum.as_mut() {
            s.update(&entry_buf);
        }
        self.dot();

        let mut finfo = [0u8; applefile::FINFOLEN];
        self.read_exact_wire(&mut finfo)?;
        if let Some(s) = sum.as_mut() {
            s.update(&finfo);
        }
        self.dot();

        let preamble =
            (applefile::AS_HEADERLEN + applefile::ENTRIES_LEN + applefile::FINFOLEN) as u64;
        let rsrc_len = u64::from(entries[applefile::AS_RFE].length);
        let data_len = size.checked_sub(preamble + rsrc_len).ok_or_else(|| {
            WaybillError::Protocol(format!(
                "declared size {size} too small for container preamble"
            ))
        })?;

        // the data fork file must exist before its resource fork can open
        let temppath = temp_name(dest);
        let mut dfile = create_excl(&temppath)?;
        let mut dguard = TempGuard::new(temppath.clone());

        let (mut rfile, rsrc_path) = open_resource_fork(&temppath)?;
        let mut rguard = rsrc_path.clone().map(TempGuard::new);

        self.stream_payload(&mut rfile, rsrc_len, &mut sum)?;
        drop(rfile);

        self.stream_payload(&mut dfile, data_len, &mut sum)?;
        drop(dfile);

        self.read_terminator(report)?;
        let computed = self.check_digest(sum, dest, expected_cksum)?;

        if let Some(g) = rguard.as_mut() {
            g.disarm();
        }
        dguard.disarm();
        Ok(FetchResult {
            data_path: temppath,
            rsrc_path,
            finder_info: Some(finfo),
            cksum: computed,
        })
    }

    /// Send the request and require a success status.
    fn begin(
        &mut self,
        report: &mut dyn Report,
        pathdesc: &str,
        expected_cksum: &str,
    ) -> Result<Option<Cksum>> {
        if self.verify && expected_cksum == "-" {
            return Err(WaybillError::Integrity(
                "checksum not listed in transcript".into(),
            ));
        }
        let sum = self.verify.then(|| Cksum::new(self.algorithm));

        self.net.write_line(&format!("RETR {pathdesc}"))?;
        if self.verbose {
            report.line(&format!(">>> RETR {pathdesc}"));
        }

        let status = self.net.getline_multi(report)?;
        if !status.starts_with('2') {
            return Err(WaybillError::Protocol(status));
        }
        Ok(sum)
    }

    /// Read the declared size line. Runs before any temp file exists, so
    /// a transcript disagreement leaves nothing on disk.
    fn read_size(
        &mut self,
        report: &mut dyn Report,
        dest: &Path,
        expected_size: u64,
    ) -> Result<u64> {
        let line = self.net.getline()?;
        let size = parse_decimal(&line);
        if expected_size != 0 && size != expected_size {
            return Err(WaybillError::Integrity(format!(
                "{}: size in transcript does not match size from server",
                dest.display()
            )));
        }
        if self.verbose {
            report.line(&format!("<<< {size}"));
        }
        Ok(size)
    }

    fn read_terminator(&mut self, report: &mut dyn Report) -> Result<()> {
        let line = self.net.getline()?;
        if line != "." {
            return Err(WaybillError::Protocol(format!(
                "missing end-of-payload marker: {line:?}"
            )));
        }
        if self.verbose {
            report.line("<<< .");
        }
        Ok(())
    }

    fn check_digest(
        &mut self,
        sum: Option<Cksum>,
        dest: &Path,
        expected_cksum: &str,
    ) -> Result<Option<String>> {
        match sum {
            Some(s) => {
                let computed = cksum::encode(&s.finish());
                if computed != expected_cksum {
                    return Err(WaybillError::Integrity(format!(
                        "checksum failed: {}",
                        dest.display()
                    )));
                }
                Ok(Some(computed))
            }
            None => Ok(None),
        }
    }

    /// Copy `remaining` payload bytes to `out` in bounded chunks,
    /// feeding the running digest.
    fn stream_payload(&mut self, out: &mut File, mut remaining: u64, sum: &mut Option<Cksum>) -> Result<()> {
        let mut buf = [0u8; CHUNK];
        while remaining > 0 {
            let want = buf.len().min(remaining as usize);
            let n = self.net.read_chunk(&mut buf[..want])?;
            out.write_all(&buf[..n])?;
            if let Some(s) = sum.as_mut() {
                s.update(&buf[..n]);
            }
            self.dot();
            remaining -= n as u64;
        }
        Ok(())
    }

    fn read_exact_wire(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut off = 0;
        while off < buf.len() {
            off += self.net.read_chunk(&mut buf[off..])?;
        }
        Ok(())
    }

    fn dot(&self) {
        if self.dots {
            print!(".");
            let _ = io::stdout().flush();
        }
    }
}

/// A temp name collision means another fetch is already writing this
/// target; fail loudly instead of racing it.
fn create_excl(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            WaybillError::Io(io::Error::new(
                e.kind(),
                format!("{}: {e}", path.display()),
            ))
        })
}

fn temp_name(dest: &Path) -> PathBuf {
    PathBuf::from(format!("{}.waybill.{}", dest.display(), process::id()))
}

/// The resource fork rides on the data-fork temp as a named sub-stream
/// on macOS; elsewhere it becomes an exclusive-create sibling so the
/// protocol path behaves the same everywhere.
#[cfg(target_os = "macos")]
fn open_resource_fork(data_path: &Path) -> Result<(File, Option<PathBuf>)> {
    let rsrc = data_path.join("..namedfork").join("rsrc");
    let f = OpenOptions::new().write(true).open(&rsrc).map_err(|e| {
        WaybillError::Io(io::Error::new(
            e.kind(),
            format!("{}: {e}", rsrc.display()),
        ))
    })?;
    Ok((f, None))
}

#[cfg(not(target_os = "macos"))]
fn open_resource_fork(data_path: &Path) -> Result<(File, Option<PathBuf>)> {
    let rsrc = PathBuf::from(format!("{}.rsrc", data_path.display()));
    let f = create_excl(&rsrc)?;
    Ok((f, Some(rsrc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Capture;
    use crate::wire::net::testing::Scripted;
    use std::fs;

    fn context(server_bytes: Vec<u8>) -> FetchContext<Scripted> {
        let net = LineStream::new(Scripted::new(server_bytes), None).unwrap();
        FetchContext::new(net, Algorithm::Sha1)
    }

    fn sha1_b64(payload: &[u8]) -> String {
        let mut ctx = Cksum::new(Algorithm::Sha1);
        ctx.update(payload);
        cksum::encode(&ctx.finish())
    }

    fn dir_entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn plain_fetch_streams_and_verifies() {
        let body = b"hello, wire";
        let script = [
            b"200 OK\n".as_slice(),
            format!("{}\n", body.len()).as_bytes(),
            body,
            b".\n",
        ]
        .concat();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let mut ctx = context(script);
        let mut log = Capture::default();

        let result = ctx
            .retrieve(&mut log, "/etc/out", &dest, body.len() as u64, &sha1_b64(body))
            .unwrap();

        assert_eq!(ctx.net.get_ref().tx, b"RETR /etc/out\n");
        assert_eq!(fs::read(&result.data_path).unwrap(), body);
        assert!(result.rsrc_path.is_none());
        assert_eq!(result.cksum.as_deref(), Some(sha1_b64(body).as_str()));
    }

    #[test]
    fn size_disagreement_fails_before_any_temp_exists() {
        let script = b"200 OK\n100\n".to_vec();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let mut ctx = context(script);
        let mut log = Capture::default();

        let err = ctx
            .retrieve(&mut log, "/x", &dest, 90, "irrelevant")
            .unwrap_err();

        assert!(matches!(err, WaybillError::Integrity(_)), "{err}");
        assert_eq!(dir_entries(dir.path()), 0, "no artifact may be created");
    }

    #[test]
    fn non_success_status_is_surfaced_verbatim() {
        let script = b"550 no such object\n".to_vec();
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(script);
        let mut log = Capture::default();

        let err = ctx
            .retrieve(&mut log, "/x", &dir.path().join("out"), 0, "AAAA")
            .unwrap_err();

        match err {
            WaybillError::Protocol(text) => assert_eq!(text, "550 no such object"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn multi_line_status_drains_continuations() {
        let body = b"x";
        let script = [
            b"201-updates available\n200 ready\n".as_slice(),
            b"1\n",
            body,
            b".\n",
        ]
        .concat();
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(script);
        let mut log = Capture::default();

        ctx.retrieve(&mut log, "/x", &dir.path().join("out"), 0, &sha1_b64(body))
            .unwrap();
        assert!(log.0.contains(&"201-updates available".to_string()));
    }

    #[test]
    fn sentinel_checksum_is_refused_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(Vec::new());
        let mut log = Capture::default();

        let err = ctx
            .retrieve(&mut log, "/x", &dir.path().join("out"), 0, "-")
            .unwrap_err();

        assert!(matches!(err, WaybillError::Integrity(_)));
        assert!(ctx.net.get_ref().tx.is_empty(), "nothing may hit the wire");
    }

    #[test]
    fn bad_terminator_removes_the_temp() {
        let body = b"abc";
        let script = [
            b"200 OK\n3\n".as_slice(),
            body,
            b"garbage\n",
        ]
        .concat();
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(script);
        let mut log = Capture::default();

        let err = ctx
            .retrieve(&mut log, "/x", &dir.path().join("out"), 0, &sha1_b64(body))
            .unwrap_err();

        assert!(matches!(err, WaybillError::Protocol(_)));
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[test]
    fn checksum_mismatch_removes_the_temp() {
        let script = b"200 OK\n3\nabc.\n".to_vec();
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(script);
        let mut log = Capture::default();

        let err = ctx
            .retrieve(&mut log, "/x", &dir.path().join("out"), 0, &sha1_b64(b"different"))
            .unwrap_err();

        assert!(matches!(err, WaybillError::Integrity(_)));
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[test]
    fn truncated_payload_removes_the_temp() {
        let script = b"200 OK\n10\nabc".to_vec();
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(script);
        let mut log = Capture::default();

        let err = ctx
            .retrieve(&mut log, "/x", &dir.path().join("out"), 0, "AAAA")
            .unwrap_err();

        assert!(matches!(err, WaybillError::Protocol(_)));
        assert_eq!(dir_entries(dir.path()), 0);
    }

    fn container_payload(rsrc: &[u8], data: &[u8]) -> Vec<u8> {
        let mut entries = [0u8; applefile::ENTRIES_LEN];
        let finfo_off = (applefile::AS_HEADERLEN + applefile::ENTRIES_LEN) as u32;
        let rsrc_off = finfo_off + applefile::FINFOLEN as u32;
        let data_off = rsrc_off + rsrc.len() as u32;
        let table = [
            (applefile::ASEID_FINFO, finfo_off, applefile::FINFOLEN as u32),
            (applefile::ASEID_RFORK, rsrc_off, rsrc.len() as u32),
            (applefile::ASEID_DFORK, data_off, data.len() as u32),
        ];
        for (i, (id, off, len)) in table.iter().enumerate() {
            let at = i * applefile::ENTRY_LEN;
            entries[at..at + 4].copy_from_slice(&id.to_be_bytes());
            entries[at + 4..at + 8].copy_from_slice(&off.to_be_bytes());
            entries[at + 8..at + 12].copy_from_slice(&len.to_be_bytes());
        }

        let mut payload = Vec::new();
        payload.extend_from_slice(&applefile::header_bytes());
        payload.extend_from_slice(&entries);
        payload.extend_from_slice(&[0xAAu8; applefile::FINFOLEN]);
        payload.extend_from_slice(rsrc);
        payload.extend_from_slice(data);
        payload
    }

    #[test]
    fn applefile_fetch_splits_forks_and_digests_whole_payload() {
        let rsrc = b"resource fork bytes";
        let data = b"data fork bytes, rather longer than the resource";
        let payload = container_payload(rsrc, data);
        let script = [
            b"200 OK\n".as_slice(),
            format!("{}\n", payload.len()).as_bytes(),
            payload.as_slice(),
            b".\n",
        ]
        .concat();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        let mut ctx = context(script);
        let mut log = Capture::default();

        let result = ctx
            .retrieve_applefile(
                &mut log,
                "/x",
                &dest,
                payload.len() as u64,
                &sha1_b64(&payload),
            )
            .unwrap();

        assert_eq!(fs::read(&result.data_path).unwrap(), data);
        let rsrc_path = result.rsrc_path.as_ref().expect("sibling fork on this platform");
        assert_eq!(fs::read(rsrc_path).unwrap(), rsrc);
        assert_eq!(result.finder_info, Some([0xAAu8; applefile::FINFOLEN]));
        assert_eq!(result.cksum.as_deref(), Some(sha1_b64(&payload).as_str()));
    }

    #[test]
    fn corrupt_header_aborts_before_any_fork_output() {
        let mut payload = container_payload(b"r", b"d");
        payload[0] ^= 0x01;
        let script = [
            b"200 OK\n".as_slice(),
            format!("{}\n", payload.len()).as_bytes(),
            payload.as_slice(),
            b".\n",
        ]
        .concat();

        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(script);
        let mut log = Capture::default();

        let err = ctx
            .retrieve_applefile(&mut log, "/x", &dir.path().join("out"), 0, "AAAA")
            .unwrap_err();

        assert!(matches!(err, WaybillError::Container(_)), "{err}");
        assert_eq!(dir_entries(dir.path()), 0, "zero fork bytes may be written");
    }

    #[test]
    fn declared_size_smaller_than_preamble_is_rejected() {
        let script = {
            let payload = container_payload(b"", b"");
            [
                b"200 OK\n".as_slice(),
                b"50\n", // less than header + entries + finder info
                payload.as_slice(),
            ]
            .concat()
        };
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(script);
        let mut log = Capture::default();

        let err = ctx
            .retrieve_applefile(&mut log, "/x", &dir.path().join("out"), 0, "AAAA")
            .unwrap_err();

        assert!(matches!(err, WaybillError::Protocol(_)), "{err}");
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[test]
    fn verbose_mode_traces_the_conversation() {
        let body = b"z";
        let script = [b"200 OK\n1\n".as_slice(), body, b".\n"].concat();
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(script);
        ctx.verbose = true;
        let mut log = Capture::default();

        ctx.retrieve(&mut log, "/x", &dir.path().join("out"), 0, &sha1_b64(body))
            .unwrap();

        assert_eq!(log.0[0], ">>> RETR /x");
        assert!(log.0.contains(&"<<< 1".to_string()));
        assert!(log.0.contains(&"<<< .".to_string()));
    }
}
