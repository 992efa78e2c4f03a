//! Transcript reconciliation: one pass over a sorted transcript,
//! comparing each checksummed record against the parallel
//! `file/<name>/` tree and rewriting the transcript atomically when
//! anything drifted.

use crate::cksum::{self, Algorithm};
use crate::error::{Result, WaybillError};
use crate::pathcmp;
use crate::report::Report;
use crate::transcript::record::{self, Record};
use crate::util::guard::TempGuard;
use std::cmp::Ordering;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::UNIX_EPOCH;

#[derive(Clone, Debug)]
pub struct VerifyOptions {
    pub algorithm: Algorithm,
    /// Only reconcile records whose decoded path starts with this prefix;
    /// everything else passes through unchanged.
    pub prefix: Option<String>,
    /// When false (dry run), report what would change but never create
    /// the update file or rename anything.
    pub update: bool,
    /// 0 = quiet, 1 = per-change status lines, 2 = percent progress too.
    pub verbose: u8,
    pub case_insensitive: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Sha1,
            prefix: None,
            update: true,
            verbose: 1,
            case_insensitive: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every record matched the tree; the transcript was not touched.
    Verified,
    /// This many mismatches were found and the transcript was rewritten.
    Updated(u64),
    /// Dry run: this many mismatches were found, nothing was touched.
    Incorrect(u64),
}

/// Reconcile the transcript at `tpath` against the on-disk tree.
///
/// Object content is expected under `<dir>/../file/<name>/<path>` where
/// `<dir>/<name>` is the transcript itself. The rewrite goes to a
/// sibling temp file (`<transcript>.<pid>`, exclusive create, original
/// permission bits) renamed over the original only on success with at
/// least one change; fatal errors never touch the original.
///
/// Two reconciliations racing on one transcript are the caller's problem
/// to serialize; the temp-and-rename dance only protects against a crash
/// mid-rewrite.
pub fn verify_transcript(
    tpath: &Path,
    opts: &VerifyOptions,
    out: &mut dyn Report,
) -> Result<Outcome> {
    let st = fs::metadata(tpath).map_err(|e| io_ctx(tpath, e))?;
    if !st.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{}: not a regular file", tpath.display()),
        )
        .into());
    }
    // update mode ends in a rename over the original, so refuse a
    // transcript we could not have written in place
    if opts.update && st.permissions().readonly() {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("{}: transcript is not writable", tpath.display()),
        )
        .into());
    }

    let tname = match tpath.file_name().and_then(|s| s.to_str()) {
        Some(name) => name.to_string(),
        None => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{}: bad transcript path", tpath.display()),
            )
            .into());
        }
    };
    let tdir = match tpath.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut reader = BufReader::new(File::open(tpath).map_err(|e| io_ctx(tpath, e))?);

    // progress mode wants a total before the pass starts
    let mut lcount = 0u64;
    if opts.verbose >= 2 {
        let mut counter = BufReader::new(File::open(tpath).map_err(|e| io_ctx(tpath, e))?);
        let mut line = String::new();
        while counter.read_line(&mut line)? > 0 {
            lcount += 1;
            line.clear();
        }
    }

    let upath = PathBuf::from(format!("{}.{}", tpath.display(), process::id()));
    let mut update_file = None;
    let mut guard = None;
    if opts.update {
        let mut open = OpenOptions::new();
        open.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
            open.mode(st.permissions().mode() & 0o7777);
        }
        let uf = open.open(&upath).map_err(|e| io_ctx(&upath, e))?;
        guard = Some(TempGuard::new(upath.clone()));
        update_file = Some(BufWriter::new(uf));
    }

    let mut linenum = 0u64;
    let mut ucount = 0u64;
    let mut prefix_found = false;
    let mut prev_path = String::new();
    let mut last_pct: i64 = -1;
    let mut raw = String::new();

    loop {
        raw.clear();
        if reader.read_line(&mut raw)? == 0 {
            break;
        }
        linenum += 1;
        if !raw.ends_with('\n') {
            return Err(WaybillError::Structural {
                line: linenum,
                msg: "unterminated line".into(),
            });
        }

        let rec = match record::parse_line(&raw, linenum)? {
            Some(rec) => rec,
            None => {
                if let Some(w) = update_file.as_mut() {
                    w.write_all(raw.as_bytes())?;
                }
                continue;
            }
        };

        // sort order is enforced for every record kind, pass-through or not
        if pathcmp::pathcmp_case(&rec.path, &prev_path, !opts.case_insensitive) == Ordering::Less {
            return Err(WaybillError::Structural {
                line: linenum,
                msg: "bad sort order".into(),
            });
        }
        prev_path.clear();
        prev_path.push_str(&rec.path);

        if opts.verbose >= 2 && lcount > 0 {
            let pct = (linenum * 100 / lcount) as i64;
            if pct != last_pct {
                out.line(&format!("%{pct:02} {}", rec.path));
            }
            last_pct = pct;
        }

        if !rec.checksummed() {
            if let Some(w) = update_file.as_mut() {
                w.write_all(raw.as_bytes())?;
            }
            continue;
        }

        let meta = match rec.meta.as_ref() {
            Some(meta) if rec.nfields == 8 => meta,
            _ => {
                return Err(WaybillError::Structural {
                    line: linenum,
                    msg: format!("{} arguments should be 8", rec.nfields),
                });
            }
        };

        if let Some(prefix) = opts.prefix.as_deref() {
            if !rec.path.starts_with(prefix) {
                if let Some(w) = update_file.as_mut() {
                    w.write_all(raw.as_bytes())?;
                }
                continue;
            }
            prefix_found = true;
        }

        let target = target_path(&tdir, &tname, &rec.path);
        let fst = fs::metadata(&target).map_err(|e| io_ctx(&target, e))?;

        let mut needs_update = false;
        if fst.len() != meta.size {
            ucount += 1;
            needs_update = true;
            if opts.verbose >= 1 {
                let what = if opts.update { "size updated" } else { "size wrong" };
                out.line(&format!("{}: {what}", rec.path));
            }
        }

        let (digest, nbytes) = match cksum::cksum_file(&target, opts.algorithm) {
            Ok(v) => v,
            Err(WaybillError::Io(e)) => return Err(io_ctx(&target, e)),
            Err(e) => return Err(e),
        };
        if nbytes != fst.len() {
            return Err(WaybillError::Integrity(format!(
                "line {linenum}: {} changed size while being checksummed",
                target.display()
            )));
        }

        let computed = cksum::encode(&digest);
        if computed != meta.cksum {
            ucount += 1;
            needs_update = true;
            if opts.verbose >= 1 {
                let what = if opts.update { "cksum updated" } else { "cksum wrong" };
                out.line(&format!("{}: {what}", rec.path));
            }
        }

        if let Some(w) = update_file.as_mut() {
            if needs_update {
                w.write_all(corrected_line(&rec, meta, &fst, &computed).as_bytes())?;
            } else {
                w.write_all(raw.as_bytes())?;
            }
        }
    }

    if let Some(prefix) = opts.prefix.as_deref() {
        if !prefix_found && opts.verbose >= 1 {
            out.line(&format!("warning: prefix \"{prefix}\" not found"));
        }
    }

    match update_file {
        Some(mut w) => {
            w.flush()?;
            drop(w);
            if ucount > 0 {
                fs::rename(&upath, tpath).map_err(|e| io_ctx(&upath, e))?;
                if let Some(g) = guard.as_mut() {
                    g.disarm();
                }
                if opts.verbose >= 1 {
                    out.line(&format!("{tname}: updated"));
                }
                Ok(Outcome::Updated(ucount))
            } else {
                drop(guard); // unlinks the unused temp
                if opts.verbose >= 1 {
                    out.line(&format!("{tname}: verified"));
                }
                Ok(Outcome::Verified)
            }
        }
        None if ucount > 0 => {
            if opts.verbose >= 1 {
                out.line(&format!("{tname}: incorrect"));
            }
            Ok(Outcome::Incorrect(ucount))
        }
        None => {
            if opts.verbose >= 1 {
                out.line(&format!("{tname}: verified"));
            }
            Ok(Outcome::Verified)
        }
    }
}

/// Object path in the parallel file tree: `<dir>/../file/<name>/<path>`.
fn target_path(tdir: &Path, tname: &str, decoded: &str) -> PathBuf {
    let mut p = tdir.join("..").join("file").join(tname);
    for part in decoded.split('/').filter(|s| !s.is_empty()) {
        p.push(part);
    }
    p
}

/// A repaired record keeps its own columns and the transcript's encoded
/// path. An untracked checksum (`-`) means the caller only ever recorded
/// mtime-based tracking, so the transcript's mtime survives; otherwise
/// the on-disk mtime replaces it.
fn corrected_line(rec: &Record, meta: &record::Meta, fst: &fs::Metadata, cksum: &str) -> String {
    let mtime = if meta.cksum == "-" {
        meta.mtime.clone()
    } else {
        file_mtime(fst).to_string()
    };
    format!(
        "{} {:<37} {:>4} {:>5} {:>5} {:>9} {:>7} {}\n",
        rec.kind,
        rec.epath,
        meta.mode,
        meta.owner,
        meta.group,
        mtime,
        fst.len(),
        cksum
    )
}

fn file_mtime(md: &fs::Metadata) -> i64 {
    md.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn io_ctx(path: &Path, e: io::Error) -> WaybillError {
    WaybillError::Io(io::Error::new(
        e.kind(),
        format!("{}: {e}", path.display()),
    ))
}
