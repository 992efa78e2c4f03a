use std::fs;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use waybill_core::cksum::Algorithm;
use waybill_core::error::{EXIT_CHANGED, EXIT_FATAL, EXIT_OK};
use waybill_core::report::{Console, Quiet, Report};
use waybill_core::{FetchContext, Outcome, VerifyOptions, verify_transcript};
use waybill_core::wire::net::LineStream;

pub fn handle_verify(
    transcript: PathBuf,
    checksum: String,
    prefix: Option<String>,
    dry_run: bool,
    case_insensitive: bool,
    quiet: bool,
    verbose: u8,
) -> u8 {
    let algorithm = match checksum.parse::<Algorithm>() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("waybill: {e}");
            return EXIT_FATAL;
        }
    };
    let opts = VerifyOptions {
        algorithm,
        prefix,
        update: !dry_run,
        verbose: if quiet { 0 } else { 1 + verbose.min(1) },
        case_insensitive,
    };
    let mut sink: Box<dyn Report> = if quiet {
        Box::new(Quiet)
    } else {
        Box::new(Console)
    };

    match verify_transcript(&transcript, &opts, sink.as_mut()) {
        Ok(Outcome::Verified) => EXIT_OK,
        Ok(Outcome::Updated(n)) => {
            tracing::info!(changes = n, "transcript rewritten");
            EXIT_CHANGED
        }
        Ok(Outcome::Incorrect(n)) => {
            tracing::info!(changes = n, "transcript has differences");
            EXIT_CHANGED
        }
        Err(e) => {
            eprintln!("waybill: {}: {e}", transcript.display());
            EXIT_FATAL
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn handle_fetch(
    server: String,
    pathdesc: String,
    dest: PathBuf,
    size: u64,
    cksum: Option<String>,
    checksum: String,
    applefile: bool,
    timeout: u64,
    dots: bool,
    verbose: u8,
) -> u8 {
    let outcome = fetch(
        &server, &pathdesc, &dest, size, cksum, &checksum, applefile, timeout, dots, verbose,
    );
    match outcome {
        Ok(()) => EXIT_OK,
        Err(e) => {
            eprintln!("waybill: {}: {e}", dest.display());
            EXIT_FATAL
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn fetch(
    server: &str,
    pathdesc: &str,
    dest: &Path,
    size: u64,
    cksum: Option<String>,
    checksum: &str,
    applefile: bool,
    timeout: u64,
    dots: bool,
    verbose: u8,
) -> waybill_core::Result<()> {
    let algorithm = checksum.parse::<Algorithm>()?;
    let stream = TcpStream::connect(server)?;
    let net = LineStream::new(stream, Some(Duration::from_secs(timeout)))?;

    let mut ctx = FetchContext::new(net, algorithm);
    ctx.verify = cksum.is_some();
    ctx.verbose = verbose > 0;
    ctx.dots = dots;
    let expected = cksum.as_deref().unwrap_or("-");

    let mut sink = Console;
    let result = if applefile {
        ctx.retrieve_applefile(&mut sink, pathdesc, dest, size, expected)?
    } else {
        ctx.retrieve(&mut sink, pathdesc, dest, size, expected)?
    };

    // move the temps into place, resource fork first
    if let Some(rsrc) = &result.rsrc_path {
        let rdest = PathBuf::from(format!("{}.rsrc", dest.display()));
        fs::rename(rsrc, &rdest)?;
    }
    if result.finder_info.is_some() {
        tracing::debug!(dest = %dest.display(), "finder info received but not applied");
    }
    fs::rename(&result.data_path, dest)?;
    Ok(())
}
