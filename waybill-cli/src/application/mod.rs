pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

pub fn run() -> ExitCode {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("waybill=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Verify {
            transcript,
            checksum,
            prefix,
            dry_run,
            case_insensitive,
            quiet,
            verbose,
        } => handlers::handle_verify(
            transcript,
            checksum,
            prefix,
            dry_run,
            case_insensitive,
            quiet,
            verbose,
        ),
        Commands::Fetch {
            server,
            pathdesc,
            dest,
            size,
            cksum,
            checksum,
            applefile,
            timeout,
            dots,
            verbose,
        } => handlers::handle_fetch(
            server,
            pathdesc,
            dest,
            size,
            cksum,
            checksum,
            applefile,
            timeout,
            dots,
            verbose,
        ),
    };
    ExitCode::from(code)
}
