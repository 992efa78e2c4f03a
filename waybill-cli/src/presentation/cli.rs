use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "transcript integrity and retrieval client", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Verify transcript checksums against the file tree, repairing the
    /// transcript in place when anything drifted
    Verify {
        transcript: PathBuf,

        /// Checksum algorithm (sha1 or sha256)
        #[arg(short = 'c', long = "checksum", default_value = "sha1")]
        checksum: String,

        /// Only reconcile records whose path starts with this prefix
        #[arg(short = 'P', long)]
        prefix: Option<String>,

        /// Report differences without rewriting the transcript
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Compare transcript ordering case-insensitively
        #[arg(short = 'I', long)]
        case_insensitive: bool,

        /// Suppress per-change status lines
        #[arg(short = 'q', long, conflicts_with = "verbose")]
        quiet: bool,

        /// Repeat for percent progress
        #[arg(short = 'v', long, action = ArgAction::Count)]
        verbose: u8,
    },

    /// Download one path from a retrieval server
    Fetch {
        /// Server address, host:port
        server: String,

        /// Path description sent on the wire
        pathdesc: String,

        /// Destination file
        dest: PathBuf,

        /// Expected payload size from the transcript; 0 disables the check
        #[arg(long, default_value_t = 0)]
        size: u64,

        /// Expected checksum, base64; verification is skipped when absent
        #[arg(long)]
        cksum: Option<String>,

        /// Checksum algorithm (sha1 or sha256)
        #[arg(short = 'c', long = "checksum", default_value = "sha1")]
        checksum: String,

        /// Decode the payload as an AppleSingle container
        #[arg(long)]
        applefile: bool,

        /// Network read timeout in seconds
        #[arg(long, default_value_t = 120)]
        timeout: u64,

        /// Print a progress dot per chunk
        #[arg(long)]
        dots: bool,

        /// Trace the protocol conversation
        #[arg(short = 'v', long, action = ArgAction::Count)]
        verbose: u8,
    },
}
