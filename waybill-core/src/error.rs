use thiserror::Error;

/// Exit codes shared by the command-line tools.
pub const EXIT_OK: u8 = 0;
pub const EXIT_CHANGED: u8 = 1;
pub const EXIT_FATAL: u8 = 2;

#[derive(Error, Debug)]
pub enum WaybillError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed transcript: bad field count, bad sort order, bad line.
    /// Always aborts the whole run without touching the original file.
    #[error("line {line}: {msg}")]
    Structural { line: u64, msg: String },

    /// Checksum or size disagreement that cannot be repaired in place.
    #[error("{0}")]
    Integrity(String),

    /// Unexpected response on the wire.
    #[error("{0}")]
    Protocol(String),

    #[error(transparent)]
    Container(#[from] crate::applefile::ContainerError),
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, WaybillError>;
