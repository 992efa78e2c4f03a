#![forbid(unsafe_code)]

pub mod applefile;
pub mod cksum;
pub mod error;
pub mod pathcmp;
pub mod report;

pub mod util {
    pub mod code;
    pub(crate) mod guard;
    pub mod tokenize;
}

pub mod transcript {
    pub mod record;
    pub mod verify;
}

pub mod wire {
    pub mod net;
    pub mod retr;
}

// Re-exports: stable API surface
pub use cksum::Algorithm;
pub use error::{Result, WaybillError};
pub use transcript::verify::{Outcome, VerifyOptions, verify_transcript};
pub use wire::retr::{FetchContext, FetchResult};
