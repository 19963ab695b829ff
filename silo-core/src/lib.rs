//! Streaming backup-archive pipeline: write a container whose payload
//! size is unknown until all bytes have streamed through a chain of
//! transforms (throttling, hashing, optional cipher, cooperative stop),
//! then patch the reserved header in place once the true size and digest
//! are known. The read path extracts one bounded entry or re-verifies
//! the stored digest without loading the container into memory.

#![forbid(unsafe_code)]

pub mod error;
pub mod meta;
pub mod signal;

pub mod util {
    pub mod hexs;
}

pub mod container {
    pub mod catalog;
    pub mod entry;
    pub mod patcher;
    pub mod superblock;
}

pub mod transform;

pub mod archive;
pub mod check;
pub mod extract;

// Re-exports: stable API surface
pub use archive::{ArchiveOptions, ArchiveSummary, archive};
pub use check::{CheckOptions, CheckReport, check_archive};
pub use error::{Result, SiloError};
pub use extract::{EntryStream, ExtractOptions, OpenedArchive};
pub use meta::{CompressionMode, HashAlgorithm, META_ENTRY_NAME, MetaRecord};
pub use signal::StopSignal;
pub use transform::cipher::CipherParams;
