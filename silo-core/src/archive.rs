use crate::container::patcher::ContainerPatcher;
use crate::error::{Result, SiloError};
use crate::meta::{CompressionMode, HashAlgorithm, MetaRecord};
use crate::signal::StopSignal;
use crate::transform::cipher::CipherParams;
use crate::transform::{ChainConfig, build_write_chain};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{info, warn};

const TOOL: &str = concat!("silo-core/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Default)]
pub struct ArchiveOptions {
    pub compression: CompressionMode,
    pub hash: HashAlgorithm,
    pub cipher: Option<CipherParams>,
    /// Maximum sustained bytes/sec for the write path; `None` means
    /// unthrottled.
    pub rate_limit: Option<u64>,
    pub stop: Option<StopSignal>,
}

#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub entry_name: String,
    /// Payload bytes as stored (post-cipher when one is configured).
    pub payload_len: u64,
    pub hash_algorithm: HashAlgorithm,
    pub digest: String,
    pub elapsed: Duration,
    pub rate_bps: Option<f64>,
}

/// Build an archive at `path`. `populate` streams the payload into the
/// write chain; whatever produces those bytes (a filesystem snapshot,
/// usually) is the caller's collaborator, not ours.
///
/// On any failure — I/O or cooperative termination — the file is removed
/// before the error is returned, so cancellation never leaves a partial
/// archive on disk.
pub fn archive<F>(path: &Path, opts: &ArchiveOptions, populate: F) -> Result<ArchiveSummary>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    match build(path, opts, populate) {
        Ok(summary) => {
            info!(
                path = %path.display(),
                payload_len = summary.payload_len,
                digest = %summary.digest,
                "archive complete"
            );
            Ok(summary)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "archive failed, removing file");
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
                Err(rm) => {
                    warn!(path = %path.display(), error = %rm, "could not remove partial archive")
                }
            }
            Err(e)
        }
    }
}

fn build<F>(path: &Path, opts: &ArchiveOptions, populate: F) -> Result<ArchiveSummary>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let entry_name = opts.compression.entry_name();

    let mut patcher = ContainerPatcher::create(path)?;
    patcher.reserve_entry(entry_name)?;

    let cfg = ChainConfig {
        rate_limit: opts.rate_limit,
        hash: opts.hash,
        cipher: opts.cipher.clone(),
        stop: opts.stop.clone(),
    };
    let mut chain = build_write_chain(&mut patcher, &cfg);
    populate(&mut chain)?;
    chain.flush()?;
    let report = chain.finish()?;

    let pad = patcher.padding(report.written);
    patcher.write_all(&pad)?;

    let digest = report
        .digest
        .clone()
        .ok_or_else(|| SiloError::Format("write chain closed without a digest".into()))?;
    let meta = MetaRecord {
        inside_entry_name: entry_name.to_string(),
        hash_algorithm: opts.hash,
        hash_value: digest.clone(),
        cipher: report.cipher.clone(),
        compression: Some(opts.compression),
        created: OffsetDateTime::now_utc().unix_timestamp(),
        tool: TOOL.to_string(),
    };
    patcher.patch(report.written, &meta)?;

    Ok(ArchiveSummary {
        entry_name: entry_name.to_string(),
        payload_len: report.written,
        hash_algorithm: opts.hash,
        digest,
        elapsed: report.elapsed,
        rate_bps: report.rate_bps,
    })
}
