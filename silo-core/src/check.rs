use crate::error::Result;
use crate::extract::{ExtractOptions, OpenedArchive};
use crate::signal::StopSignal;
use crate::transform::hashing::HashReader;
use crate::transform::responsive::ResponsiveReader;
use crate::transform::throttle::ThrottleReader;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Clone, Default)]
pub struct CheckOptions {
    pub rate_limit: Option<u64>,
    pub stop: Option<StopSignal>,
}

/// Outcome of a verification pass. A digest mismatch is data, not an
/// error; `matches` simply comes back false with both values attached.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub matches: bool,
    pub expected: String,
    pub computed: String,
    /// Payload bytes read (as stored).
    pub bytes: u64,
    pub elapsed: Duration,
    pub rate_bps: Option<f64>,
}

/// Re-read the payload entry and compare its digest against the one in
/// the meta record. The stored digest covers the payload bytes exactly
/// as stored, so no key material is needed even for ciphered archives.
/// Pure read: no outcome mutates the file, termination included.
pub fn check_archive(path: &Path, opts: &CheckOptions) -> Result<CheckReport> {
    let mut archive = OpenedArchive::open(path)?;
    let meta = archive.read_meta()?;
    debug!(
        entry = %meta.inside_entry_name,
        algorithm = meta.hash_algorithm.as_str(),
        "checking payload digest"
    );

    let stream = archive.open_entry(&meta.inside_entry_name, &ExtractOptions::default())?;
    let mut source: Box<dyn Read + '_> = Box::new(stream);
    if let Some(stop) = &opts.stop {
        source = Box::new(ResponsiveReader::new(source, stop.clone()));
    }
    let throttled = ThrottleReader::new(source, opts.rate_limit);
    let mut hasher = HashReader::new(throttled, meta.hash_algorithm);

    // Drain into a discard sink; the digest is all that is kept.
    std::io::copy(&mut hasher, &mut std::io::sink())?;
    hasher.finalize();
    let computed = hasher.digest()?.to_string();
    let (bytes, elapsed) = hasher.into_inner().measured();

    let matches = computed.eq_ignore_ascii_case(&meta.hash_value);
    info!(matches, bytes, "archive check finished");

    let secs = elapsed.as_secs_f64();
    Ok(CheckReport {
        matches,
        expected: meta.hash_value,
        computed,
        bytes,
        elapsed,
        rate_bps: (secs > 0.0).then(|| bytes as f64 / secs),
    })
}
