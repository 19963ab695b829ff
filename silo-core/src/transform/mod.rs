use crate::error::Result;
use crate::meta::{CipherTag, HashAlgorithm};
use crate::signal::StopSignal;
use crate::transform::cipher::{CipherParams, CipherWriter};
use crate::transform::hashing::HashWriter;
use crate::transform::responsive::ResponsiveWriter;
use crate::transform::throttle::ThrottleWriter;
use std::io::Write;
use std::time::Duration;
use tracing::debug;

pub mod cipher;
pub mod hashing;
pub mod responsive;
pub mod throttle;

/// One link in a write chain. `finish` flushes whatever the stage still
/// buffers into the inner stage, records its status in the report, then
/// finishes the inner stage — so buffered tails (cipher padding above
/// all) always land before the sink is done with.
pub trait Stage: Write {
    fn finish(self: Box<Self>, report: &mut ChainReport) -> Result<()>;
}

impl<T: Stage + ?Sized> Stage for Box<T> {
    fn finish(self: Box<Self>, report: &mut ChainReport) -> Result<()> {
        (*self).finish(report)
    }
}

/// Aggregated status of every stage in a chain, filled in as the chain
/// closes. Which fields are set depends on which stages were configured.
#[derive(Debug, Clone, Default)]
pub struct ChainReport {
    /// Bytes that reached the tail sink.
    pub written: u64,
    pub elapsed: Duration,
    /// Achieved average throughput, bytes/sec.
    pub rate_bps: Option<f64>,
    pub hash_algorithm: Option<HashAlgorithm>,
    /// Lowercase hex digest of the bytes the hashing stage saw.
    pub digest: Option<String>,
    pub cipher: Option<CipherTag>,
}

/// What the write-chain builder assembles from.
#[derive(Clone, Default)]
pub struct ChainConfig {
    /// Maximum sustained bytes/sec; `None` means unthrottled.
    pub rate_limit: Option<u64>,
    pub hash: HashAlgorithm,
    pub cipher: Option<CipherParams>,
    pub stop: Option<StopSignal>,
}

/// Counting terminal stage wrapping the raw sink.
struct TailSink<W> {
    inner: W,
    n: u64,
}

impl<W: Write> Write for TailSink<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let k = self.inner.write(buf)?;
        self.n += k as u64;
        Ok(k)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Stage for TailSink<W> {
    fn finish(self: Box<Self>, report: &mut ChainReport) -> Result<()> {
        let mut this = *self;
        this.inner.flush()?;
        report.written = this.n;
        Ok(())
    }
}

/// An assembled write-side chain. The orchestrator writes at the head;
/// bytes pass responsive/cipher/hashing/throttle stages on the way down
/// to the sink.
pub struct WriteChain<'a> {
    head: Box<dyn Stage + 'a>,
}

impl WriteChain<'_> {
    /// Close every stage head-first and collect their statuses.
    pub fn finish(self) -> Result<ChainReport> {
        let mut report = ChainReport::default();
        self.head.finish(&mut report)?;
        Ok(report)
    }
}

impl Write for WriteChain<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.head.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.head.flush()
    }
}

/// Assemble the write chain over `sink` from the configuration. The
/// stage set is fixed; options only decide which optional stages wrap
/// the mandatory hashing/throttle/tail core.
pub fn build_write_chain<'a, W: Write + 'a>(sink: W, cfg: &ChainConfig) -> WriteChain<'a> {
    debug!(
        rate_limit = ?cfg.rate_limit,
        hash = cfg.hash.as_str(),
        ciphered = cfg.cipher.is_some(),
        responsive = cfg.stop.is_some(),
        "assembling write chain"
    );
    let tail = TailSink { inner: sink, n: 0 };
    let throttled = ThrottleWriter::new(tail, cfg.rate_limit);
    let hashed = HashWriter::new(throttled, cfg.hash);
    let mut head: Box<dyn Stage + 'a> = match &cfg.cipher {
        Some(params) => Box::new(CipherWriter::new(hashed, params)),
        None => Box::new(hashed),
    };
    if let Some(stop) = &cfg.stop {
        head = Box::new(ResponsiveWriter::new(head, stop.clone()));
    }
    WriteChain { head }
}
