use crate::error::Result;
use crate::transform::{ChainReport, Stage};
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// Delay bookkeeping shared by the write and read adapters. Sleeps the
/// calling thread just long enough that the cumulative byte count never
/// runs ahead of the configured rate; nothing is buffered or reordered.
struct Pacer {
    limit: Option<u64>,
    started: Instant,
    moved: u64,
}

impl Pacer {
    fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            started: Instant::now(),
            moved: 0,
        }
    }

    fn pace(&mut self, n: usize) {
        self.moved += n as u64;
        // A zero limit would mean "never"; treat it like no limit.
        let Some(limit) = self.limit.filter(|l| *l > 0) else {
            return;
        };
        let due = Duration::from_secs_f64(self.moved as f64 / limit as f64);
        let elapsed = self.started.elapsed();
        if due > elapsed {
            std::thread::sleep(due - elapsed);
        }
    }

    fn measured(&self) -> (u64, Duration) {
        (self.moved, self.started.elapsed())
    }
}

pub struct ThrottleWriter<W> {
    inner: W,
    pacer: Pacer,
}

impl<W: Write> ThrottleWriter<W> {
    pub fn new(inner: W, limit: Option<u64>) -> Self {
        Self {
            inner,
            pacer: Pacer::new(limit),
        }
    }
}

impl<W: Write> Write for ThrottleWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.pacer.pace(n);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Stage> Stage for ThrottleWriter<W> {
    fn finish(self: Box<Self>, report: &mut ChainReport) -> Result<()> {
        let this = *self;
        let (moved, elapsed) = this.pacer.measured();
        report.elapsed = elapsed;
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            report.rate_bps = Some(moved as f64 / secs);
        }
        Box::new(this.inner).finish(report)
    }
}

pub struct ThrottleReader<R> {
    inner: R,
    pacer: Pacer,
}

impl<R: Read> ThrottleReader<R> {
    pub fn new(inner: R, limit: Option<u64>) -> Self {
        Self {
            inner,
            pacer: Pacer::new(limit),
        }
    }

    /// Bytes moved so far and time since construction.
    pub fn measured(&self) -> (u64, Duration) {
        self.pacer.measured()
    }
}

impl<R: Read> Read for ThrottleReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.pacer.pace(n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unthrottled_is_passthrough() {
        let mut sink = Vec::new();
        let mut w = ThrottleWriter::new(&mut sink, None);
        let started = Instant::now();
        w.write_all(&[0u8; 1 << 20]).unwrap();
        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(sink.len(), 1 << 20);
    }

    #[test]
    fn write_rate_is_bounded() {
        // 4 KiB at 16 KiB/s must take at least ~250 ms.
        let mut sink = Vec::new();
        let mut w = ThrottleWriter::new(&mut sink, Some(16 * 1024));
        let started = Instant::now();
        for _ in 0..4 {
            w.write_all(&[0u8; 1024]).unwrap();
        }
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn read_rate_is_bounded() {
        let data = vec![0u8; 4096];
        let mut r = ThrottleReader::new(&data[..], Some(16 * 1024));
        let started = Instant::now();
        std::io::copy(&mut r, &mut std::io::sink()).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(200));
        let (moved, _) = r.measured();
        assert_eq!(moved, 4096);
    }
}
