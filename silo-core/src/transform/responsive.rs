use crate::error::{Result, SiloError};
use crate::signal::StopSignal;
use crate::transform::{ChainReport, Stage};
use std::io::{Read, Write};

/// Polls the stop signal before every write. If the signal is set the
/// I/O is not performed and a terminated error is raised; it travels
/// through the `io::Error` tunnel and comes out as `SiloError::Terminated`
/// at the orchestrator, distinct from any plain I/O failure.
pub struct ResponsiveWriter<W> {
    inner: W,
    stop: StopSignal,
}

impl<W: Write> ResponsiveWriter<W> {
    pub fn new(inner: W, stop: StopSignal) -> Self {
        Self { inner, stop }
    }
}

impl<W: Write> Write for ResponsiveWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.stop.is_set() {
            return Err(SiloError::terminated_io());
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Stage> Stage for ResponsiveWriter<W> {
    fn finish(self: Box<Self>, report: &mut ChainReport) -> Result<()> {
        // Closing still drains buffered stages below; the signal is only
        // consulted at chunk boundaries during streaming.
        let this = *self;
        Box::new(this.inner).finish(report)
    }
}

pub struct ResponsiveReader<R> {
    inner: R,
    stop: StopSignal,
}

impl<R: Read> ResponsiveReader<R> {
    pub fn new(inner: R, stop: StopSignal) -> Self {
        Self { inner, stop }
    }
}

impl<R: Read> Read for ResponsiveReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.stop.is_set() {
            return Err(SiloError::terminated_io());
        }
        self.inner.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_signal_aborts_before_the_write() {
        let stop = StopSignal::new();
        let mut sink = Vec::new();
        let mut w = ResponsiveWriter::new(&mut sink, stop.clone());
        w.write_all(b"before").unwrap();
        stop.set();
        let err = w.write_all(b"after").unwrap_err();
        assert!(matches!(SiloError::from(err), SiloError::Terminated));
        assert_eq!(sink, b"before");
    }

    #[test]
    fn set_signal_aborts_reads() {
        let stop = StopSignal::new();
        let data = vec![0u8; 64];
        let mut r = ResponsiveReader::new(&data[..], stop.clone());
        let mut buf = [0u8; 16];
        assert_eq!(r.read(&mut buf).unwrap(), 16);
        stop.set();
        let err = r.read(&mut buf).unwrap_err();
        assert!(matches!(SiloError::from(err), SiloError::Terminated));
    }
}
