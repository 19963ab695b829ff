use crate::error::{Result, SiloError};
use crate::meta::HashAlgorithm;
use crate::transform::{ChainReport, Stage};
use sha2::Digest as _;
use std::io::{Read, Write};

enum Hasher {
    Blake3(blake3::Hasher),
    Sha256(sha2::Sha256),
}

impl Hasher {
    fn new(alg: HashAlgorithm) -> Self {
        match alg {
            HashAlgorithm::Blake3 => Hasher::Blake3(blake3::Hasher::new()),
            HashAlgorithm::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Blake3(h) => {
                h.update(data);
            }
            Hasher::Sha256(h) => h.update(data),
        }
    }

    fn finalize(self) -> String {
        match self {
            Hasher::Blake3(h) => h.finalize().to_hex().to_string(),
            Hasher::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Feeds every byte passing through into an incremental digest. The
/// digest is only readable once the stage has been finished; asking
/// earlier is rejected rather than returning a partial value.
pub struct HashWriter<W> {
    inner: W,
    alg: HashAlgorithm,
    hasher: Option<Hasher>,
    digest: Option<String>,
}

impl<W> HashWriter<W> {
    pub fn new(inner: W, alg: HashAlgorithm) -> Self {
        Self {
            inner,
            alg,
            hasher: Some(Hasher::new(alg)),
            digest: None,
        }
    }

    /// Seal the digest. Idempotent.
    pub fn finalize(&mut self) {
        if let Some(h) = self.hasher.take() {
            self.digest = Some(h.finalize());
        }
    }

    /// Lowercase hex digest of everything written. `DigestPending` until
    /// `finalize` (or the chain's `finish`) has run.
    pub fn digest(&self) -> Result<&str> {
        self.digest.as_deref().ok_or(SiloError::DigestPending)
    }
}

impl<W: Write> Write for HashWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        if let Some(h) = self.hasher.as_mut() {
            h.update(&buf[..n]);
        }
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Stage> Stage for HashWriter<W> {
    fn finish(self: Box<Self>, report: &mut ChainReport) -> Result<()> {
        let mut this = *self;
        this.finalize();
        report.hash_algorithm = Some(this.alg);
        report.digest = this.digest.take();
        Box::new(this.inner).finish(report)
    }
}

/// Read-side twin: digests whatever is read through it.
pub struct HashReader<R> {
    inner: R,
    hasher: Option<Hasher>,
    digest: Option<String>,
}

impl<R> HashReader<R> {
    pub fn new(inner: R, alg: HashAlgorithm) -> Self {
        Self {
            inner,
            hasher: Some(Hasher::new(alg)),
            digest: None,
        }
    }

    pub fn finalize(&mut self) {
        if let Some(h) = self.hasher.take() {
            self.digest = Some(h.finalize());
        }
    }

    pub fn digest(&self) -> Result<&str> {
        self.digest.as_deref().ok_or(SiloError::DigestPending)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for HashReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if let Some(h) = self.hasher.as_mut() {
            h.update(&buf[..n]);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_before_finalize_is_rejected() {
        let mut w = HashWriter::new(Vec::new(), HashAlgorithm::Blake3);
        w.write_all(b"partial").unwrap();
        assert!(matches!(w.digest(), Err(SiloError::DigestPending)));
        w.finalize();
        assert!(w.digest().is_ok());
    }

    #[test]
    fn blake3_matches_reference() {
        let mut w = HashWriter::new(Vec::new(), HashAlgorithm::Blake3);
        w.write_all(b"the quick brown fox").unwrap();
        w.finalize();
        assert_eq!(
            w.digest().unwrap(),
            blake3::hash(b"the quick brown fox").to_hex().as_str()
        );
    }

    #[test]
    fn sha256_matches_reference() {
        let mut w = HashWriter::new(Vec::new(), HashAlgorithm::Sha256);
        w.write_all(b"abc").unwrap();
        w.finalize();
        // SHA-256("abc"), the classic test vector.
        assert_eq!(
            w.digest().unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn reader_digests_what_passes_through() {
        let data = b"stream me";
        let mut r = HashReader::new(&data[..], HashAlgorithm::Blake3);
        std::io::copy(&mut r, &mut std::io::sink()).unwrap();
        assert!(matches!(r.digest(), Err(SiloError::DigestPending)));
        r.finalize();
        assert_eq!(r.digest().unwrap(), blake3::hash(data).to_hex().as_str());
    }
}
