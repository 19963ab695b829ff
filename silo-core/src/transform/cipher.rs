use crate::error::{Result, SiloError};
use crate::meta::CipherTag;
use crate::transform::{ChainReport, Stage};
use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use std::io::{Read, Write};

/// Plaintext bytes sealed per frame. Each stored frame is this much
/// plaintext plus the 16-byte tag; the final frame may be shorter.
pub const FRAME_LEN: usize = 64 * 1024;
pub const TAG_LEN: usize = 16;

/// Externally supplied key material. The pipeline never derives or
/// stores keys; the meta record carries only the salt and frame length.
#[derive(Clone)]
pub struct CipherParams {
    pub key: [u8; 32],
    pub salt: [u8; 32],
}

/// Frame nonce: blake3(salt || frame counter), truncated to the 24 bytes
/// XChaCha20 wants. The counter keeps nonces unique per frame under one
/// salt.
fn frame_nonce(salt: &[u8; 32], counter: u64) -> XNonce {
    let mut h = blake3::Hasher::new();
    h.update(salt);
    h.update(&counter.to_le_bytes());
    let out = h.finalize();
    XNonce::from_slice(&out.as_bytes()[..24]).to_owned()
}

fn seal_frame(
    aead: &XChaCha20Poly1305,
    salt: &[u8; 32],
    counter: u64,
    plain: &[u8],
) -> Result<Vec<u8>> {
    aead.encrypt(&frame_nonce(salt, counter), plain)
        .map_err(|e| SiloError::Cipher(format!("seal frame {counter}: {e}")))
}

fn open_frame(
    aead: &XChaCha20Poly1305,
    salt: &[u8; 32],
    counter: u64,
    sealed: &[u8],
) -> Result<Vec<u8>> {
    aead.decrypt(&frame_nonce(salt, counter), sealed)
        .map_err(|e| SiloError::Cipher(format!("open frame {counter}: {e}")))
}

/// Write-path cipher stage. Buffers plaintext across `write` calls until
/// a full frame accumulates, seals it, and passes the ciphertext down.
/// The final short frame is sealed when the stage is finished, so close
/// order matters — the chain finishes head-first for exactly this.
pub struct CipherWriter<W> {
    inner: W,
    aead: XChaCha20Poly1305,
    salt: [u8; 32],
    pending: Vec<u8>,
    counter: u64,
}

impl<W: Write> CipherWriter<W> {
    pub fn new(inner: W, params: &CipherParams) -> Self {
        Self {
            inner,
            aead: XChaCha20Poly1305::new(Key::from_slice(&params.key)),
            salt: params.salt,
            pending: Vec::with_capacity(FRAME_LEN),
            counter: 0,
        }
    }

    fn seal_pending(&mut self) -> std::io::Result<()> {
        let frame = seal_frame(&self.aead, &self.salt, self.counter, &self.pending)
            .map_err(std::io::Error::other)?;
        self.inner.write_all(&frame)?;
        self.pending.clear();
        self.counter += 1;
        Ok(())
    }
}

impl<W: Write> Write for CipherWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut rest = buf;
        while !rest.is_empty() {
            let room = FRAME_LEN - self.pending.len();
            let take = room.min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.pending.len() == FRAME_LEN {
                self.seal_pending()?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        // A partial frame cannot be flushed mid-stream without breaking
        // the framing; only the inner stage is flushed here.
        self.inner.flush()
    }
}

impl<W: Stage> Stage for CipherWriter<W> {
    fn finish(self: Box<Self>, report: &mut ChainReport) -> Result<()> {
        let mut this = *self;
        if !this.pending.is_empty() {
            this.seal_pending()?;
        }
        report.cipher = Some(CipherTag {
            salt_hex: hex::encode(this.salt),
            frame_len: FRAME_LEN as u32,
        });
        Box::new(this.inner).finish(report)
    }
}

/// Read-path twin: consumes sealed frames from the inner reader and
/// serves the recovered plaintext. The inner reader must be bounded to
/// the entry's byte range so EOF delimits the final short frame.
pub struct CipherReader<R> {
    inner: R,
    aead: XChaCha20Poly1305,
    salt: [u8; 32],
    plain: Vec<u8>,
    pos: usize,
    counter: u64,
    done: bool,
}

impl<R: Read> CipherReader<R> {
    pub fn new(inner: R, params: &CipherParams) -> Self {
        Self {
            inner,
            aead: XChaCha20Poly1305::new(Key::from_slice(&params.key)),
            salt: params.salt,
            plain: Vec::new(),
            pos: 0,
            counter: 0,
            done: false,
        }
    }

    fn load_next(&mut self) -> std::io::Result<bool> {
        let mut frame = vec![0u8; FRAME_LEN + TAG_LEN];
        let mut got = 0;
        while got < frame.len() {
            let n = self.inner.read(&mut frame[got..])?;
            if n == 0 {
                break;
            }
            got += n;
        }
        if got == 0 {
            self.done = true;
            return Ok(false);
        }
        if got <= TAG_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "truncated cipher frame",
            ));
        }
        frame.truncate(got);
        let plain = open_frame(&self.aead, &self.salt, self.counter, &frame)
            .map_err(std::io::Error::other)?;
        self.counter += 1;
        self.plain = plain;
        self.pos = 0;
        Ok(true)
    }
}

impl<R: Read> Read for CipherReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            if self.pos < self.plain.len() {
                let n = (self.plain.len() - self.pos).min(buf.len());
                buf[..n].copy_from_slice(&self.plain[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.done || !self.load_next()? {
                return Ok(0);
            }
        }
    }
}
