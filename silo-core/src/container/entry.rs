use crate::error::{Result, SiloError};
use std::io::{Read, Write};

pub const ENTRY_MAGIC: &[u8; 8] = b"SILOENT\0";
/// magic (8) + size (8) + checksum (32) + name_len (2) + name (78)
pub const HEADER_LEN: u64 = 128;
pub const NAME_MAX: usize = 78;
/// Entries are padded with zeros up to the next block boundary.
pub const BLOCK_LEN: u64 = 512;
/// Size written at reserve time. A finished container never carries it;
/// a reader that sees it is looking at an interrupted write.
pub const SIZE_PLACEHOLDER: u64 = u64::MAX;

#[derive(Debug, Clone)]
pub struct EntryHeader {
    pub name: String,
    pub size: u64,
    /// Digest of the payload bytes as stored. All zeros until patched.
    pub checksum: [u8; 32],
}

impl EntryHeader {
    pub fn new(name: &str, size: u64) -> Result<Self> {
        if name.is_empty() || name.len() > NAME_MAX {
            return Err(SiloError::Format(format!(
                "entry name length {} out of range 1..={NAME_MAX}",
                name.len()
            )));
        }
        Ok(Self {
            name: name.to_string(),
            size,
            checksum: [0u8; 32],
        })
    }

    pub fn is_placeholder(&self) -> bool {
        self.size == SIZE_PLACEHOLDER
    }

    pub fn write_to(&self, mut w: impl Write) -> std::io::Result<()> {
        let mut name_buf = [0u8; NAME_MAX];
        name_buf[..self.name.len()].copy_from_slice(self.name.as_bytes());
        w.write_all(ENTRY_MAGIC)?;
        w.write_all(&self.size.to_le_bytes())?;
        w.write_all(&self.checksum)?;
        w.write_all(&(self.name.len() as u16).to_le_bytes())?;
        w.write_all(&name_buf)?;
        Ok(())
    }

    pub fn read_from(mut r: impl Read) -> Result<Self> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != ENTRY_MAGIC {
            return Err(SiloError::Format("bad entry magic".into()));
        }
        let mut b8 = [0u8; 8];
        r.read_exact(&mut b8)?;
        let size = u64::from_le_bytes(b8);
        let mut checksum = [0u8; 32];
        r.read_exact(&mut checksum)?;
        let mut b2 = [0u8; 2];
        r.read_exact(&mut b2)?;
        let name_len = u16::from_le_bytes(b2) as usize;
        let mut name_buf = [0u8; NAME_MAX];
        r.read_exact(&mut name_buf)?;
        if name_len > NAME_MAX {
            return Err(SiloError::Format(format!(
                "entry name length {name_len} out of range"
            )));
        }
        let name = std::str::from_utf8(&name_buf[..name_len])
            .map_err(|_| SiloError::Format("entry name is not UTF-8".into()))?
            .to_string();
        Ok(Self {
            name,
            size,
            checksum,
        })
    }
}

/// Zero padding needed after `written` payload bytes to reach the next
/// block boundary.
pub fn padding(written: u64) -> usize {
    ((BLOCK_LEN - written % BLOCK_LEN) % BLOCK_LEN) as usize
}
