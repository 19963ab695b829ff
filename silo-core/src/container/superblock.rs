use crate::error::{Result, SiloError};
use std::io::{Read, Write};

pub const SUPER_MAGIC: &[u8; 8] = b"SILOBOX\0";
pub const VERSION: u16 = 1;
/// magic (8) + version (2) + reserved (6)
pub const SUPER_LEN: u64 = 16;

#[derive(Debug, Clone, Copy)]
pub struct Superblock {
    pub version: u16,
}

impl Superblock {
    pub fn current() -> Self {
        Self { version: VERSION }
    }

    pub fn write_to(&self, mut w: impl Write) -> std::io::Result<()> {
        w.write_all(SUPER_MAGIC)?;
        w.write_all(&self.version.to_le_bytes())?;
        w.write_all(&[0u8; 6])?;
        Ok(())
    }

    pub fn read_from(mut r: impl Read) -> Result<Self> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != SUPER_MAGIC {
            return Err(SiloError::Format("not a silo container".into()));
        }
        let mut v = [0u8; 2];
        r.read_exact(&mut v)?;
        let version = u16::from_le_bytes(v);
        if version > VERSION {
            return Err(SiloError::Format(format!(
                "unsupported container version {version}"
            )));
        }
        let mut reserved = [0u8; 6];
        r.read_exact(&mut reserved)?;
        Ok(Self { version })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut buf = Vec::new();
        Superblock::current().write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, SUPER_LEN);
        let sb = Superblock::read_from(&buf[..]).unwrap();
        assert_eq!(sb.version, VERSION);
    }

    #[test]
    fn rejects_foreign_magic() {
        let mut buf = Vec::new();
        Superblock::current().write_to(&mut buf).unwrap();
        buf[0] = b'X';
        assert!(Superblock::read_from(&buf[..]).is_err());
    }
}
