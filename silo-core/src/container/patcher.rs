use crate::container::entry::{self, EntryHeader, SIZE_PLACEHOLDER};
use crate::container::superblock::Superblock;
use crate::error::{Result, SiloError};
use crate::meta::{META_ENTRY_NAME, MetaRecord};
use crate::util::hexs::parse_hex_array;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// Write-side raw file layer. Reserves a header region for one payload
/// entry, accepts streaming appends right after it without knowing the
/// final size, and later rewrites that header in place once the size and
/// digest are known. The patcher is the tail sink of the write chain and
/// applies no transform of its own.
pub struct ContainerPatcher {
    file: File,
    reserved: Option<Reservation>,
}

struct Reservation {
    name: String,
    header_off: u64,
}

impl ContainerPatcher {
    /// Create (or truncate) the container file and write the superblock.
    pub fn create(path: &Path) -> Result<Self> {
        let mut file = File::create(path)?;
        Superblock::current().write_to(&mut file)?;
        Ok(Self {
            file,
            reserved: None,
        })
    }

    /// Write a placeholder header for `name` at the current end of file
    /// and remember where it went. Payload bytes follow immediately via
    /// the `Write` impl. Only one reservation may be outstanding.
    pub fn reserve_entry(&mut self, name: &str) -> Result<()> {
        if self.reserved.is_some() {
            return Err(SiloError::Format(
                "an entry reservation is already pending".into(),
            ));
        }
        let header_off = self.file.seek(SeekFrom::End(0))?;
        EntryHeader::new(name, SIZE_PLACEHOLDER)?.write_to(&mut self.file)?;
        debug!(name, header_off, "reserved payload entry");
        self.reserved = Some(Reservation {
            name: name.to_string(),
            header_off,
        });
        Ok(())
    }

    /// Trailing zeros the caller must write after the chain has closed,
    /// aligning the payload entry to the container block size.
    pub fn padding(&self, written: u64) -> Vec<u8> {
        vec![0u8; entry::padding(written)]
    }

    /// Seek back to the reserved header and rewrite it with the true
    /// payload length and the digest from `meta`, leaving the payload
    /// bytes untouched, then append the meta entry at end of file.
    pub fn patch(&mut self, payload_len: u64, meta: &MetaRecord) -> Result<()> {
        let res = self.reserved.take().ok_or_else(|| {
            SiloError::Format("patch without a pending reservation".into())
        })?;
        let checksum: [u8; 32] = parse_hex_array(&meta.hash_value)?;

        self.file.seek(SeekFrom::Start(res.header_off))?;
        let mut header = EntryHeader::new(&res.name, payload_len)?;
        header.checksum = checksum;
        header.write_to(&mut self.file)?;
        debug!(
            name = %res.name,
            header_off = res.header_off,
            payload_len,
            "patched payload header"
        );

        // The meta entry is small and fully known, so it is buffered and
        // appended as an ordinary record.
        let body = meta.to_cbor()?;
        self.file.seek(SeekFrom::End(0))?;
        let mut meta_header = EntryHeader::new(META_ENTRY_NAME, body.len() as u64)?;
        meta_header.checksum = *blake3::hash(&body).as_bytes();
        meta_header.write_to(&mut self.file)?;
        self.file.write_all(&body)?;
        let pad = entry::padding(body.len() as u64);
        if pad > 0 {
            self.file.write_all(&vec![0u8; pad])?;
        }
        self.file.flush()?;
        Ok(())
    }
}

impl Write for ContainerPatcher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::catalog;
    use crate::meta::HashAlgorithm;

    fn meta_for(payload: &[u8]) -> MetaRecord {
        MetaRecord {
            inside_entry_name: "payload.tar".into(),
            hash_algorithm: HashAlgorithm::Blake3,
            hash_value: blake3::hash(payload).to_hex().to_string(),
            cipher: None,
            compression: None,
            created: 0,
            tool: "test".into(),
        }
    }

    #[test]
    fn reserve_stream_patch_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.silo");
        let payload = b"hello container".as_slice();

        let mut p = ContainerPatcher::create(&path).unwrap();
        p.reserve_entry("payload.tar").unwrap();
        p.write_all(payload).unwrap();
        let pad = p.padding(payload.len() as u64);
        p.write_all(&pad).unwrap();
        p.patch(payload.len() as u64, &meta_for(payload)).unwrap();
        drop(p);

        let mut f = File::open(&path).unwrap();
        let entries = catalog::scan(&mut f).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "payload.tar");
        assert_eq!(entries[0].size, payload.len() as u64);
        assert_eq!(entries[1].name, META_ENTRY_NAME);
    }

    #[test]
    fn patch_leaves_payload_bytes_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.silo");
        let payload: Vec<u8> = (0u16..2000).map(|i| (i % 251) as u8).collect();

        let mut p = ContainerPatcher::create(&path).unwrap();
        p.reserve_entry("payload.tar").unwrap();
        p.write_all(&payload).unwrap();
        let pad = p.padding(payload.len() as u64);
        p.write_all(&pad).unwrap();
        p.flush().unwrap();

        let before = std::fs::read(&path).unwrap();
        p.patch(payload.len() as u64, &meta_for(&payload)).unwrap();
        drop(p);
        let after = std::fs::read(&path).unwrap();

        // Only the header region changed; the payload region is bytewise
        // identical (the meta entry is appended past the old EOF).
        let data_start = (crate::container::superblock::SUPER_LEN
            + crate::container::entry::HEADER_LEN) as usize;
        let data_end = data_start + payload.len();
        assert_eq!(&before[data_start..data_end], &after[data_start..data_end]);
        assert_eq!(&after[data_start..data_end], &payload[..]);
    }

    #[test]
    fn unpatched_container_is_rejected_by_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.silo");

        let mut p = ContainerPatcher::create(&path).unwrap();
        p.reserve_entry("payload.tar").unwrap();
        p.write_all(b"some bytes").unwrap();
        p.flush().unwrap();
        drop(p);

        let mut f = File::open(&path).unwrap();
        assert!(matches!(
            catalog::scan(&mut f),
            Err(SiloError::Format(_))
        ));
    }

    #[test]
    fn double_reserve_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = ContainerPatcher::create(&dir.path().join("a.silo")).unwrap();
        p.reserve_entry("payload.tar").unwrap();
        assert!(p.reserve_entry("other").is_err());
    }

    #[test]
    fn patch_without_reserve_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = ContainerPatcher::create(&dir.path().join("a.silo")).unwrap();
        assert!(p.patch(0, &meta_for(b"")).is_err());
    }
}
