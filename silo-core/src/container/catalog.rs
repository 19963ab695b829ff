use crate::container::entry::{self, EntryHeader, HEADER_LEN};
use crate::container::superblock::{SUPER_LEN, Superblock};
use crate::error::{Result, SiloError};
use std::fs::File;
use std::io::{Seek, SeekFrom};

/// One catalog record: where an entry's payload lives inside the file.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub name: String,
    pub size: u64,
    pub checksum: [u8; 32],
    pub data_off: u64,
}

/// Walk the header sequence. Each record is header + size + padding, so
/// only header bytes are touched; payloads are skipped over.
pub fn scan(file: &mut File) -> Result<Vec<EntryInfo>> {
    let len = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;
    Superblock::read_from(&mut *file)?;

    let mut out = Vec::new();
    let mut off = SUPER_LEN;
    while off + HEADER_LEN <= len {
        file.seek(SeekFrom::Start(off))?;
        let header = EntryHeader::read_from(&mut *file)?;
        if header.is_placeholder() {
            return Err(SiloError::Format(format!(
                "unpatched entry '{}' at offset {off}",
                header.name
            )));
        }
        let data_off = off + HEADER_LEN;
        if data_off + header.size > len {
            return Err(SiloError::Format(format!(
                "entry '{}' runs past end of file",
                header.name
            )));
        }
        off = data_off + header.size + entry::padding(header.size) as u64;
        out.push(EntryInfo {
            name: header.name,
            size: header.size,
            checksum: header.checksum,
            data_off,
        });
    }
    Ok(out)
}
