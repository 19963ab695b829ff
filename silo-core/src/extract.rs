use crate::container::catalog::{self, EntryInfo};
use crate::error::{Result, SiloError};
use crate::meta::{META_ENTRY_NAME, MetaRecord};
use crate::signal::StopSignal;
use crate::transform::cipher::{CipherParams, CipherReader};
use crate::transform::responsive::ResponsiveReader;
use crate::transform::throttle::ThrottleReader;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

#[derive(Clone, Default)]
pub struct ExtractOptions {
    /// Maximum sustained bytes/sec for this stream; `None` means
    /// unthrottled.
    pub rate_limit: Option<u64>,
    pub stop: Option<StopSignal>,
    /// Decrypt while reading. Key material is supplied by the caller;
    /// the container itself never holds it.
    pub cipher: Option<CipherParams>,
}

/// Read-only view over a container file and its catalog. Opening never
/// mutates the file; neither does anything else here.
pub struct OpenedArchive {
    file: File,
    entries: Vec<EntryInfo>,
}

impl OpenedArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let entries = catalog::scan(&mut file)?;
        debug!(path = %path.display(), entries = entries.len(), "opened container");
        Ok(Self { file, entries })
    }

    pub fn entries(&self) -> &[EntryInfo] {
        &self.entries
    }

    fn find(&self, name: &str) -> Result<EntryInfo> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| SiloError::EntryNotFound(name.to_string()))
    }

    /// Bounded stream over exactly one entry's byte range. Other entries
    /// are never read or buffered, whatever their size.
    pub fn open_entry(&mut self, name: &str, opts: &ExtractOptions) -> Result<EntryStream<'_>> {
        let info = self.find(name)?;
        self.file.seek(SeekFrom::Start(info.data_off))?;
        let raw = (&mut self.file).take(info.size);

        let mut reader: Box<dyn Read + '_> = Box::new(raw);
        if opts.rate_limit.is_some() {
            reader = Box::new(ThrottleReader::new(reader, opts.rate_limit));
        }
        if let Some(params) = &opts.cipher {
            reader = Box::new(CipherReader::new(reader, params));
        }
        if let Some(stop) = &opts.stop {
            reader = Box::new(ResponsiveReader::new(reader, stop.clone()));
        }
        Ok(EntryStream {
            reader,
            stored_len: info.size,
        })
    }

    pub fn open_meta(&mut self) -> Result<EntryStream<'_>> {
        self.open_entry(META_ENTRY_NAME, &ExtractOptions::default())
    }

    /// Read and parse the meta entry. It is small by construction, so it
    /// is loaded whole.
    pub fn read_meta(&mut self) -> Result<MetaRecord> {
        let mut stream = self.open_meta()?;
        let mut buf = Vec::with_capacity(stream.stored_len() as usize);
        stream.read_to_end(&mut buf)?;
        MetaRecord::from_cbor(&buf)
    }
}

/// Stream scoped to one entry's byte range.
pub struct EntryStream<'a> {
    reader: Box<dyn Read + 'a>,
    stored_len: u64,
}

impl std::fmt::Debug for EntryStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStream")
            .field("stored_len", &self.stored_len)
            .finish_non_exhaustive()
    }
}

impl EntryStream<'_> {
    /// Length of the entry as stored in the container. With a decrypt
    /// stage configured the stream yields fewer bytes than this (frame
    /// tags are stripped).
    pub fn stored_len(&self) -> u64 {
        self.stored_len
    }
}

impl Read for EntryStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}
