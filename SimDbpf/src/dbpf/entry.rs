//! Index entries: one record inside one archive

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::compression;
use crate::error::{Error, Result};
use crate::exemplar::Exemplar;
use crate::file_types;
use crate::tgi::Tgi;

/// An archive on disk, shared by all of its entries.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ArchiveFile {
    path: PathBuf,
}

impl ArchiveFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether an entry's payload is QFS compressed.
///
/// Unknown until the first bytes of the payload have been inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    Unknown = 0,
    Compressed = 1,
    Uncompressed = 2,
}

impl Compression {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Compressed,
            2 => Self::Uncompressed,
            _ => Self::Unknown,
        }
    }
}

/// A decoded record.
#[derive(Debug, Clone)]
pub enum Record {
    /// Exemplar or cohort property bag.
    Exemplar(Arc<Exemplar>),
    /// Any type without a decoder, as decompressed bytes.
    Raw(Arc<[u8]>),
}

impl Record {
    #[must_use]
    pub fn as_exemplar(&self) -> Option<&Arc<Exemplar>> {
        match self {
            Record::Exemplar(exemplar) => Some(exemplar),
            Record::Raw(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct Payload {
    bytes: Option<Arc<[u8]>>,
    record: Option<Record>,
}

/// Descriptor of one record inside an archive.
///
/// The identity fields never change. The compression flag is filled in
/// lazily and the payload cache can be dropped with [`Entry::free`].
pub struct Entry {
    tgi: Tgi,
    offset: u32,
    size: u32,
    archive: Arc<ArchiveFile>,
    compression: AtomicU8,
    payload: Mutex<Payload>,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("tgi", &self.tgi)
            .field("offset", &self.offset)
            .field("size", &self.size)
            .field("archive", &self.archive.path)
            .field("compression", &self.compression())
            .finish_non_exhaustive()
    }
}

impl Entry {
    pub fn new(tgi: Tgi, offset: u32, size: u32, archive: Arc<ArchiveFile>) -> Self {
        Self {
            tgi,
            offset,
            size,
            archive,
            compression: AtomicU8::new(Compression::Unknown as u8),
            payload: Mutex::new(Payload::default()),
        }
    }

    #[must_use]
    pub fn tgi(&self) -> Tgi {
        self.tgi
    }

    #[must_use]
    pub fn kind(&self) -> u32 {
        self.tgi.kind
    }

    #[must_use]
    pub fn group(&self) -> u32 {
        self.tgi.group
    }

    #[must_use]
    pub fn instance(&self) -> u32 {
        self.tgi.instance
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Size of the raw (possibly compressed) payload.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    pub fn archive(&self) -> &Arc<ArchiveFile> {
        &self.archive
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.archive.path()
    }

    /// The compression state as currently known.
    #[must_use]
    pub fn compression(&self) -> Compression {
        Compression::from_u8(self.compression.load(Ordering::Acquire))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Payload> {
        self.payload.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the payload is compressed, inspecting the file if unknown.
    ///
    /// # Errors
    /// Returns an error if the archive cannot be read.
    pub fn is_compressed(&self) -> Result<bool> {
        match self.compression() {
            Compression::Compressed => Ok(true),
            Compression::Uncompressed => Ok(false),
            Compression::Unknown => {
                let head = self.read_range(self.size.min(9))?;
                Ok(self.detect(&head))
            }
        }
    }

    fn detect(&self, raw: &[u8]) -> bool {
        let compressed = compression::is_compressed(raw);
        let state = if compressed {
            Compression::Compressed
        } else {
            Compression::Uncompressed
        };
        self.compression.store(state as u8, Ordering::Release);
        compressed
    }

    fn read_range(&self, len: u32) -> Result<Vec<u8>> {
        let mut file = File::open(self.archive.path())?;
        let file_len = file.metadata()?.len();
        if u64::from(self.offset) + u64::from(self.size) > file_len {
            return Err(Error::EntryOutOfBounds {
                tgi: self.tgi,
                path: self.archive.path().to_path_buf(),
            });
        }
        file.seek(SeekFrom::Start(u64::from(self.offset)))?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read the raw payload from disk, bypassing the cache.
    ///
    /// # Errors
    /// Returns an error if the archive cannot be read.
    pub fn read_raw(&self) -> Result<Vec<u8>> {
        self.read_range(self.size)
    }

    /// The decompressed payload. Cached until [`Entry::free`] is called.
    ///
    /// # Errors
    /// Returns an error if the archive cannot be read or decompression fails.
    pub fn decompress(&self) -> Result<Arc<[u8]>> {
        if let Some(bytes) = &self.lock().bytes {
            return Ok(Arc::clone(bytes));
        }

        let raw = self.read_raw()?;
        let bytes: Arc<[u8]> = if self.detect(&raw) {
            compression::decompress(&raw)?.into()
        } else {
            raw.into()
        };

        self.lock().bytes = Some(Arc::clone(&bytes));
        Ok(bytes)
    }

    /// Decode the payload. Exemplars and cohorts become [`Record::Exemplar`],
    /// everything else stays raw.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be read or decoded.
    pub fn decode(&self) -> Result<Record> {
        if let Some(record) = &self.lock().record {
            return Ok(record.clone());
        }

        let bytes = self.decompress()?;
        let record = if file_types::is_exemplar_like(self.tgi.kind) {
            Record::Exemplar(Arc::new(Exemplar::parse(&bytes)?))
        } else {
            Record::Raw(bytes)
        };

        self.lock().record = Some(record.clone());
        Ok(record)
    }

    /// Decoded payload size currently held in memory.
    #[must_use]
    pub fn loaded_bytes(&self) -> usize {
        self.lock().bytes.as_ref().map_or(0, |b| b.len())
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        let payload = self.lock();
        payload.bytes.is_some() || payload.record.is_some()
    }

    /// Drop the cached payloads. Identity and compression flag are kept.
    pub fn free(&self) {
        let mut payload = self.lock();
        payload.bytes = None;
        payload.record = None;
    }
}
