//! DBPF archive reader

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};
use crate::file_types;
use crate::tgi::Tgi;

use super::entry::{ArchiveFile, Entry};
use super::header::DbpfHeader;
use super::HEADER_SIZE;

/// An opened DBPF archive: its header and the entries of its index table.
///
/// The DIR record is dropped from the entry list. Entry order is the
/// declaration order of the index table.
#[derive(Debug)]
pub struct Archive {
    file: Arc<ArchiveFile>,
    header: DbpfHeader,
    entries: Vec<Arc<Entry>>,
}

impl Archive {
    /// Open an archive and read its index table. Payloads are not read.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not a DBPF archive, or
    /// its index table lies outside the file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len < HEADER_SIZE as u64 {
            return Err(Error::ArchiveTooSmall { size: len });
        }

        let mut reader = BufReader::new(file);
        let header = DbpfHeader::read(&mut reader)?;

        let table_end = u64::from(header.index_offset) + u64::from(header.index_size);
        let needed = header.index_count as u64 * header.entry_size() as u64;
        if table_end > len || needed > u64::from(header.index_size) {
            return Err(Error::IndexOutOfBounds {
                offset: header.index_offset,
                size: header.index_size,
                len,
            });
        }

        reader.seek(SeekFrom::Start(u64::from(header.index_offset)))?;
        let mut table = vec![0u8; header.index_size as usize];
        reader.read_exact(&mut table)?;

        let archive = Arc::new(ArchiveFile::new(path));
        let entries = parse_index(&table, &header, &archive)?;
        tracing::debug!(
            "Read {} entries from {}",
            entries.len(),
            path.display()
        );

        Ok(Self {
            file: archive,
            header,
            entries,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    #[must_use]
    pub fn file(&self) -> &Arc<ArchiveFile> {
        &self.file
    }

    #[must_use]
    pub fn header(&self) -> &DbpfHeader {
        &self.header
    }

    /// Entries in declaration order, DIR record excluded.
    #[must_use]
    pub fn entries(&self) -> &[Arc<Entry>] {
        &self.entries
    }

    /// Consume the archive, keeping only its entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<Arc<Entry>> {
        self.entries
    }

    /// First declared entry with the given TGI.
    #[must_use]
    pub fn find(&self, tgi: Tgi) -> Option<&Arc<Entry>> {
        self.entries.iter().find(|e| e.tgi() == tgi)
    }
}

fn parse_index(
    table: &[u8],
    header: &DbpfHeader,
    archive: &Arc<ArchiveFile>,
) -> Result<Vec<Arc<Entry>>> {
    let mut cursor = Cursor::new(table);
    let mut entries = Vec::with_capacity(header.index_count as usize);

    for _ in 0..header.index_count {
        let kind = cursor.read_u32::<LittleEndian>()?;
        let group = cursor.read_u32::<LittleEndian>()?;
        let instance = cursor.read_u32::<LittleEndian>()?;
        if header.index_minor > 0 {
            let _resource = cursor.read_u32::<LittleEndian>()?;
        }
        let offset = cursor.read_u32::<LittleEndian>()?;
        let size = cursor.read_u32::<LittleEndian>()?;

        if kind == file_types::DIR {
            continue;
        }
        entries.push(Arc::new(Entry::new(
            Tgi::new(kind, group, instance),
            offset,
            size,
            Arc::clone(archive),
        )));
    }

    Ok(entries)
}
