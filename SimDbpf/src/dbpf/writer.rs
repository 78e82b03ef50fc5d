//! DBPF archive writer

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::compression;
use crate::error::Result;
use crate::file_types;
use crate::tgi::Tgi;

use super::header::DbpfHeader;
use super::HEADER_SIZE;

struct PendingRecord {
    tgi: Tgi,
    data: Vec<u8>,
    compress: bool,
}

/// Builds a DBPF archive from in-memory records.
///
/// Records are written in the order they were added. Compressed records are
/// listed in a DIR record appended after them.
#[derive(Default)]
pub struct DbpfWriter {
    header: DbpfHeader,
    records: Vec<PendingRecord>,
}

impl DbpfWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an uncompressed record.
    pub fn add(&mut self, tgi: Tgi, data: impl Into<Vec<u8>>) -> &mut Self {
        self.records.push(PendingRecord {
            tgi,
            data: data.into(),
            compress: false,
        });
        self
    }

    /// Add a record that is stored QFS compressed.
    pub fn add_compressed(&mut self, tgi: Tgi, data: impl Into<Vec<u8>>) -> &mut Self {
        self.records.push(PendingRecord {
            tgi,
            data: data.into(),
            compress: true,
        });
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize the archive.
    ///
    /// # Errors
    /// Returns an error if a record cannot be compressed.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut blobs: Vec<(Tgi, Vec<u8>)> = Vec::with_capacity(self.records.len() + 1);
        let mut dir = Vec::new();

        for record in &self.records {
            if record.compress {
                let packed = compression::compress(&record.data)?;
                dir.write_u32::<LittleEndian>(record.tgi.kind)?;
                dir.write_u32::<LittleEndian>(record.tgi.group)?;
                dir.write_u32::<LittleEndian>(record.tgi.instance)?;
                dir.write_u32::<LittleEndian>(record.data.len() as u32)?;
                blobs.push((record.tgi, packed));
            } else {
                blobs.push((record.tgi, record.data.clone()));
            }
        }

        if !dir.is_empty() {
            let tgi = Tgi::new(
                file_types::DIR,
                file_types::DIR_GROUP,
                file_types::DIR_INSTANCE,
            );
            blobs.push((tgi, dir));
        }

        let mut body = Vec::new();
        let mut table = Vec::with_capacity(blobs.len() * 20);
        let mut offset = HEADER_SIZE as u32;
        for (tgi, blob) in &blobs {
            table.write_u32::<LittleEndian>(tgi.kind)?;
            table.write_u32::<LittleEndian>(tgi.group)?;
            table.write_u32::<LittleEndian>(tgi.instance)?;
            table.write_u32::<LittleEndian>(offset)?;
            table.write_u32::<LittleEndian>(blob.len() as u32)?;
            body.extend_from_slice(blob);
            offset += blob.len() as u32;
        }

        let header = DbpfHeader {
            index_count: blobs.len() as u32,
            index_offset: offset,
            index_size: table.len() as u32,
            index_minor: 0,
            ..self.header.clone()
        };

        let mut out = Vec::with_capacity(HEADER_SIZE + body.len() + table.len());
        header.write(&mut out)?;
        out.extend_from_slice(&body);
        out.extend_from_slice(&table);
        Ok(out)
    }

    /// Write the archive to `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }
}
