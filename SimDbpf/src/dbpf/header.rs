//! DBPF header (96 bytes at the start of every archive)

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};

use super::MAGIC;

/// Parsed DBPF header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbpfHeader {
    pub major_version: u32,
    pub minor_version: u32,
    /// Creation time, unix seconds.
    pub created: u32,
    /// Modification time, unix seconds.
    pub modified: u32,
    pub index_major: u32,
    pub index_count: u32,
    pub index_offset: u32,
    pub index_size: u32,
    pub holes_count: u32,
    pub holes_offset: u32,
    pub holes_size: u32,
    pub index_minor: u32,
}

impl Default for DbpfHeader {
    fn default() -> Self {
        Self {
            major_version: 1,
            minor_version: 0,
            created: 0,
            modified: 0,
            index_major: 7,
            index_count: 0,
            index_offset: 0,
            index_size: 0,
            holes_count: 0,
            holes_offset: 0,
            holes_size: 0,
            index_minor: 0,
        }
    }
}

impl DbpfHeader {
    /// Read a header, consuming exactly [`HEADER_SIZE`](super::HEADER_SIZE) bytes.
    ///
    /// # Errors
    /// Returns an error if the magic is not `DBPF` or the reader runs dry.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::InvalidDbpfMagic(magic));
        }

        let major_version = reader.read_u32::<LittleEndian>()?;
        let minor_version = reader.read_u32::<LittleEndian>()?;
        let mut reserved = [0u8; 12];
        reader.read_exact(&mut reserved)?;
        let created = reader.read_u32::<LittleEndian>()?;
        let modified = reader.read_u32::<LittleEndian>()?;
        let index_major = reader.read_u32::<LittleEndian>()?;
        let index_count = reader.read_u32::<LittleEndian>()?;
        let index_offset = reader.read_u32::<LittleEndian>()?;
        let index_size = reader.read_u32::<LittleEndian>()?;
        let holes_count = reader.read_u32::<LittleEndian>()?;
        let holes_offset = reader.read_u32::<LittleEndian>()?;
        let holes_size = reader.read_u32::<LittleEndian>()?;
        let index_minor = reader.read_u32::<LittleEndian>()?;

        // 4 + 4 + 24 bytes of padding up to 96.
        let mut tail = [0u8; 32];
        reader.read_exact(&mut tail)?;

        Ok(Self {
            major_version,
            minor_version,
            created,
            modified,
            index_major,
            index_count,
            index_offset,
            index_size,
            holes_count,
            holes_offset,
            holes_size,
            index_minor,
        })
    }

    /// Write the header as [`HEADER_SIZE`](super::HEADER_SIZE) bytes.
    ///
    /// # Errors
    /// Returns an error if the writer fails.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_u32::<LittleEndian>(self.major_version)?;
        writer.write_u32::<LittleEndian>(self.minor_version)?;
        writer.write_all(&[0u8; 12])?;
        writer.write_u32::<LittleEndian>(self.created)?;
        writer.write_u32::<LittleEndian>(self.modified)?;
        writer.write_u32::<LittleEndian>(self.index_major)?;
        writer.write_u32::<LittleEndian>(self.index_count)?;
        writer.write_u32::<LittleEndian>(self.index_offset)?;
        writer.write_u32::<LittleEndian>(self.index_size)?;
        writer.write_u32::<LittleEndian>(self.holes_count)?;
        writer.write_u32::<LittleEndian>(self.holes_offset)?;
        writer.write_u32::<LittleEndian>(self.holes_size)?;
        writer.write_u32::<LittleEndian>(self.index_minor)?;
        writer.write_all(&[0u8; 32])?;
        Ok(())
    }

    /// Size of one index table row. Index minor versions above 0 carry an
    /// extra resource id after the instance.
    #[must_use]
    pub fn entry_size(&self) -> usize {
        if self.index_minor > 0 { 24 } else { 20 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbpf::HEADER_SIZE;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let header = DbpfHeader {
            index_count: 3,
            index_offset: 200,
            index_size: 60,
            ..DbpfHeader::default()
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
        assert_eq!(&buf[0..4], b"DBPF");
        assert_eq!(u32::from_le_bytes(buf[32..36].try_into().unwrap()), 7);
        assert_eq!(u32::from_le_bytes(buf[36..40].try_into().unwrap()), 3);
        assert_eq!(u32::from_le_bytes(buf[40..44].try_into().unwrap()), 200);
        assert_eq!(u32::from_le_bytes(buf[44..48].try_into().unwrap()), 60);

        let parsed = DbpfHeader::read(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[..4].copy_from_slice(b"LSPK");
        let err = DbpfHeader::read(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, Error::InvalidDbpfMagic(m) if &m == b"LSPK"));
    }
}
