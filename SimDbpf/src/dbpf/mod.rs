//! DBPF container format
//!
//! A DBPF archive is a 96 byte header, the record payloads, and an index
//! table of `(type, group, instance, offset, size)` rows. Compressed records
//! use QFS and are listed in a DIR record, which readers skip.

mod entry;
mod header;
mod reader;
mod writer;

pub use entry::{ArchiveFile, Compression, Entry, Record};
pub use header::DbpfHeader;
pub use reader::Archive;
pub use writer::DbpfWriter;

/// Magic bytes at the start of every archive.
pub const MAGIC: [u8; 4] = *b"DBPF";

/// Size of the archive header.
pub const HEADER_SIZE: usize = 96;
