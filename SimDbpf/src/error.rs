//! Error types for `SimDbpf`

use std::path::PathBuf;

use thiserror::Error;

use crate::tgi::Tgi;

/// The error type for `SimDbpf` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== DBPF Archive Errors ====================
    /// The file is not a valid DBPF archive (missing DBPF magic).
    #[error("invalid DBPF magic: expected DBPF, found {0:?}")]
    InvalidDbpfMagic([u8; 4]),

    /// The file is shorter than a DBPF header.
    #[error("file too small to be a DBPF archive: {size} bytes")]
    ArchiveTooSmall {
        /// Actual file size in bytes.
        size: u64,
    },

    /// The index table does not fit inside the archive.
    #[error("index table out of bounds: offset {offset}, size {size}, file length {len}")]
    IndexOutOfBounds {
        /// Index table offset from the header.
        offset: u32,
        /// Index table size from the header.
        size: u32,
        /// Length of the archive on disk.
        len: u64,
    },

    /// An entry's payload range lies outside the archive.
    #[error("entry {tgi} points past the end of {}", path.display())]
    EntryOutOfBounds {
        /// The entry that is out of range.
        tgi: Tgi,
        /// Archive the entry belongs to.
        path: PathBuf,
    },

    // ==================== Compression Errors ====================
    /// QFS stream does not start with `0x10FB`.
    #[error("invalid QFS magic: expected 0x10FB, found {0:#06X}")]
    InvalidQfsMagic(u16),

    /// QFS stream ended in the middle of a control block.
    #[error("QFS stream truncated at input offset {0}")]
    QfsTruncated(usize),

    /// A QFS back-reference points before the start of the output.
    #[error("QFS back-reference out of range at output offset {0}")]
    QfsBadReference(usize),

    /// QFS output does not match the declared size.
    #[error("QFS size mismatch: expected {expected} bytes, produced {actual}")]
    QfsSizeMismatch {
        /// Size from the QFS header.
        expected: usize,
        /// Size actually produced.
        actual: usize,
    },

    /// Payload too large for the 24-bit QFS size field.
    #[error("payload of {0} bytes is too large for QFS")]
    QfsTooLarge(usize),

    // ==================== Exemplar Errors ====================
    /// The record does not start with a known exemplar/cohort signature.
    #[error("invalid exemplar signature: {0:?}")]
    InvalidExemplarSignature(String),

    /// Unknown property value type code.
    #[error("unknown exemplar value type {0:#06X}")]
    UnknownValueType(u16),

    /// Unknown property key type code.
    #[error("unknown exemplar key type {0:#06X}")]
    UnknownKeyType(u16),

    /// The binary exemplar ended before its header was complete.
    #[error("exemplar record truncated")]
    ExemplarTruncated,

    /// Malformed text exemplar.
    #[error("text exemplar parse error: {0}")]
    TextExemplar(String),
}

/// Result type alias for `SimDbpf` operations.
pub type Result<T> = std::result::Result<T, Error>;
