#![allow(non_snake_case)]
//! # SimDbpf
//!
//! A pure-Rust library for the SimCity 4 DBPF container format.
//!
//! ## Supported Formats
//!
//! - **DBPF archives** - Read index tables, read and decompress records, write archives
//! - **QFS** - `RefPack` decompression of compressed records
//! - **Exemplars/Cohorts** - Binary and text property bags, lot objects
//!
//! ## Quick Start
//!
//! ```no_run
//! use simdbpf::prelude::*;
//!
//! let archive = Archive::open("Plugins/my_lot.SC4Lot")?;
//! for entry in archive.entries() {
//!     if let Record::Exemplar(exemplar) = entry.decode()? {
//!         println!("{} {:?}", entry.tgi(), exemplar.get_str(props::EXEMPLAR_NAME));
//!     }
//! }
//! # Ok::<(), simdbpf::Error>(())
//! ```

pub mod compression;
pub mod dbpf;
pub mod error;
pub mod exemplar;
pub mod file_types;
pub mod tgi;

// Re-exports for convenience
pub use dbpf::{Archive, ArchiveFile, Compression, DbpfWriter, Entry, Record};
pub use error::{Error, Result};
pub use exemplar::{Exemplar, LotObject, LotObjectKind, Value, props};
pub use tgi::{Tgi, TgiQuery};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::dbpf::{Archive, ArchiveFile, DbpfWriter, Entry, Record};
    pub use crate::error::{Error, Result};
    pub use crate::exemplar::{Exemplar, LotObject, LotObjectKind, Value, props};
    pub use crate::file_types;
    pub use crate::tgi::{Tgi, TgiQuery};
}
