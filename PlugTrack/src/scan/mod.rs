//! Finding and reading plugin archives

pub mod operation;
pub mod scanner;

pub use operation::{DirectoryScan, ScanOutput};
pub use scanner::{DEFAULT_EXTENSIONS, FileScanner};
