//! Error types for `PlugTrack`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `PlugTrack` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the DBPF container library.
    #[error("DBPF error: {0}")]
    Dbpf(#[from] simdbpf::Error),

    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // ==================== Scan Errors ====================
    /// A scan root does not exist or is not a directory.
    #[error("directory not found: {path}")]
    DirectoryNotFound {
        /// The path that was given as a root.
        path: PathBuf,
    },

    /// A glob pattern could not be parsed.
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Parser message.
        message: String,
    },

    /// The worker pool could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    // ==================== Cache Errors ====================
    /// The file is not a persisted plugin index.
    #[error("invalid index cache magic: expected PTIX, found {0:?}")]
    InvalidCacheMagic([u8; 4]),

    /// The persisted index was written by an unsupported version.
    #[error("unsupported index cache version {0}")]
    UnsupportedCacheVersion(u32),

    /// The persisted index refers to an archive or entry it does not contain.
    #[error("corrupt index cache: {0}")]
    CorruptCache(String),

    // ==================== Config Errors ====================
    /// Neither the command line nor the config names a plugins folder.
    #[error("no plugins folder configured (set SC4_PLUGINS or pass --directory)")]
    NoPluginsFolder,

    /// The configuration file could not be parsed.
    #[error("invalid config {path}: {source}")]
    ConfigParse {
        /// Config file path.
        path: PathBuf,
        /// Parser error.
        source: toml::de::Error,
    },

    /// The configuration could not be serialized.
    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    // ==================== Tracking Errors ====================
    /// Every source archive failed to open.
    #[error("none of the {count} source files could be read")]
    AllSourcesFailed {
        /// Number of source files.
        count: usize,
    },
}

/// Result type alias for `PlugTrack` operations.
pub type Result<T> = std::result::Result<T, Error>;
