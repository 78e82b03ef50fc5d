#![allow(non_snake_case)]
//! # PlugTrack
//!
//! Indexes a SimCity 4 installation and plugins folder in the order the game
//! loads them, then works out which files a set of plugins depends on.
//!
//! ## Quick Start
//!
//! ```no_run
//! use plugtrack::prelude::*;
//!
//! let config = TrackerConfig::load()?;
//! let tracker = DependencyTracker::new(config);
//! let result = tracker.track(&["my-lots/"], &TrackOptions::default())?;
//!
//! for package in &result.packages {
//!     println!("needs {package}");
//! }
//! for missing in result.missing_groups() {
//!     println!("missing {} {}", missing.kind, missing.query);
//! }
//! # Ok::<(), plugtrack::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `plugtrack` command-line binary and terminal rendering

pub mod config;
pub mod error;
pub mod families;
pub mod index;
pub mod load_order;
pub mod package;
pub mod scan;
pub mod tracker;

// Re-exports for convenience
pub use config::TrackerConfig;
pub use error::{Error, Result};
pub use index::{IndexOptions, PluginIndex};
pub use tracker::{DependencyTracker, TrackOptions, TrackingResult};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::TrackerConfig;
    pub use crate::error::{Error, Result};
    pub use crate::families::FamilyTable;
    pub use crate::index::{IndexOptions, PluginIndex};
    pub use crate::package::{PackageIndex, package_id};
    pub use crate::scan::{DirectoryScan, FileScanner};
    pub use crate::tracker::{
        Dependency, DependencyTracker, Format, Link, MissingEntry, MissingKind, NodeId,
        TrackOptions, TrackingResult,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
