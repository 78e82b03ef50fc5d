//! Dependency tracking
//!
//! A [`DependencyTracker`] owns the configuration and lazily builds the
//! plugin index. Each call to [`DependencyTracker::track`] resolves a set of
//! source files against that index with a fresh [`TrackingContext`].

pub mod context;
pub mod dependency;
#[cfg(feature = "cli")]
pub mod render;
pub mod result;

pub use context::{ContextOutput, SourceError, TrackingContext};
pub use dependency::{
    Dependency, DependencyGraph, ExemplarNode, FamilyNode, Link, LotNode, MissingEntry, MissingKind,
    MissingRef, NamedLink, NodeId,
};
pub use result::{Format, MissingGroup, TrackingResult};

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::index::{IndexOptions, PluginIndex};
use crate::package::PackageIndex;
use crate::scan::FileScanner;

/// Per-call options of [`DependencyTracker::track`].
#[derive(Debug, Clone, Default)]
pub struct TrackOptions {
    /// Package ids or file paths preferred when several records match.
    pub dependencies: Vec<String>,
}

/// Resolves the dependencies of plugin files.
pub struct DependencyTracker {
    config: TrackerConfig,
    index: OnceLock<PluginIndex>,
    packages: OnceLock<PackageIndex>,
}

impl DependencyTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            index: OnceLock::new(),
            packages: OnceLock::new(),
        }
    }

    /// A tracker over an index that was built elsewhere.
    pub fn with_index(config: TrackerConfig, index: PluginIndex) -> Self {
        let tracker = Self::new(config);
        let _ = tracker.index.set(index);
        tracker
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The plugin index, if it was built or loaded already.
    pub fn index(&self) -> Option<&PluginIndex> {
        self.index.get()
    }

    fn plugins(&self) -> Result<&Path> {
        let plugins = self.config.plugins.as_deref().ok_or(Error::NoPluginsFolder)?;
        if plugins.is_dir() {
            Ok(plugins)
        } else {
            Err(Error::DirectoryNotFound {
                path: plugins.to_path_buf(),
            })
        }
    }

    /// Build the plugin index and its families, or load them from the
    /// configured cache file. Runs at most once per tracker.
    ///
    /// # Errors
    /// Returns an error if the plugins folder is missing or the cache file
    /// cannot be read or written.
    pub fn ensure_index(&self) -> Result<&PluginIndex> {
        if let Some(index) = self.index.get() {
            return Ok(index);
        }
        let index = self.load_or_build()?;
        Ok(self.index.get_or_init(|| index))
    }

    fn load_or_build(&self) -> Result<PluginIndex> {
        if let Some(cache) = self.config.cache.as_deref().filter(|p| p.is_file()) {
            return PluginIndex::load(cache, self.config.cache_budget());
        }

        self.plugins()?;
        let options = IndexOptions::from(&self.config);
        let scan_pool = self.config.pool(self.config.scan_concurrency)?;
        let mut index = PluginIndex::build(&options, &scan_pool)?;
        tracing::info!(
            "Indexed {} records from {} files",
            index.len(),
            index.archives().len()
        );

        let family_pool = self.config.pool(self.config.family_concurrency)?;
        index.build_families(&family_pool);

        if let Some(cache) = &self.config.cache {
            index.save(cache)?;
        }
        Ok(index)
    }

    /// Installed sc4pac package folders. Empty when there is no plugins
    /// folder.
    pub fn ensure_packages(&self) -> &PackageIndex {
        self.packages.get_or_init(|| match self.plugins() {
            Ok(plugins) => PackageIndex::build(plugins),
            Err(_) => PackageIndex::default(),
        })
    }

    /// Source files named by the patterns, relative to the plugins folder.
    ///
    /// # Errors
    /// Returns an error if the plugins folder is missing or a pattern is
    /// invalid.
    pub fn sources<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Vec<PathBuf>> {
        FileScanner::new(self.plugins()?)
            .with_extensions(&self.config.extensions)
            .scan(patterns)
    }

    /// Resolve everything the matched files refer to.
    ///
    /// Missing records are part of the result, not errors.
    ///
    /// # Errors
    /// Returns an error if the plugins folder is missing, the index cannot
    /// be built, or none of the matched files can be read.
    pub fn track<S: AsRef<str>>(&self, patterns: &[S], options: &TrackOptions) -> Result<TrackingResult> {
        let sources = self.sources(patterns)?;
        let index = self.ensure_index()?;
        tracing::debug!("Tracking {} source files", sources.len());

        let context = TrackingContext::new(index, &sources, &options.dependencies);
        context.run(&self.config.pool(self.config.scan_concurrency)?);
        let result = TrackingResult::new(
            context.finish(),
            self.config.installation.clone(),
            self.config.plugins.clone(),
            &self.config.exclude_packages,
        );
        tracing::info!(
            "Resolved {} records, {} missing",
            result.graph.len(),
            result.missing.len()
        );

        if result.all_sources_failed() {
            return Err(Error::AllSourcesFailed {
                count: result.scanned.len(),
            });
        }
        Ok(result)
    }
}
