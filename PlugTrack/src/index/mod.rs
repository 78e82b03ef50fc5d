//! Plugin index
//!
//! All entries of the installation and the plugins folder, flattened in load
//! order, with TGI lookup, family membership and a memory-bounded record
//! cache.

pub mod cache;
pub mod persist;
pub mod tgi_index;

pub use cache::{EntryCache, EntryCacheStats};
pub use tgi_index::{IndexMaps, TgiIndex};

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use simdbpf::{ArchiveFile, Entry, Record, Tgi, TgiQuery, Value, file_types};

use crate::config::TrackerConfig;
use crate::error::Result;
use crate::families::{self, FamilyTable};
use crate::scan::{DEFAULT_EXTENSIONS, DirectoryScan, ScanOutput};

/// Plugin paths containing this are half-installed sc4pac packages.
const STAGING_FOLDER: &str = "staging-process";

/// What to index.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub installation: Option<PathBuf>,
    pub plugins: Option<PathBuf>,
    /// Patterns under the plugins folder.
    pub patterns: Vec<String>,
    pub scan_installation: bool,
    pub extensions: Vec<String>,
    /// Byte budget of the record cache.
    pub cache_budget: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            installation: None,
            plugins: None,
            patterns: vec!["**/*".to_string()],
            scan_installation: true,
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            cache_budget: crate::config::DEFAULT_MEMORY as usize / 2,
        }
    }
}

impl From<&TrackerConfig> for IndexOptions {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            installation: config.installation.clone(),
            plugins: config.plugins.clone(),
            scan_installation: config.scan_installation,
            extensions: config.extensions.clone(),
            cache_budget: config.cache_budget(),
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct PluginIndex {
    archives: Vec<Arc<ArchiveFile>>,
    index: TgiIndex,
    families: FamilyTable,
    cache: EntryCache,
}

impl PluginIndex {
    /// An index over already flattened entries.
    pub fn from_scan(scan: ScanOutput, cache_budget: usize) -> Self {
        Self {
            archives: scan.archives,
            index: TgiIndex::build(scan.entries),
            families: FamilyTable::default(),
            cache: EntryCache::new(cache_budget),
        }
    }

    /// Scan the installation, then the plugins folder, and index both.
    ///
    /// Plugins override the installation because they are indexed after it.
    ///
    /// # Errors
    /// Returns an error if the plugins folder is missing or a pattern is
    /// invalid. A missing installation folder is only logged.
    pub fn build(options: &IndexOptions, pool: &rayon::ThreadPool) -> Result<Self> {
        let mut output = ScanOutput::default();

        if let Some(installation) = options.installation.as_ref().filter(|_| options.scan_installation) {
            if installation.is_dir() {
                let scan = DirectoryScan::new(&["**/*"], installation).with_extensions(&options.extensions);
                output.extend(scan.run(pool)?);
            } else {
                tracing::warn!("Installation folder {} not found", installation.display());
            }
        }

        if let Some(plugins) = &options.plugins {
            let scan = DirectoryScan::new(&options.patterns, plugins)
                .with_extensions(&options.extensions)
                .exclude(STAGING_FOLDER);
            output.extend(scan.run(pool)?);
        }

        Ok(Self::from_scan(output, options.cache_budget))
    }

    /// Index family membership. Replaces any earlier table.
    pub fn build_families(&mut self, pool: &rayon::ThreadPool) {
        self.families = families::build(self, pool);
    }

    pub fn archives(&self) -> &[Arc<ArchiveFile>] {
        &self.archives
    }

    pub fn entries(&self) -> &[Arc<Entry>] {
        self.index.entries()
    }

    pub fn tgi_index(&self) -> &TgiIndex {
        &self.index
    }

    pub fn families(&self) -> &FamilyTable {
        &self.families
    }

    pub fn cache(&self) -> &EntryCache {
        &self.cache
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The overriding entry for a query.
    pub fn find(&self, query: &TgiQuery) -> Option<Arc<Entry>> {
        self.index.find(query).cloned()
    }

    /// Every matching entry in index order.
    pub fn find_all(&self, query: &TgiQuery) -> Vec<Arc<Entry>> {
        self.index.find_all(query).into_iter().cloned().collect()
    }

    /// Members of a family.
    pub fn family(&self, id: u32) -> &[Tgi] {
        self.families.get(id)
    }

    /// Decode a record and account for it in the cache.
    pub fn read(&self, entry: &Arc<Entry>) -> simdbpf::Result<Record> {
        let record = entry.decode()?;
        self.cache.admit(entry);
        Ok(record)
    }

    /// Decompressed bytes of a record, accounted for in the cache.
    pub fn decompress(&self, entry: &Arc<Entry>) -> simdbpf::Result<Arc<[u8]>> {
        let bytes = entry.decompress()?;
        self.cache.admit(entry);
        Ok(bytes)
    }

    /// An exemplar property, inherited through parent cohorts.
    ///
    /// Only exemplar and cohort parents are followed. A parent chain that
    /// loops ends the lookup.
    pub fn property(&self, entry: &Arc<Entry>, key: u32) -> Option<Value> {
        let mut visited = HashSet::new();
        let mut current = Arc::clone(entry);
        loop {
            if !visited.insert(current.tgi()) {
                tracing::debug!("Parent cycle at {}", current.tgi());
                return None;
            }
            let record = match self.read(&current) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Failed to read {} in {}: {e}", current.tgi(), current.path().display());
                    return None;
                }
            };
            let exemplar = record.as_exemplar()?;
            if let Some(value) = exemplar.get(key) {
                return Some(value.clone());
            }
            let parent = exemplar.parent().filter(|p| file_types::is_exemplar_like(p.kind))?;
            current = self.find(&TgiQuery::exact(parent))?;
        }
    }

    /// Write the index in the persisted format.
    pub fn serialize<W: Write>(&self, out: &mut W) -> Result<()> {
        persist::write(out, &self.archives, &self.index, &self.families)
    }

    /// Read an index written by [`PluginIndex::serialize`].
    pub fn deserialize<R: Read>(input: R, cache_budget: usize) -> Result<Self> {
        let snapshot = persist::read(input)?;
        Ok(Self {
            archives: snapshot.archives,
            index: snapshot.index,
            families: snapshot.families,
            cache: EntryCache::new(cache_budget),
        })
    }

    /// Save to a file, creating parent folders.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(path)?);
        self.serialize(&mut out)?;
        out.flush()?;
        tracing::info!("Saved index of {} entries to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path, cache_budget: usize) -> Result<Self> {
        let index = Self::deserialize(File::open(path)?, cache_budget)?;
        tracing::info!("Loaded index of {} entries from {}", index.len(), path.display());
        Ok(index)
    }
}
