//! Parallel archive scan in load order

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use simdbpf::{Archive, ArchiveFile, Entry};

use crate::error::{Error, Result};
use crate::load_order;

use super::scanner::FileScanner;

/// Entries of a set of archives, flattened in load order.
#[derive(Debug, Default)]
pub struct ScanOutput {
    /// Archives that were read, in load order.
    pub archives: Vec<Arc<ArchiveFile>>,
    /// Entries in override order: a later entry overrides an earlier one.
    pub entries: Vec<Arc<Entry>>,
    /// Files that could not be read as archives.
    pub skipped: Vec<PathBuf>,
}

impl ScanOutput {
    /// Append another scan. Its entries override ours.
    pub fn extend(&mut self, other: ScanOutput) {
        self.archives.extend(other.archives);
        self.entries.extend(other.entries);
        self.skipped.extend(other.skipped);
    }
}

/// Reads every archive matched by a set of patterns.
#[derive(Debug, Clone)]
pub struct DirectoryScan {
    scanner: FileScanner,
    patterns: Vec<String>,
    exclude: Vec<String>,
}

impl DirectoryScan {
    pub fn new<S: AsRef<str>>(patterns: &[S], root: impl Into<PathBuf>) -> Self {
        Self {
            scanner: FileScanner::new(root),
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            exclude: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_extensions<S: AsRef<str>>(mut self, extensions: &[S]) -> Self {
        self.scanner = self.scanner.with_extensions(extensions);
        self
    }

    /// Skip files whose path contains the given text.
    #[must_use]
    pub fn exclude(mut self, needle: impl Into<String>) -> Self {
        self.exclude.push(needle.into());
        self
    }

    pub fn root(&self) -> &Path {
        self.scanner.root()
    }

    /// The files this scan reads, in load order.
    ///
    /// # Errors
    /// Returns an error if the root is not a folder or a pattern is invalid.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.root().is_dir() {
            return Err(Error::DirectoryNotFound {
                path: self.root().to_path_buf(),
            });
        }
        let mut files = self.scanner.scan(&self.patterns)?;
        files.retain(|f| {
            let path = f.to_string_lossy();
            !self.exclude.iter().any(|needle| path.contains(needle.as_str()))
        });
        load_order::sort(&mut files);
        Ok(files)
    }

    /// Open all archives on the pool and flatten their entries.
    ///
    /// Within one archive the first declared entry wins, so each archive's
    /// entries are appended in reverse.
    ///
    /// # Errors
    /// Returns an error if the file list cannot be built. Archives that fail
    /// to open are skipped with a warning.
    pub fn run(&self, pool: &rayon::ThreadPool) -> Result<ScanOutput> {
        let files = self.files()?;
        tracing::debug!(
            "Scanning {} files under {}",
            files.len(),
            self.root().display()
        );

        let opened: Vec<(PathBuf, simdbpf::Result<Archive>)> = pool.install(|| {
            files
                .into_par_iter()
                .map(|file| {
                    let archive = Archive::open(&file);
                    (file, archive)
                })
                .collect()
        });

        let mut output = ScanOutput::default();
        for (file, archive) in opened {
            match archive {
                Ok(archive) => {
                    output.archives.push(Arc::clone(archive.file()));
                    output.entries.extend(archive.into_entries().into_iter().rev());
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {e}", file.display());
                    output.skipped.push(file);
                }
            }
        }
        tracing::info!(
            "Read {} entries from {} archives ({} skipped)",
            output.entries.len(),
            output.archives.len(),
            output.skipped.len()
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simdbpf::{DbpfWriter, Tgi};
    use std::fs;

    fn write(path: &Path, tgis: &[(Tgi, &[u8])]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut writer = DbpfWriter::new();
        for (tgi, data) in tgis {
            writer.add(*tgi, data.to_vec());
        }
        writer.save(path).unwrap();
    }

    #[test]
    fn test_scan_order_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        let t1 = Tgi::new(1, 2, 3);
        let t2 = Tgi::new(1, 2, 4);
        write(&root.join("z.dat"), &[(t1, b"z-first"), (t1, b"z-second")]);
        write(&root.join("a.SC4Lot"), &[(t2, b"a")]);
        fs::write(root.join("broken.dat"), b"not an archive").unwrap();
        write(&root.join("staging-process/x.dat"), &[(t2, b"x")]);

        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let output = DirectoryScan::new(&["**/*"], &root)
            .exclude("staging-process")
            .run(&pool)
            .unwrap();

        let paths: Vec<PathBuf> = output.archives.iter().map(|a| a.path().to_path_buf()).collect();
        assert_eq!(paths, vec![root.join("a.SC4Lot"), root.join("z.dat")]);
        assert_eq!(output.skipped, vec![root.join("broken.dat")]);

        // Reversed within z.dat, so the first declared record comes last
        let last = output.entries.last().unwrap();
        assert_eq!(last.tgi(), t1);
        assert_eq!(last.decompress().unwrap().as_ref(), b"z-first");
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let scan = DirectoryScan::new(&["**/*"], dir.path().join("nope"));
        assert!(matches!(scan.files(), Err(Error::DirectoryNotFound { .. })));
    }
}
