//! Pattern expansion for plugin files
//!
//! Patterns are relative to a root folder unless absolute:
//!
//! - `folder/` is a folder, scanned recursively
//! - `group:name` or `group:name/rest` is an installed sc4pac package
//! - a path without glob characters is a folder when it has no extension
//!   or ends in `.sc4pac`, otherwise a single file
//! - anything else is a glob pattern; `*` and `.../*` only match plugin
//!   extensions

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use glob::{MatchOptions, Pattern};
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Extensions the game loads plugins from.
pub const DEFAULT_EXTENSIONS: [&str; 4] = ["dat", "sc4lot", "sc4desc", "sc4model"];

/// Folder pattern of installed sc4pac packages, relative to the plugins root.
const PACKAGE_FOLDER: &str = "[0-9][0-9][02468]-*";

static DRIVE_PREFIX: OnceLock<Regex> = OnceLock::new();

fn drive_prefix() -> &'static Regex {
    DRIVE_PREFIX.get_or_init(|| Regex::new(r"^[A-Za-z]:").expect("valid regex"))
}

/// What a single pattern expands to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    /// Folders matching the glob, walked recursively.
    Folders(String),
    /// Files matching the glob. `filter` restricts them to plugin extensions.
    Files { pattern: String, filter: bool },
}

/// Expands user patterns into a sorted list of plugin files.
#[derive(Debug, Clone)]
pub struct FileScanner {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FileScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            root: std::path::absolute(&root).unwrap_or(root),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[must_use]
    pub fn with_extensions<S: AsRef<str>>(mut self, extensions: &[S]) -> Self {
        self.extensions = extensions
            .iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_string())
            .collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Expand the patterns. Empty patterns are ignored. The result holds
    /// absolute file paths, sorted and without duplicates.
    ///
    /// # Errors
    /// Returns an error if a glob pattern is malformed.
    pub fn scan<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Vec<PathBuf>> {
        let mut files = BTreeSet::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern.is_empty() {
                continue;
            }
            let target = self.parse(pattern);
            tracing::debug!("Expanding {pattern} as {target:?}");
            self.expand(&target, pattern, &mut files)?;
        }
        Ok(files.into_iter().collect())
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| {
            self.extensions
                .iter()
                .any(|e| ext.eq_ignore_ascii_case(e.as_str()))
        })
    }

    /// Glob pattern rooted at the scan root, unless already absolute.
    fn rooted(&self, pattern: &str) -> String {
        if Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            format!(
                "{}/{}",
                Pattern::escape(&self.root.to_string_lossy()),
                pattern
            )
        }
    }

    fn literal(&self, path: &str) -> String {
        Pattern::escape(&self.root.join(path).to_string_lossy())
    }

    fn parse(&self, pattern: &str) -> Target {
        if pattern.ends_with('/') || pattern.ends_with('\\') {
            let trimmed = pattern.trim_end_matches(['/', '\\']);
            return Target::Folders(self.literal(trimmed));
        }

        if drive_prefix().replace(pattern, "").contains(':') {
            return self.parse_package(pattern);
        }

        if !pattern.contains(['*', '?', '[', '{', '!']) {
            let ext = Path::new(pattern)
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase());
            return match ext.as_deref() {
                None | Some("sc4pac") => Target::Folders(self.literal(pattern)),
                Some(_) => Target::Files {
                    pattern: self.literal(pattern),
                    filter: false,
                },
            };
        }

        let filter = pattern == "*" || pattern.ends_with("/*");
        Target::Files {
            pattern: self.rooted(pattern),
            filter,
        }
    }

    fn parse_package(&self, pattern: &str) -> Target {
        let (package, rest) = pattern.split_once('/').unwrap_or((pattern, ""));
        let (group, name) = package.split_once(':').unwrap_or((package, ""));
        let folder = format!("{PACKAGE_FOLDER}/{group}.{name}.*.sc4pac");

        if rest.is_empty() {
            Target::Folders(self.rooted(&folder))
        } else if rest.ends_with('/') {
            Target::Folders(self.rooted(&format!("{folder}/{}", rest.trim_end_matches('/'))))
        } else {
            Target::Files {
                pattern: self.rooted(&format!("{folder}/{rest}")),
                filter: rest.ends_with("/*") || rest == "*",
            }
        }
    }

    fn expand(&self, target: &Target, source: &str, out: &mut BTreeSet<PathBuf>) -> Result<()> {
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        let (pattern, folders, filter) = match target {
            Target::Folders(pattern) => (pattern, true, true),
            Target::Files { pattern, filter } => (pattern, false, *filter),
        };
        let matches = glob::glob_with(pattern, options).map_err(|e| Error::InvalidPattern {
            pattern: source.to_string(),
            message: e.to_string(),
        })?;

        for path in matches.filter_map(std::result::Result::ok) {
            if folders && path.is_dir() {
                self.walk(&path, out);
            } else if !folders && path.is_file() && (!filter || self.has_extension(&path)) {
                out.insert(path);
            }
        }
        Ok(())
    }

    fn walk(&self, dir: &Path, out: &mut BTreeSet<PathBuf>) {
        let files = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file() && self.has_extension(e.path()))
            .map(walkdir::DirEntry::into_path);
        out.extend(files);
    }
}
