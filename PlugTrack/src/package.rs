//! sc4pac package ids and core game files
//!
//! sc4pac installs every package into `<plugins>/<NNN>-<category>/
//! <group>.<name>.<variant>.sc4pac/`. The package id `group:name` is
//! recovered from the folder name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use walkdir::WalkDir;

fn package_folder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(r"^([a-z0-9-]+)\.([a-z0-9-]+)(?:\..*)?\.sc4pac$")
            .case_insensitive(true)
            .build()
            .expect("valid regex")
    })
}

fn package_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(r"^[a-z0-9-]+:[a-z0-9-]+$")
            .case_insensitive(true)
            .build()
            .expect("valid regex")
    })
}

fn core_file() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(r"^SimCity_[0-9]\.dat$")
            .case_insensitive(true)
            .build()
            .expect("valid regex")
    })
}

/// Package id for a single folder name, e.g. `memo.submenus-dll.sc4pac`.
pub fn package_id_of_folder(name: &str) -> Option<String> {
    let caps = package_folder().captures(name)?;
    Some(format!("{}:{}", &caps[1], &caps[2]).to_lowercase())
}

/// Whether `value` has the `group:name` shape of a package id.
pub fn is_package_id(value: &str) -> bool {
    package_id_pattern().is_match(value)
}

/// Package id of the innermost `.sc4pac` folder containing `path`.
pub fn package_id(path: &Path) -> Option<String> {
    path.ancestors()
        .filter_map(|dir| dir.file_name()?.to_str())
        .find_map(package_id_of_folder)
}

/// Whether `path` is one of the game's own `SimCity_N.dat` archives.
pub fn is_core_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| core_file().is_match(name))
}

/// Installed package folders under a plugins root.
#[derive(Debug, Default, Clone)]
pub struct PackageIndex {
    folders: BTreeMap<String, PathBuf>,
}

impl PackageIndex {
    /// Look at every `<plugins>/*/*/` folder ending in `.sc4pac`.
    ///
    /// A missing plugins root gives an empty index.
    pub fn build(plugins: &Path) -> Self {
        let folders = WalkDir::new(plugins)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_dir())
            .filter_map(|e| {
                let id = package_id_of_folder(e.file_name().to_str()?)?;
                Some((id, e.into_path()))
            })
            .collect::<BTreeMap<_, _>>();
        tracing::debug!("Found {} sc4pac packages under {}", folders.len(), plugins.display());
        Self { folders }
    }

    pub fn folder(&self, id: &str) -> Option<&Path> {
        self.folders.get(id).map(PathBuf::as_path)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.folders.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.folders.keys().map(String::as_str)
    }

    /// The package ids in `dependencies` with no installed folder. Entries
    /// that are not package ids are skipped.
    pub fn unknown<'a, S: AsRef<str>>(&self, dependencies: &'a [S]) -> Vec<&'a str> {
        dependencies
            .iter()
            .map(S::as_ref)
            .filter(|dep| is_package_id(dep) && !self.contains(&dep.to_lowercase()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}
