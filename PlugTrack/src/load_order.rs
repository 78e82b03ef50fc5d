//! Game load order for plugin files
//!
//! The game loads files folder by folder. Within one folder, files with the
//! `.dat` extension load after every other file; otherwise names compare
//! case-insensitively. Files in a folder load before the folder's
//! subfolders. A resource loaded later overrides one loaded earlier.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Sort key implementing the load order for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadKey {
    segments: Vec<String>,
    original: String,
}

impl LoadKey {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::parse_path(&path.as_ref().to_string_lossy())
    }

    fn parse_path(path: &str) -> Self {
        Self {
            segments: path
                .to_uppercase()
                .split(['/', '\\'])
                .map(String::from)
                .collect(),
            original: path.to_string(),
        }
    }

    fn is_dat(&self) -> bool {
        self.segments.last().is_some_and(|s| s.ends_with(".DAT"))
    }
}

impl Ord for LoadKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (&self.segments, &other.segments);
        let shared = a.len().min(b.len()).saturating_sub(1);

        // Folders both paths go through
        for i in 0..shared {
            match a[i].cmp(&b[i]) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }

        let ord = if a.len() == b.len() {
            // Same folder: .dat files come last
            self.is_dat()
                .cmp(&other.is_dat())
                .then_with(|| a.last().cmp(&b.last()))
        } else {
            // Files in a folder load before its subfolders
            a.len().cmp(&b.len())
        };

        ord.then_with(|| self.original.cmp(&other.original))
    }
}

impl PartialOrd for LoadKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two paths in load order.
pub fn compare(a: &str, b: &str) -> Ordering {
    LoadKey::parse_path(a).cmp(&LoadKey::parse_path(b))
}

/// Sort paths into load order, first loaded first.
pub fn sort(paths: &mut [PathBuf]) {
    paths.sort_by_cached_key(|path| LoadKey::new(path));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn check(expected: &[&str]) {
        let mut shuffled: Vec<&str> = expected.iter().rev().copied().collect();
        shuffled.sort_by(|a, b| compare(a, b));
        assert_eq!(shuffled, expected);

        let mut paths: Vec<PathBuf> = expected.iter().rev().map(PathBuf::from).collect();
        sort(&mut paths);
        let expected_paths: Vec<PathBuf> = expected.iter().map(PathBuf::from).collect();
        assert_eq!(paths, expected_paths);
    }

    #[test]
    fn test_dat_files_load_last_in_folder() {
        check(&["b.SC4Lot", "a.dat"]);
    }

    #[test]
    fn test_files_before_subfolders() {
        check(&["b.dat", "a/foo.dat"]);
    }

    #[test]
    fn test_case_insensitive_names() {
        check(&["a.dat", "Z.dat"]);
    }

    #[test]
    fn test_nested_folders() {
        check(&[
            "a/file.dat",
            "a/nested/file.dat",
            "B/file.SC4Lot",
            "B/nested/file.dat",
        ]);
    }

    #[test]
    fn test_full_reference_order() {
        check(&[
            "z.SC4Lot",
            "k.dat",
            "L.dat",
            "a/file.dat",
            "a/subfolder/file.dat",
            "B/zz_file.dat",
            "B/subfolder/file.dat",
            "B/subfolder/deeper/file.dat",
        ]);
    }

    #[test]
    fn test_backslashes_split_like_slashes() {
        assert_eq!(compare("a\\b.dat", "a/b.dat"), Ordering::Greater);
        assert_eq!(compare("a\\z.SC4Lot", "a/b.dat"), Ordering::Less);
    }

    #[test]
    fn test_total_order() {
        assert_eq!(compare("A.dat", "a.dat"), Ordering::Less);
        assert_eq!(compare("a.dat", "a.dat"), Ordering::Equal);
    }
}
