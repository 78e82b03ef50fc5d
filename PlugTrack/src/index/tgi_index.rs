//! Position index over a flat entry list

use std::collections::HashMap;
use std::sync::Arc;

use simdbpf::{Entry, TgiQuery};

use crate::error::{Error, Result};

/// Lookup maps from TGI parts to entry positions.
///
/// Every position list is ascending, which is index order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexMaps {
    pub tgi: HashMap<(u32, u32, u32), Vec<u32>>,
    pub ti: HashMap<(u32, u32), Vec<u32>>,
    pub t: HashMap<u32, Vec<u32>>,
    pub i: HashMap<u32, Vec<u32>>,
}

impl IndexMaps {
    fn build(entries: &[Arc<Entry>]) -> Self {
        let mut maps = Self::default();
        for (pos, entry) in entries.iter().enumerate() {
            let pos = pos as u32;
            let tgi = entry.tgi();
            maps.tgi
                .entry((tgi.kind, tgi.group, tgi.instance))
                .or_default()
                .push(pos);
            maps.ti.entry((tgi.kind, tgi.instance)).or_default().push(pos);
            maps.t.entry(tgi.kind).or_default().push(pos);
            maps.i.entry(tgi.instance).or_default().push(pos);
        }
        maps
    }

    fn max_position(&self) -> Option<u32> {
        self.tgi
            .values()
            .chain(self.ti.values())
            .chain(self.t.values())
            .chain(self.i.values())
            .filter_map(|positions| positions.iter().max().copied())
            .max()
    }
}

/// Entries in override order with TGI lookup.
///
/// [`TgiIndex::find`] returns the last match, so later entries override
/// earlier ones.
#[derive(Debug, Default, Clone)]
pub struct TgiIndex {
    entries: Vec<Arc<Entry>>,
    maps: IndexMaps,
}

impl TgiIndex {
    pub fn build(entries: Vec<Arc<Entry>>) -> Self {
        let maps = IndexMaps::build(&entries);
        tracing::debug!("Indexed {} entries", entries.len());
        Self { entries, maps }
    }

    /// Restore an index from previously built maps.
    ///
    /// # Errors
    /// Returns an error if a map points past the entry list.
    pub fn from_parts(entries: Vec<Arc<Entry>>, maps: IndexMaps) -> Result<Self> {
        if let Some(max) = maps.max_position().filter(|&m| m as usize >= entries.len()) {
            return Err(Error::CorruptCache(format!(
                "index position {max} out of range for {} entries",
                entries.len()
            )));
        }
        Ok(Self { entries, maps })
    }

    pub fn entries(&self) -> &[Arc<Entry>] {
        &self.entries
    }

    pub fn maps(&self) -> &IndexMaps {
        &self.maps
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Candidate positions for a query, or `None` when only a linear scan
    /// can answer it.
    fn candidates(&self, query: &TgiQuery) -> Option<&[u32]> {
        let list = match (query.kind, query.group, query.instance) {
            (Some(t), Some(g), Some(i)) => self.maps.tgi.get(&(t, g, i)),
            (Some(t), None, Some(i)) => self.maps.ti.get(&(t, i)),
            (Some(t), _, None) => self.maps.t.get(&t),
            (None, _, Some(i)) => self.maps.i.get(&i),
            (None, _, None) => return None,
        };
        Some(list.map_or(&[][..], Vec::as_slice))
    }

    /// The overriding entry for a query: the last match in index order.
    pub fn find(&self, query: &TgiQuery) -> Option<&Arc<Entry>> {
        match self.candidates(query) {
            Some(positions) => positions
                .iter()
                .rev()
                .map(|&p| &self.entries[p as usize])
                .find(|e| query.matches(&e.tgi())),
            None => self.entries.iter().rev().find(|e| query.matches(&e.tgi())),
        }
    }

    /// Every match in index order.
    pub fn find_all(&self, query: &TgiQuery) -> Vec<&Arc<Entry>> {
        match self.candidates(query) {
            Some(positions) => positions
                .iter()
                .map(|&p| &self.entries[p as usize])
                .filter(|e| query.matches(&e.tgi()))
                .collect(),
            None => self
                .entries
                .iter()
                .filter(|e| query.matches(&e.tgi()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simdbpf::{ArchiveFile, Tgi};

    fn index(rows: &[(&str, Tgi)]) -> TgiIndex {
        let entries = rows
            .iter()
            .map(|(file, tgi)| Arc::new(Entry::new(*tgi, 0, 0, Arc::new(ArchiveFile::new(*file)))))
            .collect();
        TgiIndex::build(entries)
    }

    fn file(entry: Option<&Arc<Entry>>) -> String {
        entry.unwrap().path().to_string_lossy().into_owned()
    }

    #[test]
    fn test_last_match_wins() {
        let idx = index(&[
            ("base.dat", Tgi::new(1, 2, 3)),
            ("other.dat", Tgi::new(1, 9, 3)),
            ("user.dat", Tgi::new(1, 2, 3)),
        ]);
        assert_eq!(file(idx.find(&Tgi::new(1, 2, 3).into())), "user.dat");
        assert_eq!(file(idx.find(&TgiQuery::by_instance(3))), "user.dat");
        assert_eq!(
            file(idx.find(&TgiQuery::by_instance(3).with_group(9))),
            "other.dat"
        );
        assert!(idx.find(&TgiQuery::by_instance(4)).is_none());
    }

    #[test]
    fn test_find_all_in_index_order() {
        let idx = index(&[
            ("a.dat", Tgi::new(1, 2, 3)),
            ("b.dat", Tgi::new(5, 2, 3)),
            ("c.dat", Tgi::new(1, 7, 3)),
        ]);
        let found: Vec<String> = idx
            .find_all(&TgiQuery::by_kind(1).with_instance(3))
            .into_iter()
            .map(|e| file(Some(e)))
            .collect();
        assert_eq!(found, vec!["a.dat", "c.dat"]);

        // Group only falls back to a linear filter
        assert_eq!(idx.find_all(&TgiQuery::any().with_group(2)).len(), 2);
        assert_eq!(idx.find_all(&TgiQuery::any()).len(), 3);
        assert_eq!(idx.find_all(&TgiQuery::by_kind(1).with_group(7)).len(), 1);
    }

    #[test]
    fn test_from_parts_rejects_bad_positions() {
        let idx = index(&[("a.dat", Tgi::new(1, 2, 3))]);
        let mut maps = idx.maps().clone();
        maps.i.insert(9, vec![4]);
        let err = TgiIndex::from_parts(idx.entries().to_vec(), maps).unwrap_err();
        assert!(matches!(err, Error::CorruptCache(_)));
    }
}
