//! Building and prop families
//!
//! Lots can place a random member of a family instead of one specific
//! building or prop. Family membership is declared by the
//! `BuildingpropFamily` property, either on the exemplar itself or on one of
//! its parent cohorts.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;
use simdbpf::exemplar::{self, props};
use simdbpf::{Entry, Tgi, TgiQuery, file_types};

use crate::index::PluginIndex;

/// Family id to member TGIs, in discovery order without duplicates.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FamilyTable {
    families: HashMap<u32, Vec<Tgi>>,
}

impl FamilyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Members of a family, empty if it does not exist.
    pub fn get(&self, id: u32) -> &[Tgi] {
        self.families.get(&id).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.families.get(&id).is_some_and(|m| !m.is_empty())
    }

    pub fn insert(&mut self, id: u32, members: Vec<Tgi>) {
        self.families.insert(id, members);
    }

    fn push(&mut self, id: u32, tgi: Tgi) {
        self.families.entry(id).or_default().push(tgi);
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.families.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Drop repeated members, keeping the first occurrence.
    fn dedup(&mut self) {
        for members in self.families.values_mut() {
            let mut seen = HashSet::with_capacity(members.len());
            members.retain(|tgi| seen.insert(*tgi));
        }
    }
}

/// Family ids as stored in the record, or inherited.
type Families = Option<Arc<[u32]>>;

struct FamilyIndexer<'a> {
    index: &'a PluginIndex,
    /// Resolved families per parent cohort.
    parents: Mutex<HashMap<Tgi, Families>>,
}

impl FamilyIndexer<'_> {
    fn families(&self, entry: &Arc<Entry>, visited: &mut Vec<Tgi>) -> Families {
        let bytes = match self.index.decompress(entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to read {} in {}: {e}", entry.tgi(), entry.path().display());
                return None;
            }
        };

        let text = exemplar::is_text(&bytes);
        if mentions_family(&bytes, text) {
            match self.index.read(entry) {
                Ok(record) => {
                    let ids = record
                        .as_exemplar()
                        .and_then(|e| e.get(props::BUILDINGPROP_FAMILY))
                        .and_then(simdbpf::Value::to_u32s);
                    if let Some(ids) = ids {
                        return Some(ids.into());
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse exemplar {} in {}: {e}",
                        entry.tgi(),
                        entry.path().display()
                    );
                    return None;
                }
            }
        }

        let parent = if text {
            self.index
                .read(entry)
                .ok()
                .and_then(|record| record.as_exemplar().and_then(|e| e.parent()))
        } else {
            binary_parent(&bytes)
        }?;
        self.parent_families(parent, visited)
    }

    fn parent_families(&self, parent: Tgi, visited: &mut Vec<Tgi>) -> Families {
        if let Some(known) = self.lock().get(&parent) {
            return known.clone();
        }
        if visited.contains(&parent) {
            tracing::debug!("Parent cohort cycle at {parent}");
            return None;
        }
        let entry = self.index.find(&TgiQuery::exact(parent))?;

        visited.push(parent);
        let families = self.families(&entry, visited);
        visited.pop();

        self.lock().insert(parent, families.clone());
        families
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Tgi, Families>> {
        self.parents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whether the raw record could contain the family property.
fn mentions_family(bytes: &[u8], text: bool) -> bool {
    if text {
        let needle = format!("0x{:08x}", props::BUILDINGPROP_FAMILY);
        let haystack = String::from_utf8_lossy(bytes).to_lowercase();
        haystack.contains(&needle)
    } else {
        let needle = props::BUILDINGPROP_FAMILY.to_le_bytes();
        bytes.windows(needle.len()).any(|w| w == needle)
    }
}

/// Parent cohort of a binary exemplar, read straight after the signature.
fn binary_parent(bytes: &[u8]) -> Option<Tgi> {
    let word = |at: usize| -> Option<u32> {
        let raw: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
        Some(u32::from_le_bytes(raw))
    };
    let tgi = Tgi::new(word(8)?, word(12)?, word(16)?);
    (!tgi.is_null()).then_some(tgi)
}

/// Index every family in the plugin index.
///
/// Lot configuration exemplars never declare families and are skipped.
/// Records that fail to read are logged and skipped.
pub fn build(index: &PluginIndex, pool: &rayon::ThreadPool) -> FamilyTable {
    let candidates: Vec<&Arc<Entry>> = index
        .entries()
        .iter()
        .filter(|e| e.kind() == file_types::EXEMPLAR && e.group() != props::LOT_CONFIGURATIONS_GROUP)
        .collect();
    tracing::debug!("Scanning {} exemplars for families", candidates.len());

    let indexer = FamilyIndexer {
        index,
        parents: Mutex::new(HashMap::new()),
    };
    let found: Vec<(Tgi, Families)> = pool.install(|| {
        candidates
            .par_iter()
            .map(|entry| (entry.tgi(), indexer.families(entry, &mut vec![entry.tgi()])))
            .collect()
    });

    let mut table = FamilyTable::new();
    for (tgi, families) in found {
        for id in families.iter().flat_map(|ids| ids.iter()) {
            if *id != 0 {
                table.push(*id, tgi);
            }
        }
    }
    table.dedup();
    tracing::info!("Indexed {} families", table.len());
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let mut table = FamilyTable::new();
        let (a, b) = (Tgi::new(1, 2, 3), Tgi::new(1, 2, 4));
        for tgi in [a, b, a, b, a] {
            table.push(7, tgi);
        }
        table.dedup();
        assert_eq!(table.get(7), &[a, b]);
        assert!(table.get(8).is_empty());
        assert!(!table.contains(8));
    }

    #[test]
    fn test_mentions_family() {
        let mut binary = b"EQZB1###".to_vec();
        binary.extend_from_slice(&[0x70, 0x28, 0x81, 0x27]);
        assert!(mentions_family(&binary, false));
        assert!(!mentions_family(b"EQZB1###\0\0\0\0", false));
        assert!(mentions_family(b"EQZT1###\n0x27812870:{\"Family\"}", true));
        assert!(mentions_family(b"EQZT1###\n0X27812870:{\"Family\"}", true));
    }

    #[test]
    fn test_binary_parent_offsets() {
        let mut bytes = b"EQZB1###".to_vec();
        for word in [0x05342861u32, 0x11, 0x22] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        assert_eq!(binary_parent(&bytes), Some(Tgi::new(0x05342861, 0x11, 0x22)));
        assert_eq!(binary_parent(&[0u8; 20]), None);
        assert_eq!(binary_parent(b"short"), None);
    }
}
