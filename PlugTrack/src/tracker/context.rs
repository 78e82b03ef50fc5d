//! State of one tracking run and the resolution rules

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rayon::prelude::*;
use simdbpf::exemplar::props::{self, exemplar_type};
use simdbpf::{Archive, Entry, Exemplar, LotObject, LotObjectKind, TgiQuery, file_types};

use crate::index::PluginIndex;
use crate::package;

use super::dependency::{
    Dependency, DependencyGraph, ExemplarNode, FamilyNode, Link, LotNode, MissingEntry, MissingKind,
    MissingRef, NamedLink, NodeId,
};

/// Group of the PNG icons shown in menus.
const ICON_GROUP: u32 = 0x6A386D26;

/// A source file that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SourceError {
    pub file: PathBuf,
    pub message: String,
}

#[derive(Debug)]
enum Slot {
    /// Claimed by a worker that is still decoding it.
    Pending,
    Resolved(Dependency),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Everything a tracking run collects.
///
/// A context resolves every record at most once. Records that are requested
/// again, including while they are still being resolved, are returned as a
/// link without waiting, so reference cycles end immediately.
pub struct TrackingContext<'a> {
    index: &'a PluginIndex,
    sources: HashSet<PathBuf>,
    dependencies: HashSet<String>,
    memo: Mutex<HashMap<NodeId, Slot>>,
    touched: Mutex<BTreeSet<PathBuf>>,
    missing: Mutex<Vec<MissingEntry>>,
    errors: Mutex<Vec<SourceError>>,
    decoded: AtomicUsize,
}

/// What a finished context hands to the result.
#[derive(Debug, Default)]
pub struct ContextOutput {
    pub sources: Vec<PathBuf>,
    pub touched: BTreeSet<PathBuf>,
    pub graph: DependencyGraph,
    pub missing: Vec<MissingEntry>,
    pub errors: Vec<SourceError>,
    pub decoded: usize,
}

impl<'a> TrackingContext<'a> {
    /// A context for the given sources. `dependencies` are package ids or
    /// paths whose records are preferred when several match.
    pub fn new(index: &'a PluginIndex, sources: &[PathBuf], dependencies: &[String]) -> Self {
        Self {
            index,
            sources: sources.iter().cloned().collect(),
            dependencies: dependencies.iter().cloned().collect(),
            memo: Mutex::new(HashMap::new()),
            touched: Mutex::new(BTreeSet::new()),
            missing: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            decoded: AtomicUsize::new(0),
        }
    }

    /// Resolve every record of every source on the pool.
    pub fn run(&self, pool: &rayon::ThreadPool) {
        let mut sources: Vec<&PathBuf> = self.sources.iter().collect();
        sources.sort();
        pool.install(|| {
            sources.par_iter().for_each(|file| self.track_file(file));
        });
    }

    fn track_file(&self, file: &Path) {
        let archive = match Archive::open(file) {
            Ok(archive) => archive,
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}", file.display());
                lock(&self.errors).push(SourceError {
                    file: file.to_path_buf(),
                    message: e.to_string(),
                });
                return;
            }
        };
        tracing::debug!("Tracking {} records in {}", archive.entries().len(), file.display());
        archive.entries().par_iter().for_each(|entry| {
            self.resource(entry);
        });
    }

    /// Number of records decoded so far.
    pub fn decoded(&self) -> usize {
        self.decoded.load(Ordering::Relaxed)
    }

    pub fn finish(self) -> ContextOutput {
        let mut graph = DependencyGraph::default();
        for slot in self.memo.into_inner().unwrap_or_else(PoisonError::into_inner).into_values() {
            if let Slot::Resolved(node) = slot {
                graph.insert(node);
            }
        }
        let mut sources: Vec<PathBuf> = self.sources.into_iter().collect();
        sources.sort();
        ContextOutput {
            sources,
            touched: self.touched.into_inner().unwrap_or_else(PoisonError::into_inner),
            graph,
            missing: self.missing.into_inner().unwrap_or_else(PoisonError::into_inner),
            errors: self.errors.into_inner().unwrap_or_else(PoisonError::into_inner),
            decoded: self.decoded.into_inner(),
        }
    }

    // ==================== Lookup ====================

    fn is_source(&self, file: &Path) -> bool {
        self.sources.contains(file)
    }

    fn is_explicit(&self, file: &Path) -> bool {
        match package::package_id(file) {
            Some(id) => self.dependencies.contains(&id),
            None => self.dependencies.contains(file.to_string_lossy().as_ref()),
        }
    }

    /// The best match for a query.
    ///
    /// Records from the sources come first, then records from explicit
    /// dependencies, then index order. Index order puts the installation
    /// before plugins, so a plugin overriding a game record is not picked
    /// up as a dependency.
    pub fn find_with_priority(
        &self,
        query: &TgiQuery,
        filter: impl Fn(&Entry) -> bool,
    ) -> Option<Arc<Entry>> {
        let mut candidates: Vec<Arc<Entry>> = self
            .index
            .find_all(query)
            .into_iter()
            .filter(|e| filter(e.as_ref()))
            .collect();
        candidates.sort_by_key(|e| (!self.is_source(e.path()), !self.is_explicit(e.path())));
        candidates.into_iter().next()
    }

    fn missing(&self, kind: Option<MissingKind>, from: &Entry, query: TgiQuery) -> Link {
        if let Some(kind) = kind {
            lock(&self.missing).push(MissingEntry {
                kind,
                query,
                file: from.path().to_path_buf(),
                parent: from.tgi(),
            });
        }
        Link::Missing(MissingRef { query })
    }

    // ==================== Resolution ====================

    /// Claim a node. Only the first caller gets `true`.
    fn claim(&self, id: &NodeId) -> bool {
        let mut memo = lock(&self.memo);
        if memo.contains_key(id) {
            false
        } else {
            memo.insert(id.clone(), Slot::Pending);
            true
        }
    }

    /// Resolve a record and link to it.
    pub fn resource(&self, entry: &Arc<Entry>) -> Link {
        lock(&self.touched).insert(entry.path().to_path_buf());
        let id = NodeId::of(entry);
        if self.claim(&id) {
            let node = self.resolve(entry, id.clone());
            lock(&self.memo).insert(id.clone(), Slot::Resolved(node));
        }
        Link::Resource(id)
    }

    fn resolve(&self, entry: &Arc<Entry>, id: NodeId) -> Dependency {
        match entry.kind() {
            kind if file_types::is_exemplar_like(kind) => {
                self.decoded.fetch_add(1, Ordering::Relaxed);
                match self.index.read(entry) {
                    Ok(record) => match record.as_exemplar() {
                        Some(exemplar) => self.exemplar(entry, id, exemplar),
                        None => Dependency::Raw { id },
                    },
                    Err(e) => {
                        tracing::warn!(
                            "Failed to decode {} in {}: {e}",
                            entry.tgi(),
                            entry.path().display()
                        );
                        Dependency::Raw { id }
                    }
                }
            }
            file_types::FSH => Dependency::Texture { id },
            _ => Dependency::Raw { id },
        }
    }

    fn exemplar(&self, entry: &Arc<Entry>, id: NodeId, exemplar: &Exemplar) -> Dependency {
        if exemplar.get_u32(props::EXEMPLAR_TYPE) == Some(exemplar_type::LOT_CONFIGURATIONS) {
            Dependency::Lot(self.lot(entry, id, exemplar))
        } else {
            Dependency::Exemplar(self.plain_exemplar(entry, id, exemplar))
        }
    }

    fn parent(&self, entry: &Entry, exemplar: &Exemplar) -> Option<Link> {
        let parent = exemplar.parent()?;
        let query = TgiQuery::exact(parent);
        Some(match self.find_with_priority(&query, |_| true) {
            Some(found) => self.resource(&found),
            None => self.missing(Some(MissingKind::Parent), entry, query),
        })
    }

    fn lot(&self, entry: &Arc<Entry>, id: NodeId, exemplar: &Exemplar) -> LotNode {
        let foundation = exemplar
            .get_u32(props::BUILDING_FOUNDATION)
            .filter(|&instance| instance != 0)
            .map(|instance| {
                let query = TgiQuery::by_instance(instance);
                match self.find_with_priority(&query, |_| true) {
                    Some(found) => self.resource(&found),
                    None => self.missing(Some(MissingKind::Foundation), entry, query),
                }
            });

        let mut lot = LotNode {
            id,
            name: exemplar.get_str(props::EXEMPLAR_NAME).map(ToString::to_string),
            foundation,
            buildings: Vec::new(),
            textures: Vec::new(),
            props: Vec::new(),
            flora: Vec::new(),
            parent: None,
        };

        for object in exemplar.lot_objects() {
            let list = match object.kind {
                LotObjectKind::Building => &mut lot.buildings,
                LotObjectKind::Prop => &mut lot.props,
                LotObjectKind::Texture => &mut lot.textures,
                LotObjectKind::Flora => &mut lot.flora,
                LotObjectKind::Network => {
                    self.network(&object);
                    continue;
                }
                _ => continue,
            };
            if let Some(link) = self.lot_object(entry, &object) {
                list.push(link);
            }
        }

        lot.parent = self.parent(entry, exemplar);
        lot
    }

    /// Networks are tracked but not shown on the lot.
    fn network(&self, object: &LotObject) {
        let Some(iid) = object.iid().filter(|&iid| iid != 0) else {
            return;
        };
        for found in self.index.find_all(&TgiQuery::by_instance(iid)) {
            self.resource(&found);
        }
    }

    fn lot_object(&self, entry: &Entry, object: &LotObject) -> Option<Link> {
        let mut links: Vec<Link> = object
            .iids
            .iter()
            .map(|&iid| self.lot_iid(entry, object.kind, iid))
            .collect();
        match links.len() {
            0 => None,
            1 => links.pop(),
            _ => Some(Link::Family(FamilyNode { id: 0, members: links })),
        }
    }

    fn lot_iid(&self, entry: &Entry, kind: LotObjectKind, iid: u32) -> Link {
        let families = matches!(
            kind,
            LotObjectKind::Building | LotObjectKind::Prop | LotObjectKind::Flora
        );
        if families && self.index.families().contains(iid) {
            return self.family(iid);
        }

        let record_type = if kind == LotObjectKind::Texture {
            file_types::FSH
        } else {
            file_types::EXEMPLAR
        };
        let query = TgiQuery::by_kind(record_type).with_instance(iid);
        match self.find_with_priority(&query, |e| e.group() != props::LOT_CONFIGURATIONS_GROUP) {
            Some(found) => self.resource(&found),
            None => self.missing(MissingKind::of_lot_object(kind), entry, query),
        }
    }

    /// All members of a family. Families that mix game and plugin records
    /// keep only the game records.
    fn family(&self, id: u32) -> Link {
        let members: Vec<Arc<Entry>> = self
            .index
            .family(id)
            .iter()
            .filter_map(|tgi| self.find_with_priority(&TgiQuery::exact(*tgi), |_| true))
            .collect();
        let core: Vec<&Arc<Entry>> = members
            .iter()
            .filter(|e| package::is_core_file(e.path()))
            .collect();
        let chosen: Vec<&Arc<Entry>> = if !core.is_empty() && core.len() < members.len() {
            core
        } else {
            members.iter().collect()
        };
        Link::Family(FamilyNode {
            id,
            members: chosen.into_iter().map(|e| self.resource(e)).collect(),
        })
    }

    fn plain_exemplar(&self, entry: &Arc<Entry>, id: NodeId, exemplar: &Exemplar) -> ExemplarNode {
        let mut models = Vec::new();
        let mut seen = HashSet::new();
        for tgi in resource_keys(exemplar) {
            if tgi.instance == 0 || !seen.insert(tgi) {
                continue;
            }
            let query = TgiQuery::exact(tgi);
            let link = match self.find_with_priority(&query, |_| true) {
                Some(found) => self.resource(&found),
                None => self.missing(Some(MissingKind::Model), entry, query),
            };
            if !models.contains(&link) {
                models.push(link);
            }
        }

        let named = NAMED_PROPERTIES
            .iter()
            .filter_map(|property| {
                let query = property.query(exemplar)?;
                let link = match self.find_with_priority(&query, |_| true) {
                    Some(found) => self.resource(&found),
                    None => self.missing(None, entry, query),
                };
                Some(NamedLink {
                    name: property.name,
                    link,
                })
            })
            .collect();

        ExemplarNode {
            id,
            exemplar_type: exemplar.get_u32(props::EXEMPLAR_TYPE),
            name: exemplar.get_str(props::EXEMPLAR_NAME).map(ToString::to_string),
            models,
            props: named,
            parent: self.parent(entry, exemplar),
        }
    }
}

/// Models named by the resource key properties.
///
/// A 3-value key is a single TGI. Longer keys hold 8-value records with the
/// TGI in the last three slots.
fn resource_keys(exemplar: &Exemplar) -> Vec<simdbpf::Tgi> {
    let mut out = Vec::new();
    for key in props::RESOURCE_KEY_TYPES {
        let Some(values) = exemplar.get(key).and_then(simdbpf::Value::to_u32s) else {
            continue;
        };
        if values.len() == 3 {
            out.extend(simdbpf::Tgi::from_slice(&values));
        } else if values.len() >= 8 {
            out.extend(
                values
                    .chunks_exact(8)
                    .filter_map(|record| simdbpf::Tgi::from_slice(&record[5..8])),
            );
        }
    }
    out
}

/// Exemplar property that refers to another record by instance or TGI.
struct NamedProperty {
    name: &'static str,
    key: u32,
    hint: TgiQuery,
}

const NAMED_PROPERTIES: [NamedProperty; 7] = [
    NamedProperty {
        name: "UserVisibleNameKey",
        key: props::USER_VISIBLE_NAME_KEY,
        hint: TgiQuery::by_kind(file_types::LTEXT),
    },
    NamedProperty {
        name: "ItemIcon",
        key: props::ITEM_ICON,
        hint: TgiQuery::by_kind(file_types::PNG).with_group(ICON_GROUP),
    },
    NamedProperty {
        name: "QueryExemplarGUID",
        key: props::QUERY_EXEMPLAR_GUID,
        hint: TgiQuery::by_kind(0),
    },
    NamedProperty {
        name: "SFXQuerySound",
        key: props::SFX_QUERY_SOUND,
        hint: TgiQuery::by_kind(file_types::SOUND),
    },
    NamedProperty {
        name: "SFXDefaultPlopSound",
        key: props::SFX_DEFAULT_PLOP_SOUND,
        hint: TgiQuery::by_kind(file_types::SOUND),
    },
    NamedProperty {
        name: "SFXAmbienceGoodSound",
        key: props::SFX_AMBIENCE_GOOD_SOUND,
        hint: TgiQuery::by_kind(file_types::SOUND),
    },
    NamedProperty {
        name: "SFXActivateSound",
        key: props::SFX_ACTIVATE_SOUND,
        hint: TgiQuery::by_kind(file_types::ACTIVATE_SOUND),
    },
];

impl NamedProperty {
    /// The lookup for this property, or `None` when it is absent, a string,
    /// has an unexpected shape, or points at instance 0.
    fn query(&self, exemplar: &Exemplar) -> Option<TgiQuery> {
        let values = exemplar.get(self.key)?.to_u32s()?;
        let query = match values.as_slice() {
            [instance] => self.hint.with_instance(*instance),
            [kind, group, instance] => TgiQuery::exact(simdbpf::Tgi::new(*kind, *group, *instance)),
            _ => return None,
        };
        query.instance.filter(|&i| i != 0).map(|_| query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simdbpf::{Tgi, Value};

    #[test]
    fn test_resource_keys_shapes() {
        let mut exemplar = Exemplar::new();
        exemplar.set(props::RESOURCE_KEY_TYPES[0], Value::Uint32(vec![1, 2, 3]));
        let mut rkt4 = vec![0u32; 16];
        rkt4[5..8].copy_from_slice(&[4, 5, 6]);
        rkt4[13..16].copy_from_slice(&[7, 8, 9]);
        exemplar.set(props::RESOURCE_KEY_TYPES[4], Value::Uint32(rkt4));
        exemplar.set(props::RESOURCE_KEY_TYPES[5], Value::Uint32(vec![1, 2]));

        assert_eq!(
            resource_keys(&exemplar),
            vec![Tgi::new(1, 2, 3), Tgi::new(4, 5, 6), Tgi::new(7, 8, 9)]
        );
    }

    #[test]
    fn test_named_property_queries() {
        let name = &NAMED_PROPERTIES[0];
        let icon = &NAMED_PROPERTIES[1];
        let mut exemplar = Exemplar::new();
        assert_eq!(name.query(&exemplar), None);

        exemplar.set(props::USER_VISIBLE_NAME_KEY, Value::Uint32(vec![9, 8, 7]));
        assert_eq!(name.query(&exemplar), Some(TgiQuery::exact(Tgi::new(9, 8, 7))));

        exemplar.set(props::ITEM_ICON, Value::Uint32(vec![0x42]));
        assert_eq!(
            icon.query(&exemplar),
            Some(TgiQuery::by_kind(file_types::PNG).with_group(ICON_GROUP).with_instance(0x42))
        );

        exemplar.set(props::ITEM_ICON, Value::Uint32(vec![0]));
        assert_eq!(icon.query(&exemplar), None);
        exemplar.set(props::USER_VISIBLE_NAME_KEY, Value::String("Shop".into()));
        assert_eq!(name.query(&exemplar), None);
    }

    #[test]
    fn test_sound_property_queries() {
        let find = |key| NAMED_PROPERTIES.iter().find(|p| p.key == key).unwrap();
        let mut exemplar = Exemplar::new();
        exemplar.set(props::SFX_QUERY_SOUND, Value::Uint32(vec![0x10]));
        exemplar.set(props::SFX_ACTIVATE_SOUND, Value::Uint32(vec![0x20]));

        assert_eq!(
            find(props::SFX_QUERY_SOUND).query(&exemplar),
            Some(TgiQuery::by_kind(file_types::SOUND).with_instance(0x10))
        );
        assert_eq!(
            find(props::SFX_ACTIVATE_SOUND).query(&exemplar),
            Some(TgiQuery::by_kind(file_types::ACTIVATE_SOUND).with_instance(0x20))
        );
        assert_eq!(find(props::SFX_DEFAULT_PLOP_SOUND).query(&exemplar), None);
    }
}
