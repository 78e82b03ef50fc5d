//! Resolved dependency graph
//!
//! Nodes live in a map keyed by [`NodeId`] and refer to each other by id, so
//! records that reference each other in a loop form a cycle in the map
//! instead of an infinitely deep tree.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use simdbpf::{Entry, LotObjectKind, Tgi, TgiQuery};

/// A record in a specific file.
///
/// Two archives can hold the same TGI, so the file is part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId {
    pub tgi: Tgi,
    pub file: PathBuf,
}

impl NodeId {
    pub fn of(entry: &Entry) -> Self {
        Self {
            tgi: entry.tgi(),
            file: entry.path().to_path_buf(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// Reference from one node to another.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Link {
    /// A resolved record, see [`DependencyGraph::get`].
    Resource(NodeId),
    /// A set of alternatives, any of which can be placed.
    Family(FamilyNode),
    /// Nothing in the index matched.
    Missing(MissingRef),
}

impl Link {
    pub fn id(&self) -> Option<&NodeId> {
        match self {
            Link::Resource(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Link::Missing(_))
    }

    /// Resolved records this link refers to, including family members.
    pub fn ids(&self) -> Vec<&NodeId> {
        match self {
            Link::Resource(id) => vec![id],
            Link::Family(family) => family.members.iter().flat_map(Link::ids).collect(),
            Link::Missing(_) => Vec::new(),
        }
    }
}

/// Building or prop family, or several IIDs of one lot object (id 0).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyNode {
    pub id: u32,
    pub members: Vec<Link>,
}

/// The lookup that found nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MissingRef {
    pub query: TgiQuery,
}

/// Exemplar property that names another record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedLink {
    pub name: &'static str,
    pub link: Link,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LotNode {
    pub id: NodeId,
    pub name: Option<String>,
    pub foundation: Option<Link>,
    pub buildings: Vec<Link>,
    pub textures: Vec<Link>,
    pub props: Vec<Link>,
    pub flora: Vec<Link>,
    pub parent: Option<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExemplarNode {
    pub id: NodeId,
    pub exemplar_type: Option<u32>,
    pub name: Option<String>,
    pub models: Vec<Link>,
    pub props: Vec<NamedLink>,
    pub parent: Option<Link>,
}

/// A resolved record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dependency {
    Lot(LotNode),
    Exemplar(ExemplarNode),
    Texture { id: NodeId },
    Raw { id: NodeId },
}

impl Dependency {
    pub fn id(&self) -> &NodeId {
        match self {
            Dependency::Lot(lot) => &lot.id,
            Dependency::Exemplar(exemplar) => &exemplar.id,
            Dependency::Texture { id } | Dependency::Raw { id } => id,
        }
    }

    /// Outgoing links in display order.
    pub fn links(&self) -> Vec<&Link> {
        match self {
            Dependency::Lot(lot) => lot
                .foundation
                .iter()
                .chain(&lot.buildings)
                .chain(&lot.textures)
                .chain(&lot.props)
                .chain(&lot.flora)
                .chain(&lot.parent)
                .collect(),
            Dependency::Exemplar(exemplar) => exemplar
                .models
                .iter()
                .chain(exemplar.props.iter().map(|p| &p.link))
                .chain(&exemplar.parent)
                .collect(),
            Dependency::Texture { .. } | Dependency::Raw { .. } => Vec::new(),
        }
    }
}

/// Every node resolved during one tracking run.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<NodeId, Dependency>,
}

// Ids are not strings, so the graph is written as a list of nodes.
impl Serialize for DependencyGraph {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.nodes.values())
    }
}

impl DependencyGraph {
    pub(crate) fn insert(&mut self, node: Dependency) {
        self.nodes.insert(node.id().clone(), node);
    }

    pub fn get(&self, id: &NodeId) -> Option<&Dependency> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Dependency> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// What a missing record was needed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingKind {
    Building,
    Prop,
    Texture,
    Flora,
    Foundation,
    Model,
    Parent,
}

impl MissingKind {
    /// Kind of a lot object lookup. Only objects that carry IIDs have one.
    pub fn of_lot_object(kind: LotObjectKind) -> Option<Self> {
        match kind {
            LotObjectKind::Building => Some(Self::Building),
            LotObjectKind::Prop => Some(Self::Prop),
            LotObjectKind::Texture => Some(Self::Texture),
            LotObjectKind::Flora => Some(Self::Flora),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Building => "Building",
            Self::Prop => "Prop",
            Self::Texture => "Texture",
            Self::Flora => "Flora",
            Self::Foundation => "Foundation",
            Self::Model => "Model",
            Self::Parent => "Parent",
        }
    }
}

impl fmt::Display for MissingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lookup that found nothing, and who asked for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MissingEntry {
    pub kind: MissingKind,
    pub query: TgiQuery,
    /// File of the record that made the reference.
    pub file: PathBuf,
    /// The record that made the reference.
    pub parent: Tgi,
}
