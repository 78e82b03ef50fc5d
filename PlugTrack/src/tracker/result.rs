//! Aggregated outcome of a tracking run

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use simdbpf::{TgiQuery, file_types};

use crate::package;

use super::context::{ContextOutput, SourceError};
use super::dependency::{Dependency, DependencyGraph, MissingEntry, MissingKind, NodeId};

/// How a result is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Package list, other files and missing records.
    #[default]
    Sc4pac,
    /// Every root record with everything it references.
    Tree,
}

/// Missing records with the same lookup, and every file that needs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingGroup {
    pub kind: MissingKind,
    pub query: TgiQuery,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackingResult {
    pub installation: Option<PathBuf>,
    pub plugins: Option<PathBuf>,
    /// Source files, sorted.
    pub scanned: Vec<PathBuf>,
    /// Files the sources depend on, sorted. Sources are never listed.
    pub files: Vec<PathBuf>,
    /// sc4pac packages of `files`.
    pub packages: Vec<String>,
    /// Exemplar records nothing else refers to, sorted.
    pub tree: Vec<NodeId>,
    pub missing: Vec<MissingEntry>,
    pub errors: Vec<SourceError>,
    #[serde(rename = "dependencies")]
    pub graph: DependencyGraph,
    /// Records decoded during the run.
    #[serde(skip)]
    pub decoded: usize,
}

impl TrackingResult {
    pub fn new(
        output: ContextOutput,
        installation: Option<PathBuf>,
        plugins: Option<PathBuf>,
        exclude_packages: &[String],
    ) -> Self {
        let ContextOutput {
            sources,
            touched,
            graph,
            mut missing,
            mut errors,
            decoded,
        } = output;

        let inputs: HashSet<&PathBuf> = sources.iter().collect();
        let files: Vec<PathBuf> = touched
            .into_iter()
            .filter(|file| !inputs.contains(file))
            .collect();

        let packages: Vec<String> = files
            .iter()
            .filter_map(|file| package::package_id(file))
            .filter(|id| !exclude_packages.contains(id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let tree = roots(&graph);

        missing.sort();
        missing.dedup();
        errors.sort_by(|a, b| a.file.cmp(&b.file));

        Self {
            installation,
            plugins,
            scanned: sources,
            files,
            packages,
            tree,
            missing,
            errors,
            graph,
            decoded,
        }
    }

    /// Missing records grouped by what was looked for.
    pub fn missing_groups(&self) -> Vec<MissingGroup> {
        let mut groups: BTreeMap<(MissingKind, TgiQuery), BTreeSet<&Path>> = BTreeMap::new();
        for row in &self.missing {
            groups
                .entry((row.kind, row.query))
                .or_default()
                .insert(&row.file);
        }
        groups
            .into_iter()
            .map(|((kind, query), files)| MissingGroup {
                kind,
                query,
                files: files.into_iter().map(Path::to_path_buf).collect(),
            })
            .collect()
    }

    /// Files that belong neither to the installation nor to an sc4pac
    /// package, relative to the plugins folder when inside it.
    pub fn other_files(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|file| {
                !self
                    .installation
                    .as_ref()
                    .is_some_and(|root| file.starts_with(root))
            })
            .filter(|file| file.parent().and_then(package::package_id).is_none())
            .map(|file| {
                self.plugins
                    .as_ref()
                    .and_then(|root| file.strip_prefix(root).ok())
                    .unwrap_or(file.as_path())
                    .to_path_buf()
            })
            .collect()
    }

    /// Whether every source failed to open.
    pub fn all_sources_failed(&self) -> bool {
        !self.scanned.is_empty() && self.errors.len() == self.scanned.len()
    }
}

/// Exemplar-typed lots and exemplars that are not linked from any node.
fn roots(graph: &DependencyGraph) -> Vec<NodeId> {
    let children: HashSet<&NodeId> = graph
        .nodes()
        .flat_map(Dependency::links)
        .flat_map(|link| link.ids())
        .collect();
    // Graph iteration is ordered by id, so the roots come out sorted.
    graph
        .nodes()
        .filter(|node| matches!(node, Dependency::Lot(_) | Dependency::Exemplar(_)))
        .map(Dependency::id)
        .filter(|id| id.tgi.kind == file_types::EXEMPLAR && !children.contains(id))
        .cloned()
        .collect()
}
