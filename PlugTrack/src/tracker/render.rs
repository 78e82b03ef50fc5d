//! Terminal rendering of tracking results

use std::path::{Path, PathBuf};

use console::{measure_text_width, style};
use simdbpf::exemplar::props::exemplar_type_label;
use simdbpf::{Tgi, TgiQuery, file_types};

use super::dependency::{Dependency, DependencyGraph, ExemplarNode, Link, LotNode, NodeId};
use super::result::{Format, TrackingResult};

/// Lines are padded to this width before the file name.
pub const DEFAULT_WIDTH: usize = 150;

/// Longest file path shown in the missing table.
const MAX_FILE_WIDTH: usize = 100;

fn hex(value: u32) -> String {
    format!("0x{value:08x}")
}

fn yellow_hex(value: u32) -> String {
    style(hex(value)).yellow().to_string()
}

/// The instance alone when the group is 0, the full TGI otherwise.
fn tgi_label(tgi: Tgi) -> String {
    if tgi.group == 0 {
        yellow_hex(tgi.instance)
    } else {
        [tgi.kind, tgi.group, tgi.instance]
            .map(yellow_hex)
            .join("-")
    }
}

fn query_label(query: &TgiQuery) -> String {
    match (query.kind, query.group, query.instance) {
        (Some(kind), Some(group), Some(instance)) if group != 0 => {
            tgi_label(Tgi::new(kind, group, instance))
        }
        (_, _, Some(instance)) => yellow_hex(instance),
        _ => String::new(),
    }
}

fn indent(level: usize) -> String {
    " ".repeat(2 * level)
}

fn shorten(path: &Path) -> String {
    let text = path.display().to_string();
    let chars = text.chars().count();
    if chars > MAX_FILE_WIDTH {
        let tail: String = text.chars().skip(chars - (MAX_FILE_WIDTH - 3)).collect();
        format!("...{tail}")
    } else {
        text
    }
}

/// Tree printer. Tracks the current path so that a node referring back to
/// one of its ancestors is printed once and not expanded.
struct TreeWriter<'a> {
    graph: &'a DependencyGraph,
    width: usize,
    path: Vec<&'a NodeId>,
    lines: Vec<String>,
}

impl<'a> TreeWriter<'a> {
    /// `line` padded to the width, followed by the file name or "Not found".
    fn push(&mut self, mut line: String, file: Option<&Path>) {
        let name = file
            .and_then(Path::file_name)
            .map_or_else(|| "Not found".to_string(), |n| n.to_string_lossy().into_owned());
        let spaces = self
            .width
            .saturating_sub(measure_text_width(&line) + name.chars().count());
        let name = if file.is_some() {
            style(name).cyan()
        } else {
            style(name).red()
        };
        line.push_str(&" ".repeat(spaces));
        line.push_str(&name.to_string());
        self.lines.push(line);
    }

    fn heading(&mut self, level: usize, text: &str) {
        self.lines.push(format!("{}{}", indent(level), style(text).green()));
    }

    fn root(&mut self, id: &'a NodeId) {
        self.node(id, 0, true);
    }

    fn node(&mut self, id: &'a NodeId, level: usize, root: bool) {
        if self.path.contains(&id) {
            let line = format!("{}{} {}", indent(level), tgi_label(id.tgi), style("(cycle)").dim());
            self.push(line, Some(id.file()));
            return;
        }
        let Some(node) = self.graph.get(id) else {
            self.push(format!("{}{}", indent(level), tgi_label(id.tgi)), Some(id.file()));
            return;
        };

        self.path.push(id);
        match node {
            Dependency::Lot(lot) => self.lot(lot, level, root),
            Dependency::Exemplar(exemplar) => self.exemplar(exemplar, level, root),
            Dependency::Texture { id } => {
                let label = if root { style("Texture ").magenta().to_string() } else { String::new() };
                let line = format!("{}{label}{}", indent(level), yellow_hex(id.tgi.instance));
                self.push(line, Some(id.file()));
            }
            Dependency::Raw { id } => {
                let kind = file_types::label(id.tgi.kind).map_or_else(|| hex(id.tgi.kind), ToString::to_string);
                let label = if root { format!("{} ", style("Raw").magenta()) } else { String::new() };
                let line = format!("{}{label}{}", indent(level), style(kind).yellow());
                self.push(line, Some(id.file()));
            }
        }
        self.path.pop();
        if root {
            self.lines.push(String::new());
        }
    }

    fn link(&mut self, link: &'a Link, level: usize) {
        match link {
            Link::Resource(id) => self.node(id, level, false),
            Link::Family(family) => {
                self.lines.push(format!(
                    "{}{} {}",
                    indent(level),
                    style("Family").green(),
                    yellow_hex(family.id)
                ));
                for member in &family.members {
                    self.link(member, level + 1);
                }
            }
            Link::Missing(missing) => {
                let label = query_label(&missing.query);
                if !label.is_empty() {
                    self.push(format!("{}{label}", indent(level)), None);
                }
            }
        }
    }

    fn lot(&mut self, lot: &'a LotNode, level: usize, root: bool) {
        if root {
            self.lines.push(style("Lot").magenta().to_string());
        }
        let name = lot.name.as_deref().unwrap_or_default();
        self.push(
            format!("{}{name} {}", indent(level), tgi_label(lot.id.tgi)),
            Some(lot.id.file()),
        );

        let sections: [(&str, Vec<&'a Link>); 6] = [
            ("Foundation", lot.foundation.iter().collect()),
            ("Building", lot.buildings.iter().collect()),
            ("Textures", lot.textures.iter().collect()),
            ("Props", lot.props.iter().collect()),
            ("Flora", lot.flora.iter().collect()),
            ("Parent", lot.parent.iter().collect()),
        ];
        for (title, links) in sections {
            if links.is_empty() {
                continue;
            }
            self.heading(level + 1, title);
            for link in links {
                self.link(link, level + 2);
            }
        }
    }

    fn exemplar(&mut self, exemplar: &'a ExemplarNode, level: usize, root: bool) {
        if root {
            let kind = exemplar_type_label(exemplar.exemplar_type.unwrap_or(0));
            self.lines.push(format!(
                "{} {}",
                style("Exemplar").magenta(),
                style(format!("({kind})")).dim()
            ));
        }
        let name = exemplar.name.as_deref().unwrap_or_default();
        self.push(
            format!("{}{name} {}", indent(level), tgi_label(exemplar.id.tgi)),
            Some(exemplar.id.file()),
        );

        for model in &exemplar.models {
            match model {
                Link::Resource(id) => self.push(
                    format!("{}Model {}", indent(level + 1), tgi_label(id.tgi)),
                    Some(id.file()),
                ),
                other => self.link(other, level + 1),
            }
        }
        for prop in &exemplar.props {
            let (label, file) = match &prop.link {
                Link::Resource(id) => (tgi_label(id.tgi), Some(id.file())),
                Link::Missing(missing) => (query_label(&missing.query), None),
                Link::Family(_) => continue,
            };
            self.push(format!("{}{} {label}", indent(level + 1), prop.name), file);
        }
        if let Some(parent) = &exemplar.parent {
            self.link(parent, level + 1);
        }
    }
}

impl TrackingResult {
    /// Every root of the dependency tree.
    pub fn tree_lines(&self, width: usize) -> Vec<String> {
        let mut writer = TreeWriter {
            graph: &self.graph,
            width,
            path: Vec::new(),
            lines: Vec::new(),
        };
        for id in &self.tree {
            writer.root(id);
        }
        writer.lines
    }

    /// Render for the terminal.
    pub fn render(&self, format: Format) -> String {
        let folder = |path: Option<&PathBuf>| {
            path.map_or_else(|| "-".to_string(), |p| p.display().to_string())
        };
        let mut lines = vec![
            format!(
                "{} {}",
                style("Installation folder:").bold(),
                style(folder(self.installation.as_ref())).cyan()
            ),
            format!(
                "{} {}",
                style("Plugins folder:").bold(),
                style(folder(self.plugins.as_ref())).cyan()
            ),
        ];

        match format {
            Format::Sc4pac => {
                if !self.packages.is_empty() {
                    lines.push(style("sc4pac dependencies:").bold().to_string());
                    lines.extend(self.packages.iter().map(|id| format!("  - {}", style(id).cyan())));
                }
                let others = self.other_files();
                if !others.is_empty() {
                    lines.push(style("Other dependencies:").bold().to_string());
                    lines.extend(others.iter().map(|file| format!("  - {}", style(file.display()).cyan())));
                }
                if !self.missing.is_empty() {
                    lines.push(style("The following dependencies were not found:").red().to_string());
                    lines.extend(self.missing.iter().map(|row| {
                        format!(
                            "  {:<10} {:<35} {}",
                            row.kind.name(),
                            row.query.to_string(),
                            style(shorten(&row.file)).dim()
                        )
                    }));
                }
            }
            Format::Tree => lines.extend(self.tree_lines(DEFAULT_WIDTH)),
        }
        lines.extend(self.errors.iter().map(|error| {
            format!(
                "{} {}: {}",
                style("Failed to read").red(),
                error.file.display(),
                error.message
            )
        }));
        lines.push(String::new());
        lines.join("\n")
    }
}
