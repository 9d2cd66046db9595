//! Parsed dependency files and the include graph that links them.
//!
//! Every dependency file is parsed at most once per resolution run. The parsed files live in a
//! [`DepTree`], a directed graph whose nodes are [`DepFile`]s and whose edges are include
//! relations, in the order the includes appear. Since a file can be included from several
//! places, the graph is a DAG rather than a tree; nodes are addressed by [`DepFileId`] handles
//! and looked up by absolute path through the tree's registry.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Index;
use std::path::{Path, PathBuf};

use petgraph::Direction;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::Symbol;
use crate::command::{Command, CommandKind};
use crate::error::DirectiveError;

pub type DepFileId = NodeIndex;

/// Known dependency file extensions and whether their entries are kept in source order.
pub const DEP_FILE_TYPES: &[(&str, bool)] = &[("dep", true), ("d3", false)];

fn file_type(path: &Path) -> Option<bool> {
    let ext = path.extension()?.to_str()?;
    DEP_FILE_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, forward)| *forward)
}

pub fn is_depfile(path: &Path) -> bool {
    file_type(path).is_some()
}

/// Whether entries of the file are kept in source order (`true`) or reversed.
pub fn is_forward(path: &Path) -> bool {
    file_type(path).unwrap_or(true)
}

/// A line that failed pre-processing or parsing.
#[derive(Debug)]
pub struct LineError {
    pub package: Symbol,
    pub component: Symbol,
    pub file_name: PathBuf,
    pub file_path: PathBuf,
    /// 1-based.
    pub line_number: usize,
    pub line: String,
    pub error: DirectiveError,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} ('{}')",
            self.file_path.display(),
            self.line_number,
            self.error,
            self.line
        )
    }
}

/// A file expression that matched nothing, with the context that referenced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub expression: PathBuf,
    pub kind: CommandKind,
    /// Package the expression was resolved in.
    pub package: Symbol,
    pub component: Symbol,
    /// Package of the dependency file holding the directive.
    pub dep_package: Symbol,
    pub dep_component: Symbol,
    pub dep_file: PathBuf,
}

/// One parsed dependency file.
#[derive(Debug)]
pub struct DepFile {
    pub package: Symbol,
    pub component: Symbol,
    /// Path relative to the component's include directory.
    pub name: PathBuf,
    pub path: PathBuf,
    pub entries: Vec<Command>,
    pub errors: Vec<LineError>,
    pub unresolved: Vec<Unresolved>,
}

impl DepFile {
    pub fn new(package: Symbol, component: Symbol, name: PathBuf, path: PathBuf) -> Self {
        DepFile {
            package,
            component,
            name,
            path,
            entries: Vec::new(),
            errors: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    pub fn is_forward(&self) -> bool {
        is_forward(&self.name)
    }
}

impl fmt::Display for DepFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "depfile {} | {}:{} - entries {}, errors {}, unresolved {}",
            self.path.display(),
            self.package,
            Path::new(&*self.component)
                .join(CommandKind::Include.directory().unwrap_or_default())
                .join(&self.name)
                .display(),
            self.entries.len(),
            self.errors.len(),
            self.unresolved.len()
        )
    }
}

/// Arena of parsed dependency files, linked by include edges.
#[derive(Debug, Default)]
pub struct DepTree {
    graph: Graph<DepFile, ()>,
    registry: HashMap<PathBuf, DepFileId>,
}

impl DepTree {
    pub fn new() -> Self {
        DepTree::default()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Adds a file and registers it under its path.
    pub fn insert(&mut self, file: DepFile) -> DepFileId {
        let path = file.path.clone();
        let id = self.graph.add_node(file);
        self.registry.insert(path, id);
        id
    }

    pub fn get(&self, path: &Path) -> Option<DepFileId> {
        self.registry.get(path).copied()
    }

    pub fn file_mut(&mut self, id: DepFileId) -> &mut DepFile {
        &mut self.graph[id]
    }

    /// Records that `parent` includes `child`.
    pub fn add_include(&mut self, parent: DepFileId, child: DepFileId) {
        self.graph.add_edge(parent, child, ());
    }

    /// Files in registration order.
    pub fn files(&self) -> impl Iterator<Item = (DepFileId, &DepFile)> {
        self.graph
            .node_indices()
            .map(move |id| (id, &self.graph[id]))
    }

    /// Files included by `id`, in include order.
    pub fn children(&self, id: DepFileId) -> Vec<DepFileId> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(id, Direction::Outgoing)
            .map(|e| (e.id(), e.target()))
            .collect();
        edges.sort();
        edges.into_iter().map(|(_, target)| target).collect()
    }

    /// Files that include `id`.
    pub fn includers(&self, id: DepFileId) -> Vec<DepFileId> {
        let mut parents: Vec<_> = self
            .graph
            .neighbors_directed(id, Direction::Incoming)
            .collect();
        parents.sort();
        parents.dedup();
        parents
    }

    /// `id` and every file reachable from it, depth-first, each once.
    pub fn iter_files(&self, id: DepFileId) -> Vec<DepFileId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_files(id, &mut seen, &mut out);
        out
    }

    fn collect_files(
        &self,
        id: DepFileId,
        seen: &mut HashSet<DepFileId>,
        out: &mut Vec<DepFileId>,
    ) {
        if !seen.insert(id) {
            return;
        }
        out.push(id);
        for child in self.children(id) {
            self.collect_files(child, seen, out);
        }
    }

    /// Commands reachable from `id` with every include replaced by the commands of its target.
    ///
    /// An include of a file that is still being expanded is skipped.
    pub fn iter_commands(&self, id: DepFileId) -> Vec<&Command> {
        let mut active = HashSet::new();
        let mut out = Vec::new();
        self.collect_commands(id, &mut active, &mut out);
        out
    }

    fn collect_commands<'a>(
        &'a self,
        id: DepFileId,
        active: &mut HashSet<DepFileId>,
        out: &mut Vec<&'a Command>,
    ) {
        if !active.insert(id) {
            return;
        }
        for cmd in &self.graph[id].entries {
            match (cmd.kind(), cmd.depfile()) {
                (CommandKind::Include, Some(child)) => self.collect_commands(child, active, out),
                (CommandKind::Include, None) => {}
                _ => out.push(cmd),
            }
        }
        active.remove(&id);
    }
}

impl Index<DepFileId> for DepTree {
    type Output = DepFile;

    fn index(&self, id: DepFileId) -> &DepFile {
        &self.graph[id]
    }
}
