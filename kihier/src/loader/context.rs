//! State threaded through the schematic load passes
//!
//! Holds the parsed sheet files keyed by their normalized relative name, so
//! each file is read and parsed once however many sheets place it, and the
//! file-level reference graph used to spot recursive hierarchies.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};

use super::LoadError;
use crate::parser::{parse_file_with, Node, ParserKind, ProgressObserver};

/// Normalize a `Sheetfile` value into a memoization key
pub fn normalize_filename(name: &str) -> String {
    let name = name.replace('\\', "/");
    let mut name = name.as_str();
    while let Some(rest) = name.strip_prefix("./") {
        name = rest;
    }
    name.to_string()
}

pub struct LoaderContext<'o> {
    base_dir: PathBuf,
    project_name: String,
    parser: ParserKind,
    observer: Option<&'o mut dyn ProgressObserver>,
    documents: BTreeMap<String, Node>,
    graph: DiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
}

impl<'o> LoaderContext<'o> {
    pub fn new(base_dir: &Path, project_name: &str, parser: ParserKind) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            project_name: project_name.to_string(),
            parser,
            observer: None,
            documents: BTreeMap::new(),
            graph: DiGraph::new(),
            indices: HashMap::new(),
        }
    }

    pub fn with_observer(mut self, observer: &'o mut dyn ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn is_loaded(&self, filename: &str) -> bool {
        self.documents.contains_key(filename)
    }

    /// Read and parse a sheet file relative to the project directory
    pub fn parse(&mut self, filename: &str) -> Result<Node, LoadError> {
        let path = self.base_dir.join(filename);
        let document = match self.observer.as_mut() {
            Some(observer) => parse_file_with(&path, self.parser, Some(&mut **observer))?,
            None => parse_file_with(&path, self.parser, None)?,
        };
        Ok(document)
    }

    pub fn insert(&mut self, filename: &str, document: Node) {
        self.node(filename);
        self.documents.insert(filename.to_string(), document);
    }

    pub fn document(&self, filename: &str) -> Option<&Node> {
        self.documents.get(filename)
    }

    /// Parsed sheet files in filename order
    pub fn documents(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.documents.iter().map(|(name, doc)| (name.as_str(), doc))
    }

    /// Record that `parent` places a sheet backed by `child`
    pub fn link(&mut self, parent: &str, child: &str) {
        let from = self.node(parent);
        let to = self.node(child);
        self.graph.update_edge(from, to, ());
    }

    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    fn node(&mut self, filename: &str) -> NodeIndex {
        if let Some(&index) = self.indices.get(filename) {
            return index;
        }
        let index = self.graph.add_node(filename.to_string());
        self.indices.insert(filename.to_string(), index);
        index
    }
}
