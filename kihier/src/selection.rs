//! Chainable queries over parsed nodes
//!
//! A [`Selection`] wraps zero or more nodes. Child lookups fan out over every
//! wrapped node, so `sel.children("instances").children("project")` reads
//! like a path through the tree. Accessors that only make sense for a single
//! node (`key`, `values`, `value_by_index`) fail when the selection holds no
//! node or more than one.

use std::ops::Add;

use thiserror::Error;

use crate::parser::Node;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no nodes selected")]
    NoNodes,
    #[error("expected a single node, selection holds {0}")]
    MultipleNodes(usize),
    #[error("node '{key}' has no value at index {index}")]
    IndexOutOfRange { key: String, index: usize },
    #[error("no child '{0}' found")]
    MissingChild(String),
    #[error("no property '{0}' found")]
    MissingProperty(String),
    #[error("expected yes/no for '{key}', found '{value}'")]
    InvalidFlag { key: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection<'a> {
    nodes: Vec<&'a Node>,
}

impl<'a> Selection<'a> {
    pub fn new(nodes: Vec<&'a Node>) -> Self {
        Self { nodes }
    }

    pub fn of(node: &'a Node) -> Self {
        Self { nodes: vec![node] }
    }

    pub fn nodes(&self) -> &[&'a Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All children with `key` across every wrapped node, in encounter order
    pub fn children(&self, key: &str) -> Selection<'a> {
        let nodes = self
            .nodes
            .iter()
            .flat_map(|node| node.children().iter().filter(|c| c.key() == key))
            .collect();
        Selection { nodes }
    }

    /// Keep nodes whose value at `index` equals `value`
    pub fn filter(&self, index: usize, value: &str) -> Selection<'a> {
        let nodes = self
            .nodes
            .iter()
            .copied()
            .filter(|node| node.value(index) == Some(value))
            .collect();
        Selection { nodes }
    }

    pub fn single(&self) -> Result<&'a Node, SelectionError> {
        match self.nodes.as_slice() {
            [] => Err(SelectionError::NoNodes),
            [node] => Ok(*node),
            many => Err(SelectionError::MultipleNodes(many.len())),
        }
    }

    pub fn first(&self) -> Option<&'a Node> {
        self.nodes.first().copied()
    }

    pub fn key(&self) -> Result<&'a str, SelectionError> {
        Ok(self.single()?.key())
    }

    pub fn values(&self) -> Result<&'a [String], SelectionError> {
        Ok(self.single()?.values())
    }

    pub fn value_by_index(&self, index: usize) -> Result<&'a str, SelectionError> {
        let node = self.single()?;
        node.value(index).ok_or_else(|| SelectionError::IndexOutOfRange {
            key: node.key().to_string(),
            index,
        })
    }

    /// Like [`Self::value_by_index`], with `default` for a missing index.
    /// An empty or ambiguous selection is still an error.
    pub fn value_or(&self, index: usize, default: &'a str) -> Result<&'a str, SelectionError> {
        let node = self.single()?;
        Ok(node.value(index).unwrap_or(default))
    }

    /// First value of the single child `key`, e.g. `(uuid "...")`
    pub fn child_value(&self, key: &str) -> Result<&'a str, SelectionError> {
        let child = self.children(key);
        if child.is_empty() {
            return Err(SelectionError::MissingChild(key.to_string()));
        }
        child.value_by_index(0)
    }

    /// Value of `(property "<name>" "<value>" ...)`
    pub fn property(&self, name: &str) -> Result<&'a str, SelectionError> {
        let property = self.children("property").filter(0, name);
        if property.is_empty() {
            return Err(SelectionError::MissingProperty(name.to_string()));
        }
        property.value_by_index(1)
    }

    /// Read a `(key yes|no)` flag, `default` when the child is absent
    pub fn flag(&self, key: &str, default: bool) -> Result<bool, SelectionError> {
        let child = self.children(key);
        if child.is_empty() {
            return Ok(default);
        }
        // `(dnp)` without a value reads as set
        match child.value_or(0, "yes")? {
            "yes" | "true" => Ok(true),
            "no" | "false" => Ok(false),
            other => Err(SelectionError::InvalidFlag {
                key: key.to_string(),
                value: other.to_string(),
            }),
        }
    }

    /// One single-node selection per wrapped node
    pub fn iter(&self) -> impl Iterator<Item = Selection<'a>> + '_ {
        self.nodes.iter().map(|node| Selection::of(*node))
    }
}

impl<'a> Add for Selection<'a> {
    type Output = Selection<'a>;

    fn add(mut self, rhs: Selection<'a>) -> Self::Output {
        self.nodes.extend(rhs.nodes);
        self
    }
}

impl<'a> IntoIterator for Selection<'a> {
    type Item = Selection<'a>;
    type IntoIter = std::iter::Map<std::vec::IntoIter<&'a Node>, fn(&'a Node) -> Selection<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter().map(Selection::of as fn(&'a Node) -> Selection<'a>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    const SYMBOL: &str = r#"(kicad_sch
        (symbol (lib_id "Device:R") (unit 1) (in_bom yes) (on_board no)
            (property "Reference" "R1" (at 0 0 0))
            (property "Value" "10k")
            (uuid "4e0f2f63-1b8e-4f0e-9c3c-3a2a1f2b8d11"))
        (symbol (lib_id "Device:C") (uuid "5a9c2d1e-7f1b-4a3e-8c0d-2b1e9f3c4d22")))"#;

    #[test]
    fn test_children_fan_out() {
        let root = parse(SYMBOL, &[]).unwrap();
        let doc = Selection::of(&root).children("kicad_sch");
        let symbols = doc.children("symbol");
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols.children("uuid").len(), 2);
        assert!(symbols.children("nothing").is_empty());
    }

    #[test]
    fn test_single_node_accessors() {
        let root = parse(SYMBOL, &[]).unwrap();
        let symbols = Selection::of(&root).children("kicad_sch").children("symbol");
        assert_eq!(symbols.key(), Err(SelectionError::MultipleNodes(2)));
        assert_eq!(symbols.children("nothing").values(), Err(SelectionError::NoNodes));

        let first = symbols.iter().next().unwrap();
        assert_eq!(first.key(), Ok("symbol"));
        assert_eq!(first.child_value("lib_id"), Ok("Device:R"));
        assert_eq!(first.property("Value"), Ok("10k"));
        assert!(matches!(
            first.property("Footprint"),
            Err(SelectionError::MissingProperty(_))
        ));
    }

    #[test]
    fn test_value_by_index_and_default() {
        let root = parse("(a (at 1 2))", &[]).unwrap();
        let at = Selection::of(&root).children("a").children("at");
        assert_eq!(at.value_by_index(1), Ok("2"));
        assert!(matches!(
            at.value_by_index(2),
            Err(SelectionError::IndexOutOfRange { index: 2, .. })
        ));
        assert_eq!(at.value_or(2, "0"), Ok("0"));
        assert_eq!(at.children("x").value_or(0, "0"), Err(SelectionError::NoNodes));
    }

    #[test]
    fn test_filter_by_value() {
        let root = parse(SYMBOL, &[]).unwrap();
        let props = Selection::of(&root)
            .children("kicad_sch")
            .children("symbol")
            .children("property");
        assert_eq!(props.len(), 2);
        assert_eq!(props.filter(0, "Reference").value_by_index(1), Ok("R1"));
        assert!(props.filter(0, "Datasheet").is_empty());
    }

    #[test]
    fn test_flags() {
        let root = parse(SYMBOL, &[]).unwrap();
        let first = Selection::of(&root)
            .children("kicad_sch")
            .children("symbol")
            .iter()
            .next()
            .unwrap();
        assert_eq!(first.flag("in_bom", false), Ok(true));
        assert_eq!(first.flag("on_board", true), Ok(false));
        assert_eq!(first.flag("dnp", false), Ok(false));
    }

    #[test]
    fn test_concatenation_keeps_duplicates() {
        let root = parse(SYMBOL, &[]).unwrap();
        let doc = Selection::of(&root).children("kicad_sch");
        let both = doc.clone() + doc;
        assert_eq!(both.len(), 2);
        assert_eq!(both.into_iter().count(), 2);
    }
}
