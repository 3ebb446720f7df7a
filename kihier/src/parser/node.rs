//! Generic s-expression node
//!
//! Every parenthesized expression `(key value value (child ...) ...)` becomes
//! one [`Node`]. Values are the already-dequoted attributes; children are the
//! nested expressions, both in encounter order.

use std::fmt;
use serde::{Deserialize, Serialize};

/// Key carried by the synthetic node wrapping a parsed document
pub const ROOT_KEY: &str = "";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    key: String,
    values: Vec<String>,
    children: Vec<Node>,
}

impl Node {
    pub fn new(key: impl Into<String>, values: Vec<String>, children: Vec<Node>) -> Self {
        Self {
            key: key.into(),
            values,
            children,
        }
    }

    /// Wrap a parsed top-level expression in the synthetic root node
    pub fn root(values: Vec<String>, document: Node) -> Self {
        Self::new(ROOT_KEY, values, vec![document])
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn is_root(&self) -> bool {
        self.key == ROOT_KEY
    }

    /// Children whose key matches, in encounter order
    pub fn children_by_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.key == key)
    }

    /// Number of nodes in this subtree, including `self`
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Node::count).sum::<usize>()
    }
}

/// Quote a value the way KiCad writes strings, escaping only what the
/// parser's dequoting understands.
fn write_quoted(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    write!(f, "\"")?;
    for ch in value.chars() {
        match ch {
            '\\' => write!(f, "\\\\")?,
            '"' => write!(f, "\\\"")?,
            '\r' => write!(f, "\\r")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| matches!(c, ' ' | '\t' | '\r' | '\n' | '(' | ')' | '"' | '\\'))
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The synthetic root prints only its document
        if self.is_root() {
            for child in &self.children {
                write!(f, "{}", child)?;
            }
            return Ok(());
        }

        write!(f, "({}", self.key)?;
        for value in &self.values {
            write!(f, " ")?;
            if needs_quoting(value) {
                write_quoted(f, value)?;
            } else {
                write!(f, "{}", value)?;
            }
        }
        for child in &self.children {
            write!(f, " {}", child)?;
        }
        write!(f, ")")
    }
}
