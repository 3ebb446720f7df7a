//! Regex-batched s-expression parser
//!
//! Most KiCad nodes are short leaves such as `(at 1 2 90)` or
//! `(uuid "...")`. A single anchored regex matches the opening `(token`, up
//! to [`BATCH_WINDOW`] attributes and an optional closing `)` in one call,
//! which removes most of the per-character overhead of the reference parser.
//! Nodes with more attributes or with children fall back to matching one
//! attribute at a time and recursing into children.

use std::sync::LazyLock;

use regex::Regex;

use super::node::Node;
use super::progress::{Progress, ProgressObserver};
use super::sexp::{dequote_span, SyntaxError};

/// Attributes captured by the batch regex before falling back
pub const BATCH_WINDOW: usize = 8;

const WS: &str = "[ \t\r\n]*";
const ATTR: &str = r#""(?:[^"\\]|\\(?s:.))*"|[^ \t\r\n()"]+"#;

static BATCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    let mut pattern = String::from(r"^\(([a-z0-9_]+)");
    for _ in 0..BATCH_WINDOW {
        pattern.push_str(&format!("(?:{}({}))?", WS, ATTR));
    }
    pattern.push_str(&format!(r"{}(\))?", WS));
    Regex::new(&pattern).expect("batch pattern is valid")
});

static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^(?:{})", ATTR)).expect("attribute pattern is valid"));

/// Index of the closing-paren capture group
const CLOSE_GROUP: usize = BATCH_WINDOW + 2;

pub struct BatchedParser<'a, 'o> {
    text: &'a str,
    pos: usize,
    progress: Progress<'o>,
}

impl<'a, 'o> BatchedParser<'a, 'o> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            progress: Progress::new(None, text.len()),
        }
    }

    pub fn with_observer(mut self, observer: &'o mut dyn ProgressObserver) -> Self {
        self.progress = Progress::new(Some(observer), self.text.len());
        self
    }

    /// Parse the whole document and wrap it in a synthetic root node
    pub fn parse(mut self, root_values: Vec<String>) -> Result<Node, SyntaxError> {
        self.skip_whitespace();
        if self.pos >= self.text.len() {
            return Err(self.error(self.pos, "unexpected end of input, expected '('"));
        }
        let document = self.parse_expression(0)?;
        self.skip_whitespace();
        if self.pos < self.text.len() {
            return Err(self.error(self.pos, "unexpected content after end of document"));
        }
        self.progress.finish();
        Ok(Node::root(root_values, document))
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.text, offset, message)
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.text.as_bytes()[self.pos..];
        let skipped = rest
            .iter()
            .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
            .count();
        self.pos += skipped;
    }

    fn attribute(&self, start: usize, end: usize) -> Result<String, SyntaxError> {
        if self.text.as_bytes()[start] == b'"' {
            dequote_span(self.text, start + 1, end - 1)
        } else {
            Ok(self.text[start..end].to_string())
        }
    }

    fn parse_expression(&mut self, depth: usize) -> Result<Node, SyntaxError> {
        let open = self.pos;
        let rest = &self.text[open..];
        let Some(caps) = BATCH_RE.captures(rest) else {
            return Err(match rest.chars().next() {
                Some('(') => self.error(open + 1, "expected node key after '('"),
                Some(ch) => self.error(open, format!("expected one of ['('], found '{}'", ch)),
                None => self.error(open, "expected one of ['('], found end of input"),
            });
        };

        let key = caps.get(1).map(|m| m.as_str()).unwrap_or_default().to_string();
        let mut values = Vec::new();
        for group in 2..2 + BATCH_WINDOW {
            match caps.get(group) {
                Some(m) => values.push(self.attribute(open + m.start(), open + m.end())?),
                None => break,
            }
        }
        let closed = caps.get(CLOSE_GROUP).is_some();
        self.pos = open + caps.get(0).map(|m| m.end()).unwrap_or_default();
        if closed {
            return Ok(Node::new(key, values, Vec::new()));
        }

        let mut children = Vec::new();
        loop {
            self.skip_whitespace();
            match self.text.as_bytes().get(self.pos) {
                None => {
                    return Err(self.error(
                        open,
                        format!("unexpected end of input, '({}' is never closed", key),
                    ));
                }
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(b'(') => {
                    children.push(self.parse_expression(depth + 1)?);
                    if depth == 0 {
                        self.progress.report(self.pos);
                    }
                }
                Some(first) => {
                    let start = self.pos;
                    let Some(m) = ATTR_RE.find(&self.text[start..]) else {
                        let message = if *first == b'"' {
                            "unterminated quoted string"
                        } else {
                            "invalid attribute"
                        };
                        return Err(self.error(start, message));
                    };
                    values.push(self.attribute(start, start + m.end())?);
                    self.pos = start + m.end();
                }
            }
        }

        Ok(Node::new(key, values, children))
    }
}
