//! Character-stepping s-expression parser
//!
//! This is the ground-truth implementation of the KiCad s-expression dialect:
//!
//! - A document is exactly one `( ... )` expression
//! - An expression is `(token attr* child*)` with `token` matching `[a-z0-9_]+`
//! - Attributes are bare runs (no whitespace, parens or quotes) or quoted strings
//! - Quoted strings support `\\ \" \r \n \t \xHH \OOO` escapes
//!
//! [`crate::parser::BatchedParser`] must produce identical trees; tests in
//! `tests/parser_equivalence.rs` hold the two against each other.

use thiserror::Error;

use super::node::Node;
use super::progress::{Progress, ProgressObserver};

/// Whitespace accepted between tokens
pub(crate) const WHITESPACE: &[char] = &[' ', '\t', '\r', '\n'];

/// Characters shown on either side of the caret in a syntax error snippet
const SNIPPET_CONTEXT: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column}\n{snippet}")]
pub struct SyntaxError {
    pub message: String,
    /// Byte offset into the parsed text
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    /// Offending source line with a caret under the error column
    pub snippet: String,
}

impl SyntaxError {
    pub(crate) fn new(text: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(text.len());
        let line_start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = text[offset..]
            .find('\n')
            .map(|i| offset + i)
            .unwrap_or(text.len());
        let line = text[..offset].matches('\n').count() + 1;

        let source_line: Vec<char> = text[line_start..line_end]
            .trim_end_matches('\r')
            .chars()
            .collect();
        let column = text[line_start..offset].chars().count();
        let from = column.saturating_sub(SNIPPET_CONTEXT);
        let to = (column + SNIPPET_CONTEXT).min(source_line.len()).max(from);
        let excerpt: String = source_line[from..to].iter().collect();
        let snippet = format!("{}\n{}^", excerpt, " ".repeat(column - from));

        Self {
            message: message.into(),
            offset,
            line,
            column: column + 1,
            snippet,
        }
    }
}

pub(crate) fn is_token_char(ch: char) -> bool {
    matches!(ch, 'a'..='z' | '0'..='9' | '_')
}

pub(crate) fn is_bare_char(ch: char) -> bool {
    !matches!(ch, ' ' | '\t' | '\r' | '\n' | '(' | ')' | '"')
}

/// Decode the escapes of a quoted string body.
///
/// `raw` is the text between the quotes.
pub fn dequote(raw: &str) -> Result<String, SyntaxError> {
    dequote_span(raw, 0, raw.len())
}

/// Decode `text[start..end]`, reporting errors against offsets in `text`
pub(crate) fn dequote_span(text: &str, start: usize, end: usize) -> Result<String, SyntaxError> {
    let raw = &text[start..end];
    if !raw.contains('\\') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let at = start + i;
        let Some((_, escape)) = chars.next() else {
            return Err(SyntaxError::new(text, at, "dangling escape at end of string"));
        };
        match escape {
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            'r' => out.push('\r'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'x' => {
                let mut digits = String::new();
                while digits.len() < 2 {
                    match chars.next_if(|&(_, c)| c.is_ascii_hexdigit()) {
                        Some((_, c)) => digits.push(c),
                        None => break,
                    }
                }
                let byte = u8::from_str_radix(&digits, 16)
                    .ok()
                    .filter(|_| digits.len() == 2)
                    .ok_or_else(|| SyntaxError::new(text, at, "expected two hex digits after \\x"))?;
                out.push(char::from(byte));
            }
            '0'..='7' => {
                let mut digits = String::from(escape);
                while digits.len() < 3 {
                    match chars.next_if(|&(_, c)| matches!(c, '0'..='7')) {
                        Some((_, c)) => digits.push(c),
                        None => break,
                    }
                }
                let decoded = u32::from_str_radix(&digits, 8)
                    .ok()
                    .filter(|_| digits.len() == 3)
                    .and_then(char::from_u32)
                    .ok_or_else(|| SyntaxError::new(text, at, "expected three octal digits after \\"))?;
                out.push(decoded);
            }
            other => {
                return Err(SyntaxError::new(
                    text,
                    at,
                    format!("unsupported escape sequence '\\{}'", other),
                ));
            }
        }
    }
    Ok(out)
}

/// Read position over the source text; end of input is an explicit `None`.
pub(crate) struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn done(&self) -> bool {
        self.pos >= self.text.len()
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    pub(crate) fn next(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    /// Advance past any characters in `set`
    pub(crate) fn skip(&mut self, set: &[char]) {
        while let Some(ch) = self.peek() {
            if !set.contains(&ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    /// Consume one character that must be in `set`
    pub(crate) fn expect(&mut self, set: &[char]) -> Result<char, SyntaxError> {
        match self.peek() {
            Some(ch) if set.contains(&ch) => {
                self.pos += ch.len_utf8();
                Ok(ch)
            }
            Some(ch) => Err(self.error(format!("expected one of {:?}, found '{}'", set, ch))),
            None => Err(self.error(format!("expected one of {:?}, found end of input", set))),
        }
    }

    pub(crate) fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !pred(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        &self.text[start..self.pos]
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.text, self.pos, message)
    }
}

/// Recursive-descent parser stepping one character at a time
pub struct ReferenceParser<'a, 'o> {
    text: &'a str,
    cursor: Cursor<'a>,
    progress: Progress<'o>,
}

impl<'a, 'o> ReferenceParser<'a, 'o> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            cursor: Cursor::new(text),
            progress: Progress::new(None, text.len()),
        }
    }

    pub fn with_observer(mut self, observer: &'o mut dyn ProgressObserver) -> Self {
        self.progress = Progress::new(Some(observer), self.text.len());
        self
    }

    /// Parse the whole document and wrap it in a synthetic root node
    pub fn parse(mut self, root_values: Vec<String>) -> Result<Node, SyntaxError> {
        self.cursor.skip(WHITESPACE);
        if self.cursor.done() {
            return Err(self.cursor.error("unexpected end of input, expected '('"));
        }
        let document = self.parse_expression(0)?;
        self.cursor.skip(WHITESPACE);
        if !self.cursor.done() {
            return Err(self.cursor.error("unexpected content after end of document"));
        }
        self.progress.finish();
        Ok(Node::root(root_values, document))
    }

    fn parse_expression(&mut self, depth: usize) -> Result<Node, SyntaxError> {
        let open = self.cursor.pos();
        self.cursor.expect(&['('])?;
        let key = self.cursor.take_while(is_token_char);
        if key.is_empty() {
            return Err(self.cursor.error("expected node key after '('"));
        }

        let mut values = Vec::new();
        let mut children = Vec::new();
        loop {
            self.cursor.skip(WHITESPACE);
            match self.cursor.peek() {
                None => {
                    return Err(SyntaxError::new(
                        self.text,
                        open,
                        format!("unexpected end of input, '({}' is never closed", key),
                    ));
                }
                Some(')') => {
                    self.cursor.next();
                    break;
                }
                Some('(') => {
                    children.push(self.parse_expression(depth + 1)?);
                    if depth == 0 {
                        self.progress.report(self.cursor.pos());
                    }
                }
                Some('"') => values.push(self.parse_quoted()?),
                Some(_) => values.push(self.cursor.take_while(is_bare_char).to_string()),
            }
        }

        Ok(Node::new(key, values, children))
    }

    fn parse_quoted(&mut self) -> Result<String, SyntaxError> {
        let open = self.cursor.pos();
        self.cursor.expect(&['"'])?;
        let start = self.cursor.pos();
        loop {
            match self.cursor.next() {
                None => {
                    return Err(SyntaxError::new(self.text, open, "unterminated quoted string"));
                }
                Some('\\') => {
                    if self.cursor.next().is_none() {
                        return Err(SyntaxError::new(self.text, open, "unterminated quoted string"));
                    }
                }
                Some('"') => break,
                Some(_) => {}
            }
        }
        let end = self.cursor.pos() - 1;
        dequote_span(self.text, start, end)
    }
}
