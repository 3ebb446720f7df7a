pub mod batched;
pub mod node;
pub mod progress;
pub mod sexp;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export for convenience
pub use batched::{BatchedParser, BATCH_WINDOW};
pub use node::{Node, ROOT_KEY};
pub use progress::ProgressObserver;
pub use sexp::{dequote, ReferenceParser, SyntaxError};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Syntax error in {}: {source}", .path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: SyntaxError,
    },
}

/// Parser strategy
///
/// Both strategies produce identical trees; `Reference` is the slower
/// ground-truth implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    Reference,
    #[default]
    Batched,
}

/// Parse `text` with the batched parser.
///
/// The returned root node is synthetic: it carries `root_values` and wraps
/// the document expression as its only child.
pub fn parse(text: &str, root_values: &[&str]) -> Result<Node, SyntaxError> {
    let root_values = root_values.iter().map(|v| v.to_string()).collect();
    parse_with(text, root_values, ParserKind::default(), None)
}

pub fn parse_with(
    text: &str,
    root_values: Vec<String>,
    kind: ParserKind,
    observer: Option<&mut dyn ProgressObserver>,
) -> Result<Node, SyntaxError> {
    match (kind, observer) {
        (ParserKind::Reference, Some(observer)) => {
            ReferenceParser::new(text).with_observer(observer).parse(root_values)
        }
        (ParserKind::Reference, None) => ReferenceParser::new(text).parse(root_values),
        (ParserKind::Batched, Some(observer)) => {
            BatchedParser::new(text).with_observer(observer).parse(root_values)
        }
        (ParserKind::Batched, None) => BatchedParser::new(text).parse(root_values),
    }
}

/// Parse a file; the root node carries the file name as its one value
pub fn parse_file(path: &Path) -> Result<Node, ParseError> {
    parse_file_with(path, ParserKind::default(), None)
}

pub fn parse_file_with(
    path: &Path,
    kind: ParserKind,
    observer: Option<&mut dyn ProgressObserver>,
) -> Result<Node, ParseError> {
    let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("Parsing {} ({} bytes, {:?})", path.display(), text.len(), kind);
    parse_with(&text, vec![path.display().to_string()], kind, observer).map_err(|source| {
        ParseError::Syntax {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_defaults_to_batched() {
        let root = parse("(kicad_sch (version 20231120))", &["x.kicad_sch"]).unwrap();
        assert_eq!(root.values(), &["x.kicad_sch"]);
        assert_eq!(root.children()[0].key(), "kicad_sch");
    }

    #[test]
    fn test_parse_file_sets_filename() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(kicad_pcb (version 20240108))").unwrap();
        let root = parse_file(file.path()).unwrap();
        assert_eq!(root.values(), &[file.path().display().to_string()]);
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file(Path::new("does_not_exist.kicad_sch")).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }

    #[test]
    fn test_parse_file_syntax_error_names_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(kicad_pcb (version 1)").unwrap();
        let err = parse_file_with(file.path(), ParserKind::Reference, None).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
        assert!(err.to_string().contains("never closed"));
    }
}
