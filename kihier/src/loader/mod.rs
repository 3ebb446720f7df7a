//! Builds the [`Schematic`] and [`Project`] aggregates from KiCad files.
//!
//! A load either succeeds completely or fails with a [`LoadError`]; no
//! partially built model is ever returned.

pub mod context;
pub mod layout;
pub mod schematic;

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::LoadOptions;
use crate::model::{Project, Schematic};
use crate::parser::{ParseError, SyntaxError};
use crate::path::{EntityPath, EntityPathComponent};

pub use context::LoaderContext;
pub use layout::{cross_reference, read_board, LayoutLoader};
pub use schematic::SchematicLoader;

#[derive(Debug, Error)]
pub enum LoadError {
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
    #[error("Invalid format in {file}: {message}")]
    Format { file: String, message: String },
    #[error(transparent)]
    Structural(#[from] StructuralInconsistency),
    #[error(transparent)]
    Ambiguous(#[from] AmbiguousMetadata),
}

impl From<ParseError> for LoadError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::Io { path, source } => LoadError::Io { path, source },
            ParseError::Syntax { path, source } => LoadError::Syntax { path, source },
        }
    }
}

impl LoadError {
    pub(crate) fn format(file: &str, message: impl Into<String>) -> Self {
        LoadError::Format {
            file: file.to_string(),
            message: message.into(),
        }
    }
}

/// The model contradicts itself: identities collide or references dangle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralInconsistency {
    #[error("duplicate instance path {0}")]
    DuplicatePath(EntityPath),
    #[error("duplicate symbol uuid {id} in {file}")]
    DuplicateSymbol { id: EntityPathComponent, file: String },
    #[error("sheet file '{filename}' placed at {parent} was never loaded")]
    MissingSheetDefinition { filename: String, parent: EntityPath },
    #[error("symbol {symbol} in {file} refers to missing sheet instance {path}")]
    MissingSheetInstance {
        symbol: EntityPathComponent,
        file: String,
        path: EntityPath,
    },
    #[error("footprint {reference} ({}) matches no symbol instance", .path.as_deref().unwrap_or("no path"))]
    UnmatchedFootprint {
        reference: String,
        path: Option<String>,
    },
    #[error("component {designator} has two footprints: {first} and {second}")]
    DuplicateFootprint {
        designator: String,
        first: EntityPathComponent,
        second: EntityPathComponent,
    },
}

/// Units of one component disagree on a value that must be shared
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("conflicting {field} across units of {designator}: {}", .values.join(", "))]
pub struct AmbiguousMetadata {
    pub designator: String,
    pub field: String,
    pub values: Vec<String>,
}

/// Attach the offending file to query and conversion failures
pub(crate) trait InFile<T> {
    fn in_file(self, file: &str) -> Result<T, LoadError>;
}

impl<T, E: fmt::Display> InFile<T> for Result<T, E> {
    fn in_file(self, file: &str) -> Result<T, LoadError> {
        self.map_err(|e| LoadError::format(file, e.to_string()))
    }
}

/// Paths written by KiCad may omit the root sheet uuid
pub(crate) fn absolute_path(path: EntityPath, root: &EntityPath) -> EntityPath {
    if path.starts_with(root) {
        path
    } else {
        root.join(&path)
    }
}

/// Load the full sheet hierarchy rooted at `root`
pub fn load_schematic(root: &Path, options: &LoadOptions) -> Result<Schematic, LoadError> {
    SchematicLoader::new(options.clone()).load(root)
}

/// Load the schematic hierarchy and cross-reference it with `board`
pub fn load_project(root: &Path, board: &Path, options: &LoadOptions) -> Result<Project, LoadError> {
    let schematic = load_schematic(root, options)?;
    LayoutLoader::new(options.parser).load(schematic, board)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_path_prefixes_root_once() {
        let root: EntityPath = "/11111111-1111-4111-8111-111111111111".parse().unwrap();
        let relative: EntityPath = "/22222222-2222-4222-8222-222222222222".parse().unwrap();
        let absolute = absolute_path(relative.clone(), &root);
        assert_eq!(absolute, root.join(&relative));
        assert_eq!(absolute_path(absolute.clone(), &root), absolute);
        assert_eq!(absolute_path(EntityPath::empty(), &root), root);
    }

    #[test]
    fn test_ambiguous_metadata_message() {
        let err = AmbiguousMetadata {
            designator: "U1".to_string(),
            field: "value".to_string(),
            values: vec!["\"LM358\"".to_string(), "\"TL072\"".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "conflicting value across units of U1: \"LM358\", \"TL072\""
        );
    }
}
