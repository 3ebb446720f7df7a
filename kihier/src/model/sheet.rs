//! Sheet definitions (one per file) and sheet instances (one per placement)

use serde::{Deserialize, Serialize};

use crate::path::{EntityPath, EntityPathComponent};

/// One `(path "..." (page "..."))` entry under a sheet's `instances` block.
///
/// `path` is the instance path of the *parent* sheet the declaration sits on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetInstanceMetadata {
    pub path: EntityPath,
    pub page: String,
}

/// A `(sheet ...)` block: a child sheet placed on its parent's page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetDeclaration {
    pub id: EntityPathComponent,
    pub name: String,
    pub filename: String,
    pub instances: Vec<SheetInstanceMetadata>,
}

/// A loaded `.kicad_sch` file, shared by all of its instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetDefinition {
    pub id: EntityPathComponent,
    pub version: String,
    pub filename: String,
    pub sheets: Vec<SheetDeclaration>,
    pub symbols: Vec<EntityPathComponent>,
    pub instances: Vec<EntityPath>,
}

impl SheetDefinition {
    /// Filenames of the sheets this definition places, in file order
    pub fn child_filenames(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|s| s.filename.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetInstance {
    pub definition: String,
    pub path: EntityPath,
    pub name: String,
    pub page: String,
    pub parent: Option<EntityPath>,
    pub children: Vec<EntityPath>,
    pub symbols: Vec<EntityPath>,
}

impl SheetInstance {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Nesting depth; the root sits at 0
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}
