//! kihier - KiCad design hierarchy library
//!
//! Parses KiCad schematic and board files into a queryable model of the
//! design hierarchy: sheet files and their placements, symbols and the
//! components they form, and the footprints placed for them.
//!
//! # Quick Start
//!
//! ```no_run
//! use kihier::{KihierCore, LoadOptions};
//! use std::path::Path;
//!
//! let project = KihierCore::load_project(
//!     Path::new("demo.kicad_sch"),
//!     Path::new("demo.kicad_pcb"),
//!     &LoadOptions::default(),
//! ).unwrap();
//!
//! for component in project.components() {
//!     println!("{} {} {}", component.reference, component.lib_id, component.value);
//! }
//! ```
//!
//! # Features
//!
//! - **Parsing**: two interchangeable s-expression parsers with progress reporting
//! - **Hierarchy**: sheet and symbol definitions versus their instances, addressed by uuid paths
//! - **Components**: multi-unit symbols merged into components with checked metadata
//! - **Layout**: board footprints cross-referenced to schematic components
//! - **Clone engine**: replicate one sheet's placement onto its other instances

pub mod clone;
pub mod core;
pub mod loader;
pub mod model;
pub mod parser;
pub mod path;
pub mod selection;

// Re-export main types
pub use crate::core::{
    discover_project_files, KihierCore, KihierError, LoadOptions, LoadStats, ProjectFiles,
};
pub use clone::{CloneError, CloneOptions, ClonePlan, Command, CommandList, PlacementStrategy, Replicator};
pub use loader::{AmbiguousMetadata, LoadError, StructuralInconsistency};
pub use model::{
    Board, ComponentInstance, ComponentReference, Footprint, Project, Schematic, SheetInstance,
    SymbolInstance,
};
pub use parser::{Node, ParseError, ParserKind, SyntaxError};
pub use path::{EntityPath, EntityPathComponent};
pub use selection::{Selection, SelectionError};

/// Load a schematic hierarchy with default options (convenience wrapper).
pub fn load_schematic(root: &std::path::Path) -> Result<Schematic, KihierError> {
    KihierCore::load_schematic(root, &LoadOptions::default())
}

/// Load and cross-reference a schematic and board with default options
/// (convenience wrapper).
pub fn load_project(
    root: &std::path::Path,
    board: &std::path::Path,
) -> Result<Project, KihierError> {
    KihierCore::load_project(root, board, &LoadOptions::default())
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        ComponentInstance, ComponentReference, EntityPath, EntityPathComponent, Footprint,
        KihierCore, KihierError, LoadOptions, Project, Schematic, Selection, SheetInstance,
        SymbolInstance,
    };
}
