//! Loading entry points shared by the CLI and library callers.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::clone::{CloneError, CloneOptions, ClonePlan, Replicator};
use crate::loader::{self, LoadError};
use crate::model::{Board, Project, Schematic};
use crate::parser::{self, Node, ParseError, ParserKind};

#[derive(Debug, thiserror::Error)]
pub enum KihierError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Clone(#[from] CloneError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Discovery(String),
}

/// Options for a schematic or project load.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// Project whose instance data is read. Defaults to the root file stem.
    pub project_name: Option<String>,
    pub parser: ParserKind,
}

impl LoadOptions {
    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    pub fn with_parser(mut self, parser: ParserKind) -> Self {
        self.parser = parser;
        self
    }
}

/// Root schematic and board found in a project directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectFiles {
    pub schematic: PathBuf,
    pub board: Option<PathBuf>,
}

/// Entity counts of a loaded design
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub sheet_files: usize,
    pub sheet_instances: usize,
    pub symbols: usize,
    pub components: usize,
    pub footprints: usize,
    pub board_only: usize,
}

impl LoadStats {
    pub fn of_schematic(schematic: &Schematic) -> Self {
        Self {
            sheet_files: schematic.sheet_definitions().count(),
            sheet_instances: schematic.sheet_instances().count(),
            symbols: schematic.symbol_instances().count(),
            components: schematic.components().count(),
            ..Self::default()
        }
    }

    pub fn of_project(project: &Project) -> Self {
        Self {
            footprints: project.footprints().count(),
            board_only: project.board_only_footprints().count(),
            ..Self::of_schematic(project.schematic())
        }
    }
}

/// Find a project's root schematic and board in `dir`.
///
/// The root is the `.kicad_sch` named after the `.kicad_pro` file, else the
/// one named after the directory, else the only schematic present.
pub fn discover_project_files(dir: &Path) -> Result<ProjectFiles, KihierError> {
    let mut projects = Vec::new();
    let mut schematics = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match path.extension().and_then(|s| s.to_str()) {
            Some("kicad_pro") => projects.push(path),
            Some("kicad_sch") => schematics.push(path),
            _ => {}
        }
    }
    projects.sort();
    schematics.sort();

    let stem_of = |path: &Path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string);
    let named = |stem: &str| {
        schematics
            .iter()
            .find(|p| stem_of(p.as_path()).as_deref() == Some(stem))
            .cloned()
    };

    let schematic = if let Some(stem) = projects.first().and_then(|p| stem_of(p.as_path())) {
        named(&stem)
    } else if let Some(found) = dir.file_name().and_then(|n| n.to_str()).and_then(|n| named(n)) {
        Some(found)
    } else if schematics.len() == 1 {
        schematics.first().cloned()
    } else {
        None
    };
    let schematic = schematic.ok_or_else(|| {
        KihierError::Discovery(format!("no root schematic found in {}", dir.display()))
    })?;

    let board = schematic.with_extension("kicad_pcb");
    let board = board.is_file().then_some(board);
    tracing::debug!("Discovered root schematic {}", schematic.display());
    Ok(ProjectFiles { schematic, board })
}

/// Loading API used by both the CLI and library callers.
pub struct KihierCore;

impl KihierCore {
    /// Parse any KiCad s-expression file into a raw node tree.
    pub fn parse_file(path: &Path, kind: ParserKind) -> Result<Node, KihierError> {
        Ok(parser::parse_file_with(path, kind, None)?)
    }

    /// Load the sheet hierarchy rooted at `root`.
    pub fn load_schematic(root: &Path, options: &LoadOptions) -> Result<Schematic, KihierError> {
        Ok(loader::load_schematic(root, options)?)
    }

    /// Read a board file without any schematic.
    pub fn read_board(path: &Path, options: &LoadOptions) -> Result<Board, KihierError> {
        Ok(loader::read_board(path, options.parser)?)
    }

    /// Load a schematic and board and link footprints to components.
    pub fn load_project(root: &Path, board: &Path, options: &LoadOptions) -> Result<Project, KihierError> {
        Ok(loader::load_project(root, board, options)?)
    }

    /// Discover the project files in `dir` and load them.
    pub fn load_project_dir(dir: &Path, options: &LoadOptions) -> Result<Project, KihierError> {
        let files = discover_project_files(dir)?;
        let board = files.board.ok_or_else(|| {
            KihierError::Discovery(format!("no board file next to {}", files.schematic.display()))
        })?;
        Self::load_project(&files.schematic, &board, options)
    }

    /// Plan replicating the placement around `anchor` without touching a board.
    pub fn plan_clone(
        project: &Project,
        anchor: &str,
        options: CloneOptions,
    ) -> Result<ClonePlan, KihierError> {
        Ok(Replicator::new(project, options).plan(anchor)?)
    }
}
