//! Clone engine: replicate one sheet instance's board placement onto others
//!
//! Placement work is expressed as [`Command`]s run against a [`BoardEdit`],
//! so any host that can move, rotate and flip footprints can drive it and a
//! failed run is always rolled back.

pub mod board;
pub mod command;
pub mod replicator;
pub mod transform;

use thiserror::Error;

use crate::loader::LoadError;
use crate::path::EntityPath;

pub use board::{BoardEdit, BoardError, BoardItem, ItemId, SimulatedBoard};
pub use command::{AppliedCommands, Command, CommandList, CommandRecord};
pub use replicator::{ClonePlan, CloneOptions, PlacementStrategy, Replicator};
pub use transform::{normalize_angle, normalize_orientation, Placement, TransformDelta};

#[derive(Debug, Error)]
pub enum CloneError {
    #[error("no footprints to replicate under sheet {0}")]
    NoFootprints(EntityPath),
    #[error("no anchor footprint for {0}")]
    NoAnchor(String),
    #[error("no other instances of sheet {0} to replicate onto")]
    NoTargets(EntityPath),
    #[error("sheet instances {first} and {second} overlap")]
    OverlappingTargets { first: EntityPath, second: EntityPath },
    #[error("{target} is not another instance of {expected}")]
    TargetMismatch { target: EntityPath, expected: String },
    #[error("cannot go up {requested} levels from a sheet {depth} levels deep")]
    InvalidUpLevels { requested: usize, depth: usize },
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error("{source}; {applied} applied changes were reverted")]
    PartialChangesReverted { applied: usize, source: BoardError },
    #[error("rollback failed ({source}) after {cause}; the board is partially modified")]
    RollbackFailed { cause: BoardError, source: BoardError },
    #[error(transparent)]
    Load(#[from] LoadError),
}
