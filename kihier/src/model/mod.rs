//! Entity model
//!
//! Sheets and symbols come in two flavours: a *definition* per sheet file
//! and an *instance* per placement in the hierarchy. Components group
//! symbol units, footprints tie components to the board.

pub mod board;
pub mod component;
pub mod footprint;
pub mod project;
pub mod reference;
pub mod schematic;
pub mod sheet;
pub mod symbol;

pub use board::{Board, BoardLayer, BoardNet, LayerType, PlacedFootprint, Position, Track, TrackKind, Via, Zone};
pub use component::{
    common_value, CommonValueError, ComponentDefinition, ComponentDefinitionKey, ComponentInstance,
};
pub use footprint::Footprint;
pub use project::Project;
pub use reference::{unit_suffix, ComponentReference, ReferenceError, SymbolReference};
pub use schematic::Schematic;
pub use sheet::{SheetDeclaration, SheetDefinition, SheetInstance, SheetInstanceMetadata};
pub use symbol::{SymbolDefinition, SymbolInstance, SymbolInstanceMetadata};
