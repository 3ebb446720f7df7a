use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::board::{is_back_layer, PlacedFootprint, Position};
use super::reference::ComponentReference;
use crate::path::{EntityPath, EntityPathComponent};

/// A board footprint linked back to the schematic.
///
/// `symbol_path` is the absolute path of the first unit's symbol instance
/// (root uuid included); both it and `component` stay `None` for
/// board-only footprints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub id: EntityPathComponent,
    pub reference: String,
    pub lib_id: String,
    pub locked: bool,
    pub board_only: bool,
    pub layer: String,
    pub position: Position,
    pub orientation: f64,
    pub properties: BTreeMap<String, String>,
    pub symbol_path: Option<EntityPath>,
    pub component: Option<ComponentReference>,
}

impl Footprint {
    pub fn from_placed(
        placed: &PlacedFootprint,
        symbol_path: Option<EntityPath>,
        component: Option<ComponentReference>,
    ) -> Self {
        Self {
            id: placed.id,
            reference: placed.reference.clone(),
            lib_id: placed.lib_id.clone(),
            locked: placed.locked,
            board_only: placed.board_only,
            layer: placed.layer.clone(),
            position: placed.position,
            orientation: placed.orientation,
            properties: placed.properties.clone(),
            symbol_path,
            component,
        }
    }

    pub fn is_flipped(&self) -> bool {
        is_back_layer(&self.layer)
    }
}
