use std::collections::BTreeMap;
use std::ops::Deref;

use serde::Serialize;

use super::board::Board;
use super::component::ComponentInstance;
use super::footprint::Footprint;
use super::schematic::Schematic;
use crate::path::EntityPathComponent;

/// Schematic and board of one design, cross-referenced by path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub(crate) schematic: Schematic,
    pub(crate) board: Board,
    pub(crate) footprints: BTreeMap<EntityPathComponent, Footprint>,
}

impl Project {
    pub fn schematic(&self) -> &Schematic {
        &self.schematic
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn footprints(&self) -> impl Iterator<Item = &Footprint> {
        self.footprints.values()
    }

    pub fn footprint(&self, id: EntityPathComponent) -> Option<&Footprint> {
        self.footprints.get(&id)
    }

    /// Footprint placed for the component `designator`
    pub fn footprint_of(&self, designator: &str) -> Option<&Footprint> {
        let id = self.schematic.component(designator)?.footprint?;
        self.footprints.get(&id)
    }

    pub fn component_of(&self, footprint: &Footprint) -> Option<&ComponentInstance> {
        footprint
            .component
            .as_ref()
            .and_then(|r| self.schematic.component_instances.get(r))
    }

    pub fn board_only_footprints(&self) -> impl Iterator<Item = &Footprint> {
        self.footprints.values().filter(|f| f.board_only)
    }

    pub fn into_parts(self) -> (Schematic, Board) {
        (self.schematic, self.board)
    }
}

impl Deref for Project {
    type Target = Schematic;

    fn deref(&self) -> &Schematic {
        &self.schematic
    }
}
