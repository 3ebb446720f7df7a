//! Schematic symbols: one definition per `(symbol ...)` block in a sheet file,
//! one instance per placement of that sheet.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::component::ComponentDefinitionKey;
use super::reference::{ComponentReference, SymbolReference};
use crate::path::{EntityPath, EntityPathComponent};

/// One `(path "..." (reference "R1") (unit 1))` entry of a placed symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInstanceMetadata {
    pub path: EntityPath,
    pub reference: String,
    pub unit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDefinition {
    pub id: EntityPathComponent,
    pub sheet: String,
    pub lib_id: String,
    pub reference: SymbolReference,
    pub value: String,
    pub in_bom: bool,
    pub on_board: bool,
    pub dnp: bool,
    pub properties: BTreeMap<String, String>,
    pub instance_metadata: Vec<SymbolInstanceMetadata>,
    pub instances: Vec<EntityPath>,
    pub component: Option<ComponentDefinitionKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInstance {
    pub sheet: EntityPath,
    pub definition: EntityPathComponent,
    pub path: EntityPath,
    pub reference: SymbolReference,
    pub component: Option<ComponentReference>,
}

impl SymbolInstance {
    pub fn unit(&self) -> u32 {
        self.reference.unit
    }
}
