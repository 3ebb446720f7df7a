//! Components group the symbol units that make up one physical part.
//!
//! Per-unit metadata (lib id, value, flags, properties) has to agree across
//! every unit; [`common_value`] enforces that.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::reference::ComponentReference;
use crate::path::{EntityPath, EntityPathComponent};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommonValueError {
    #[error("no values to merge")]
    Empty,
    #[error("conflicting values: {}", .0.join(", "))]
    Conflicting(Vec<String>),
}

/// The single distinct value among `items`
pub fn common_value<T, I>(items: I) -> Result<T, CommonValueError>
where
    I: IntoIterator<Item = T>,
    T: PartialEq + fmt::Debug,
{
    let mut distinct: Vec<T> = Vec::new();
    for item in items {
        if !distinct.contains(&item) {
            distinct.push(item);
        }
    }
    if distinct.len() > 1 {
        return Err(CommonValueError::Conflicting(
            distinct.iter().map(|v| format!("{:?}", v)).collect(),
        ));
    }
    distinct.pop().ok_or(CommonValueError::Empty)
}

/// A component definition is addressed by its sheet file and local designator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentDefinitionKey {
    pub sheet: String,
    pub reference: ComponentReference,
}

impl fmt::Display for ComponentDefinitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sheet, self.reference)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub key: ComponentDefinitionKey,
    pub lib_id: String,
    pub value: String,
    pub in_bom: bool,
    pub on_board: bool,
    pub dnp: bool,
    pub properties: BTreeMap<String, String>,
    pub units: Vec<EntityPathComponent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInstance {
    pub reference: ComponentReference,
    pub definition: ComponentDefinitionKey,
    pub lib_id: String,
    pub value: String,
    pub in_bom: bool,
    pub on_board: bool,
    pub dnp: bool,
    pub properties: BTreeMap<String, String>,
    /// Symbol instance paths, ordered by unit
    pub units: Vec<EntityPath>,
    pub footprint: Option<EntityPathComponent>,
}

impl ComponentInstance {
    /// Deepest sheet instance holding every unit of this component
    pub fn sheet(&self) -> EntityPath {
        let sheets: Vec<EntityPath> = self.units.iter().filter_map(EntityPath::parent).collect();
        EntityPath::common_ancestor(&sheets)
    }
}
