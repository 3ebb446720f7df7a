//! The schematic aggregate
//!
//! Every entity lives in one map keyed by its id or path. Relationships
//! between entities (parent/children, symbol -> component, ...) are stored
//! as keys into these maps, so all navigation is a lookup.

use std::collections::BTreeMap;

use serde::Serialize;

use super::component::{ComponentDefinition, ComponentDefinitionKey, ComponentInstance};
use super::reference::ComponentReference;
use super::sheet::{SheetDefinition, SheetInstance};
use super::symbol::{SymbolDefinition, SymbolInstance};
use crate::path::{EntityPath, EntityPathComponent};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schematic {
    pub(crate) project_name: String,
    pub(crate) root_filename: String,
    pub(crate) root_path: EntityPath,
    pub(crate) sheet_definitions: BTreeMap<String, SheetDefinition>,
    pub(crate) sheet_instances: BTreeMap<EntityPath, SheetInstance>,
    pub(crate) symbol_definitions: BTreeMap<EntityPathComponent, SymbolDefinition>,
    pub(crate) symbol_instances: BTreeMap<EntityPath, SymbolInstance>,
    pub(crate) component_definitions: BTreeMap<ComponentDefinitionKey, ComponentDefinition>,
    pub(crate) component_instances: BTreeMap<ComponentReference, ComponentInstance>,
}

impl Schematic {
    pub(crate) fn new(project_name: String, root_filename: String, root_path: EntityPath) -> Self {
        Self {
            project_name,
            root_filename,
            root_path,
            sheet_definitions: BTreeMap::new(),
            sheet_instances: BTreeMap::new(),
            symbol_definitions: BTreeMap::new(),
            symbol_instances: BTreeMap::new(),
            component_definitions: BTreeMap::new(),
            component_instances: BTreeMap::new(),
        }
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Path of the root sheet instance: the root sheet's uuid alone
    pub fn root_path(&self) -> &EntityPath {
        &self.root_path
    }

    pub fn root_definition(&self) -> Option<&SheetDefinition> {
        self.sheet_definitions.get(&self.root_filename)
    }

    pub fn root_instance(&self) -> Option<&SheetInstance> {
        self.sheet_instances.get(&self.root_path)
    }

    // Definitions and instances

    pub fn sheet_definitions(&self) -> impl Iterator<Item = &SheetDefinition> {
        self.sheet_definitions.values()
    }

    pub fn sheet_definition(&self, filename: &str) -> Option<&SheetDefinition> {
        self.sheet_definitions.get(filename)
    }

    /// Sheet instances in path order, so parents precede their children
    pub fn sheet_instances(&self) -> impl Iterator<Item = &SheetInstance> {
        self.sheet_instances.values()
    }

    pub fn sheet_instance(&self, path: &EntityPath) -> Option<&SheetInstance> {
        self.sheet_instances.get(path)
    }

    pub fn symbol_definitions(&self) -> impl Iterator<Item = &SymbolDefinition> {
        self.symbol_definitions.values()
    }

    pub fn symbol_definition(&self, id: EntityPathComponent) -> Option<&SymbolDefinition> {
        self.symbol_definitions.get(&id)
    }

    pub fn symbol_instances(&self) -> impl Iterator<Item = &SymbolInstance> {
        self.symbol_instances.values()
    }

    pub fn symbol_instance(&self, path: &EntityPath) -> Option<&SymbolInstance> {
        self.symbol_instances.get(path)
    }

    pub fn component_definitions(&self) -> impl Iterator<Item = &ComponentDefinition> {
        self.component_definitions.values()
    }

    pub fn component_definition(&self, key: &ComponentDefinitionKey) -> Option<&ComponentDefinition> {
        self.component_definitions.get(key)
    }

    /// Component instances in natural designator order
    pub fn components(&self) -> impl Iterator<Item = &ComponentInstance> {
        self.component_instances.values()
    }

    /// Look up a component by designator; an invalid designator finds nothing
    pub fn component(&self, designator: &str) -> Option<&ComponentInstance> {
        let reference = designator.parse::<ComponentReference>().ok()?;
        self.component_instances.get(&reference)
    }

    // Back-references

    pub fn definition_of(&self, instance: &SheetInstance) -> Option<&SheetDefinition> {
        self.sheet_definitions.get(&instance.definition)
    }

    pub fn component_of_symbol(&self, symbol: &SymbolInstance) -> Option<&ComponentInstance> {
        symbol
            .component
            .as_ref()
            .and_then(|r| self.component_instances.get(r))
    }

    pub fn component_definition_of(&self, symbol: &SymbolDefinition) -> Option<&ComponentDefinition> {
        symbol
            .component
            .as_ref()
            .and_then(|key| self.component_definitions.get(key))
    }

    // Hierarchy

    pub fn parent(&self, path: &EntityPath) -> Option<&SheetInstance> {
        let parent = self.sheet_instances.get(path)?.parent.as_ref()?;
        self.sheet_instances.get(parent)
    }

    pub fn children(&self, path: &EntityPath) -> Vec<&SheetInstance> {
        self.sheet_instances
            .get(path)
            .map(|sheet| {
                sheet
                    .children
                    .iter()
                    .filter_map(|c| self.sheet_instances.get(c))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sheet instances from the root down to, but excluding, `path`
    pub fn ancestors(&self, path: &EntityPath) -> Vec<&SheetInstance> {
        (1..path.len())
            .filter_map(|n| self.sheet_instances.get(&path.slice(..n)))
            .collect()
    }

    /// The instance at `path` followed by every instance below it, in path order
    pub fn descendants<'s>(&'s self, path: &'s EntityPath) -> impl Iterator<Item = &'s SheetInstance> {
        self.sheet_instances
            .range(path.clone()..)
            .take_while(move |(p, _)| p.starts_with(path))
            .map(|(_, sheet)| sheet)
    }

    /// Symbol instances placed anywhere in the subtree rooted at `path`
    pub fn symbols_in_subtree<'s>(
        &'s self,
        path: &'s EntityPath,
    ) -> impl Iterator<Item = &'s SymbolInstance> {
        self.symbol_instances
            .range(path.clone()..)
            .take_while(move |(p, _)| p.starts_with(path))
            .map(|(_, symbol)| symbol)
    }

    /// Every placement of the sheet file `filename`
    pub fn instances_of(&self, filename: &str) -> Vec<&SheetInstance> {
        self.sheet_instances
            .values()
            .filter(|s| s.definition == filename)
            .collect()
    }

    pub fn common_ancestor<'a>(&self, paths: impl IntoIterator<Item = &'a EntityPath>) -> EntityPath {
        EntityPath::common_ancestor(paths)
    }

    /// How many levels above `reference` the common ancestor with `others` sits.
    ///
    /// For the hierarchy `a > b > 2×(c > d > 2×e)`, two `e` instances under the
    /// same `c` share `c/d` (1 level up from either `e`); two under different
    /// `c` share only `b` (3 levels up). A reference that is itself the common
    /// ancestor gives 0.
    pub fn common_ancestor_up_levels<'a>(
        &self,
        reference: &EntityPath,
        others: impl IntoIterator<Item = &'a EntityPath>,
    ) -> usize {
        let common = others
            .into_iter()
            .fold(reference.clone(), |acc, other| &acc & other);
        reference.len() - common.len()
    }
}
