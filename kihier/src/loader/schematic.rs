//! Schematic hierarchy loader
//!
//! Runs four passes, each to completion before the next:
//!
//! 1. discover every sheet file reachable from the root, parsing each once
//! 2. instantiate sheets top-down from the root instance
//! 3. read symbols and resolve one symbol instance per placement
//! 4. group symbols into components and merge their metadata

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use super::context::{normalize_filename, LoaderContext};
use super::{absolute_path, AmbiguousMetadata, InFile, LoadError, StructuralInconsistency};
use crate::core::LoadOptions;
use crate::model::{
    common_value, CommonValueError, ComponentDefinition, ComponentDefinitionKey, ComponentInstance,
    ComponentReference, Schematic, SheetDeclaration, SheetDefinition, SheetInstance,
    SheetInstanceMetadata, SymbolDefinition, SymbolInstance, SymbolInstanceMetadata,
    SymbolReference,
};
use crate::parser::{Node, ProgressObserver};
use crate::path::{EntityPath, EntityPathComponent};
use crate::selection::Selection;

pub struct SchematicLoader<'o> {
    options: LoadOptions,
    observer: Option<&'o mut dyn ProgressObserver>,
}

impl<'o> SchematicLoader<'o> {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            observer: None,
        }
    }

    /// Receive parse progress for every sheet file read
    pub fn with_observer(mut self, observer: &'o mut dyn ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn load(self, root: &Path) -> Result<Schematic, LoadError> {
        let root_filename = root
            .file_name()
            .and_then(|n| n.to_str())
            .map(normalize_filename)
            .ok_or_else(|| LoadError::format(&root.display().to_string(), "not a file path"))?;
        let base_dir = root.parent().unwrap_or_else(|| Path::new("."));
        let project_name = match &self.options.project_name {
            Some(name) => name.clone(),
            None => root
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string(),
        };

        let mut context = LoaderContext::new(base_dir, &project_name, self.options.parser);
        if let Some(observer) = self.observer {
            context = context.with_observer(observer);
        }

        tracing::debug!("Loading schematic {} for project '{}'", root.display(), project_name);
        let definitions = discover_sheets(&mut context, &root_filename)?;
        if context.has_cycle() {
            tracing::warn!("Sheet files of '{}' reference each other recursively", project_name);
        }

        let root_definition = definitions
            .get(&root_filename)
            .ok_or_else(|| LoadError::format(&root_filename, "root sheet was not loaded"))?;
        let root_path = EntityPath::from_component(root_definition.id);
        let mut schematic = Schematic::new(project_name, root_filename, root_path);
        schematic.sheet_definitions = definitions;

        instantiate_sheets(&context, &mut schematic)?;
        build_symbols(&context, &mut schematic)?;
        group_components(&mut schematic)?;

        tracing::info!(
            "Loaded {} sheet files, {} sheet instances, {} symbols, {} components",
            schematic.sheet_definitions.len(),
            schematic.sheet_instances.len(),
            schematic.symbol_instances.len(),
            schematic.component_instances.len()
        );
        Ok(schematic)
    }
}

fn document_root<'a>(document: &'a Node, file: &str, key: &str) -> Result<Selection<'a>, LoadError> {
    let root = Selection::of(document).children(key);
    if root.is_empty() {
        return Err(LoadError::format(file, format!("expected a '{}' document", key)));
    }
    Ok(root)
}

fn uuid_of(node: &Selection<'_>, file: &str) -> Result<EntityPathComponent, LoadError> {
    node.child_value("uuid").in_file(file)?.parse().in_file(file)
}

/// `(instances (project "<name>" (path "..." ...)))` entries for one project
fn instance_paths<'a>(node: &Selection<'a>, project: &str) -> Selection<'a> {
    node.children("instances")
        .children("project")
        .filter(0, project)
        .children("path")
}

// Pass 1

fn discover_sheets(
    context: &mut LoaderContext<'_>,
    root_filename: &str,
) -> Result<BTreeMap<String, SheetDefinition>, LoadError> {
    let mut definitions = BTreeMap::new();
    discover(context, root_filename, &mut definitions)?;
    tracing::debug!("Discovered {} sheet files", definitions.len());
    Ok(definitions)
}

fn discover(
    context: &mut LoaderContext<'_>,
    filename: &str,
    definitions: &mut BTreeMap<String, SheetDefinition>,
) -> Result<(), LoadError> {
    let document = context.parse(filename)?;
    let definition = read_sheet_definition(&document, filename, context.project_name())?;
    let children: Vec<String> = definition.child_filenames().map(str::to_string).collect();
    context.insert(filename, document);
    definitions.insert(filename.to_string(), definition);

    for child in children {
        context.link(filename, &child);
        if !context.is_loaded(&child) {
            discover(context, &child, definitions)?;
        }
    }
    Ok(())
}

fn read_sheet_definition(
    document: &Node,
    filename: &str,
    project: &str,
) -> Result<SheetDefinition, LoadError> {
    let sch = document_root(document, filename, "kicad_sch")?;
    let id = uuid_of(&sch, filename)?;
    let version = sch.child_value("version").in_file(filename)?.to_string();

    let mut sheets = Vec::new();
    for sheet in sch.children("sheet") {
        sheets.push(read_sheet_declaration(&sheet, filename, project)?);
    }

    Ok(SheetDefinition {
        id,
        version,
        filename: filename.to_string(),
        sheets,
        symbols: Vec::new(),
        instances: Vec::new(),
    })
}

fn read_sheet_declaration(
    sheet: &Selection<'_>,
    file: &str,
    project: &str,
) -> Result<SheetDeclaration, LoadError> {
    let id = uuid_of(sheet, file)?;
    // KiCad 6 spelled these "Sheet name" / "Sheet file"
    let name = sheet
        .property("Sheetname")
        .or_else(|_| sheet.property("Sheet name"))
        .map_err(|_| LoadError::format(file, format!("sheet {} has no Sheetname", id)))?;
    let sheet_file = sheet
        .property("Sheetfile")
        .or_else(|_| sheet.property("Sheet file"))
        .map_err(|_| LoadError::format(file, format!("sheet {} has no Sheetfile", id)))?;

    let mut instances = Vec::new();
    for entry in instance_paths(sheet, project) {
        let path: EntityPath = entry.value_by_index(0).in_file(file)?.parse().in_file(file)?;
        let page = entry.child_value("page").unwrap_or_default().to_string();
        instances.push(SheetInstanceMetadata { path, page });
    }

    Ok(SheetDeclaration {
        id,
        name: name.to_string(),
        filename: normalize_filename(sheet_file),
        instances,
    })
}

// Pass 2

fn root_page(document: &Node) -> String {
    Selection::of(document)
        .children("kicad_sch")
        .children("sheet_instances")
        .children("path")
        .filter(0, "/")
        .child_value("page")
        .unwrap_or("1")
        .to_string()
}

fn instantiate_sheets(context: &LoaderContext<'_>, schematic: &mut Schematic) -> Result<(), LoadError> {
    let root_path = schematic.root_path.clone();
    let root_filename = schematic.root_filename.clone();
    let page = context.document(&root_filename).map(root_page).unwrap_or_else(|| "1".to_string());

    schematic.sheet_instances.insert(
        root_path.clone(),
        SheetInstance {
            definition: root_filename.clone(),
            path: root_path.clone(),
            name: schematic.project_name.clone(),
            page,
            parent: None,
            children: Vec::new(),
            symbols: Vec::new(),
        },
    );
    if let Some(root) = schematic.sheet_definitions.get_mut(&root_filename) {
        root.instances.push(root_path.clone());
    }

    let mut pending = vec![root_path.clone()];
    while let Some(parent_path) = pending.pop() {
        let definition = match schematic.sheet_instances.get(&parent_path) {
            Some(parent) => parent.definition.clone(),
            None => continue,
        };
        let declarations = match schematic.sheet_definitions.get(&definition) {
            Some(def) => def.sheets.clone(),
            None => {
                return Err(StructuralInconsistency::MissingSheetDefinition {
                    filename: definition,
                    parent: parent_path,
                }
                .into())
            }
        };

        for declaration in declarations {
            if declaration.instances.is_empty() {
                tracing::warn!(
                    "Sheet '{}' in {} has no instances for project '{}'",
                    declaration.name,
                    definition,
                    context.project_name()
                );
            }
            let placements = declaration
                .instances
                .iter()
                .filter(|entry| absolute_path(entry.path.clone(), &root_path) == parent_path);
            for entry in placements {
                let path = parent_path.child(declaration.id);
                if !schematic.sheet_definitions.contains_key(&declaration.filename) {
                    return Err(StructuralInconsistency::MissingSheetDefinition {
                        filename: declaration.filename.clone(),
                        parent: parent_path.clone(),
                    }
                    .into());
                }
                if schematic.sheet_instances.contains_key(&path) {
                    return Err(StructuralInconsistency::DuplicatePath(path).into());
                }

                schematic.sheet_instances.insert(
                    path.clone(),
                    SheetInstance {
                        definition: declaration.filename.clone(),
                        path: path.clone(),
                        name: declaration.name.clone(),
                        page: entry.page.clone(),
                        parent: Some(parent_path.clone()),
                        children: Vec::new(),
                        symbols: Vec::new(),
                    },
                );
                if let Some(parent) = schematic.sheet_instances.get_mut(&parent_path) {
                    parent.children.push(path.clone());
                }
                if let Some(def) = schematic.sheet_definitions.get_mut(&declaration.filename) {
                    def.instances.push(path.clone());
                }
                pending.push(path);
            }
        }
    }

    tracing::debug!("Instantiated {} sheet instances", schematic.sheet_instances.len());
    Ok(())
}

// Pass 3

/// Unit number of a library sub-symbol named `<name>_<unit>_<style>`
fn sub_symbol_unit(name: &str) -> Option<u32> {
    let mut parts = name.rsplitn(3, '_');
    let _style = parts.next()?;
    parts.next()?.parse().ok()
}

fn is_multi_unit(libraries: &Selection<'_>, lib_name: &str, file: &str) -> Result<bool, LoadError> {
    let symbol = libraries.children("symbol").filter(0, lib_name);
    let symbol = symbol
        .single()
        .map_err(|_| LoadError::format(file, format!("library symbol '{}' not found", lib_name)))?;
    let units: BTreeSet<u32> = Selection::of(symbol)
        .children("symbol")
        .iter()
        .filter_map(|sub| sub.value_by_index(0).ok().and_then(sub_symbol_unit))
        .filter(|&unit| unit != 0)
        .collect();
    Ok(units.len() > 1)
}

fn read_symbol(
    symbol: &Selection<'_>,
    libraries: &Selection<'_>,
    file: &str,
    project: &str,
) -> Result<SymbolDefinition, LoadError> {
    let id = uuid_of(symbol, file)?;
    let lib_id = symbol.child_value("lib_id").in_file(file)?.to_string();
    // A locally edited symbol is cached under `lib_name` instead
    let lib_name = symbol
        .child_value("lib_name")
        .map(str::to_string)
        .unwrap_or_else(|_| lib_id.clone());
    let unit = if symbol.children("unit").is_empty() {
        1
    } else {
        symbol.child_value("unit").in_file(file)?.parse().in_file(file)?
    };
    let reference = symbol.property("Reference").in_file(file)?;
    let value = symbol.property("Value").unwrap_or_default().to_string();

    let mut properties = BTreeMap::new();
    for property in symbol.children("property") {
        let name = property.value_by_index(0).in_file(file)?;
        if name == "Reference" || name == "Value" {
            continue;
        }
        properties.insert(name.to_string(), property.value_or(1, "").in_file(file)?.to_string());
    }

    let mut instance_metadata = Vec::new();
    for entry in instance_paths(symbol, project) {
        instance_metadata.push(SymbolInstanceMetadata {
            path: entry.value_by_index(0).in_file(file)?.parse().in_file(file)?,
            reference: entry.child_value("reference").in_file(file)?.to_string(),
            unit: if entry.children("unit").is_empty() {
                unit
            } else {
                entry.child_value("unit").in_file(file)?.parse().in_file(file)?
            },
        });
    }

    let multi_unit = is_multi_unit(libraries, &lib_name, file)?;
    // Unannotated sheets keep "R?" locally; fall back to the first annotation
    let local = SymbolReference::new(reference, unit, multi_unit).or_else(|err| {
        instance_metadata
            .first()
            .ok_or(err)
            .and_then(|entry| SymbolReference::new(&entry.reference, unit, multi_unit))
            .in_file(file)
    })?;

    Ok(SymbolDefinition {
        id,
        sheet: file.to_string(),
        lib_id,
        reference: local,
        value,
        in_bom: symbol.flag("in_bom", true).in_file(file)?,
        on_board: symbol.flag("on_board", true).in_file(file)?,
        dnp: symbol.flag("dnp", false).in_file(file)?,
        properties,
        instance_metadata,
        instances: Vec::new(),
        component: None,
    })
}

fn build_symbols(context: &LoaderContext<'_>, schematic: &mut Schematic) -> Result<(), LoadError> {
    let project = context.project_name();
    let root_path = schematic.root_path.clone();

    for (file, document) in context.documents() {
        let sch = document_root(document, file, "kicad_sch")?;
        let libraries = sch.children("lib_symbols");

        for node in sch.children("symbol") {
            let mut definition = read_symbol(&node, &libraries, file, project)?;
            let id = definition.id;
            if schematic.symbol_definitions.contains_key(&id) {
                return Err(StructuralInconsistency::DuplicateSymbol {
                    id,
                    file: file.to_string(),
                }
                .into());
            }
            if definition.instance_metadata.is_empty() {
                tracing::warn!(
                    "Symbol {} in {} has no instances for project '{}'",
                    definition.reference,
                    file,
                    project
                );
            }

            for entry in &definition.instance_metadata {
                let sheet_path = absolute_path(entry.path.clone(), &root_path);
                let on_this_file = schematic
                    .sheet_instances
                    .get(&sheet_path)
                    .is_some_and(|sheet| sheet.definition == file);
                if !on_this_file {
                    return Err(StructuralInconsistency::MissingSheetInstance {
                        symbol: id,
                        file: file.to_string(),
                        path: sheet_path,
                    }
                    .into());
                }

                let path = sheet_path.child(id);
                if schematic.symbol_instances.contains_key(&path) {
                    return Err(StructuralInconsistency::DuplicatePath(path).into());
                }
                let reference =
                    SymbolReference::new(&entry.reference, entry.unit, definition.reference.multi_unit)
                        .in_file(file)?;

                schematic.symbol_instances.insert(
                    path.clone(),
                    SymbolInstance {
                        sheet: sheet_path.clone(),
                        definition: id,
                        path: path.clone(),
                        reference,
                        component: None,
                    },
                );
                if let Some(sheet) = schematic.sheet_instances.get_mut(&sheet_path) {
                    sheet.symbols.push(path.clone());
                }
                definition.instances.push(path);
            }

            if let Some(sheet) = schematic.sheet_definitions.get_mut(file) {
                sheet.symbols.push(id);
            }
            schematic.symbol_definitions.insert(id, definition);
        }
    }

    tracing::debug!(
        "Read {} symbol definitions, {} symbol instances",
        schematic.symbol_definitions.len(),
        schematic.symbol_instances.len()
    );
    Ok(())
}

// Pass 4

fn merge<T, I>(designator: &str, field: &str, values: I) -> Result<T, LoadError>
where
    I: IntoIterator<Item = T>,
    T: PartialEq + fmt::Debug,
{
    common_value(values).map_err(|err| {
        let values = match err {
            CommonValueError::Conflicting(values) => values,
            CommonValueError::Empty => Vec::new(),
        };
        AmbiguousMetadata {
            designator: designator.to_string(),
            field: field.to_string(),
            values,
        }
        .into()
    })
}

/// Metadata every unit of a component must agree on
struct Merged {
    lib_id: String,
    value: String,
    in_bom: bool,
    on_board: bool,
    dnp: bool,
    properties: BTreeMap<String, String>,
}

fn merge_units(designator: &str, units: &[&SymbolDefinition]) -> Result<Merged, LoadError> {
    Ok(Merged {
        lib_id: merge(designator, "lib_id", units.iter().map(|u| u.lib_id.clone()))?,
        value: merge(designator, "value", units.iter().map(|u| u.value.clone()))?,
        in_bom: merge(designator, "in_bom", units.iter().map(|u| u.in_bom))?,
        on_board: merge(designator, "on_board", units.iter().map(|u| u.on_board))?,
        dnp: merge(designator, "dnp", units.iter().map(|u| u.dnp))?,
        properties: merge(designator, "properties", units.iter().map(|u| u.properties.clone()))?,
    })
}

fn group_components(schematic: &mut Schematic) -> Result<(), LoadError> {
    let mut definition_groups: BTreeMap<ComponentDefinitionKey, Vec<EntityPathComponent>> =
        BTreeMap::new();
    for symbol in schematic.symbol_definitions.values() {
        let key = ComponentDefinitionKey {
            sheet: symbol.sheet.clone(),
            reference: symbol.reference.reference.clone(),
        };
        definition_groups.entry(key).or_default().push(symbol.id);
    }

    for (key, mut ids) in definition_groups {
        let units: Vec<&SymbolDefinition> = ids
            .iter()
            .filter_map(|id| schematic.symbol_definitions.get(id))
            .collect();
        let merged = merge_units(&key.to_string(), &units)?;
        ids.sort_by_key(|id| {
            schematic
                .symbol_definitions
                .get(id)
                .map(|s| s.reference.unit)
                .unwrap_or_default()
        });
        for id in &ids {
            if let Some(symbol) = schematic.symbol_definitions.get_mut(id) {
                symbol.component = Some(key.clone());
            }
        }
        schematic.component_definitions.insert(
            key.clone(),
            ComponentDefinition {
                key,
                lib_id: merged.lib_id,
                value: merged.value,
                in_bom: merged.in_bom,
                on_board: merged.on_board,
                dnp: merged.dnp,
                properties: merged.properties,
                units: ids,
            },
        );
    }

    let mut instance_groups: BTreeMap<ComponentReference, Vec<EntityPath>> = BTreeMap::new();
    for symbol in schematic.symbol_instances.values() {
        instance_groups
            .entry(symbol.reference.reference.clone())
            .or_default()
            .push(symbol.path.clone());
    }

    for (reference, mut paths) in instance_groups {
        paths.sort_by_key(|path| {
            let unit = schematic.symbol_instances.get(path).map(|s| s.unit());
            (unit, path.clone())
        });
        let units: Vec<&SymbolDefinition> = paths
            .iter()
            .filter_map(|path| schematic.symbol_instances.get(path))
            .filter_map(|symbol| schematic.symbol_definitions.get(&symbol.definition))
            .collect();
        let unit_numbers: BTreeSet<u32> = paths
            .iter()
            .filter_map(|path| schematic.symbol_instances.get(path).map(|s| s.unit()))
            .collect();
        if unit_numbers.len() < paths.len() {
            tracing::warn!("Designator {} is used by more than one symbol per unit", reference);
        }

        let merged = merge_units(reference.designator(), &units)?;
        // Units placed from different sheet files belong to different definitions
        let definition = merge(
            reference.designator(),
            "definition",
            units.iter().map(|symbol| symbol.component.clone()),
        )?
        .ok_or_else(|| {
            LoadError::format(&schematic.root_filename, format!("{} has no definition", reference))
        })?;

        for path in &paths {
            if let Some(symbol) = schematic.symbol_instances.get_mut(path) {
                symbol.component = Some(reference.clone());
            }
        }
        schematic.component_instances.insert(
            reference.clone(),
            ComponentInstance {
                reference,
                definition,
                lib_id: merged.lib_id,
                value: merged.value,
                in_bom: merged.in_bom,
                on_board: merged.on_board,
                dnp: merged.dnp,
                properties: merged.properties,
                units: paths,
                footprint: None,
            },
        );
    }

    tracing::debug!(
        "Grouped {} component definitions, {} component instances",
        schematic.component_definitions.len(),
        schematic.component_instances.len()
    );
    Ok(())
}
