//! Layout loader
//!
//! Reads a `.kicad_pcb` file into a [`Board`] snapshot and links every
//! footprint to the component it was placed for.
//!
//! Accepted shapes:
//! - KiCad 6/7: `(fp_text reference "R1" ...)`, bare `locked`, `tstamp`
//! - KiCad 8+: `(property "Reference" "R1" ...)`, `(locked yes)`, `uuid`

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::{absolute_path, InFile, LoadError, StructuralInconsistency};
use crate::model::{
    Board, BoardLayer, BoardNet, ComponentReference, Footprint, LayerType, PlacedFootprint, Position,
    Project, Schematic, Track, TrackKind, Via, Zone,
};
use crate::parser::{parse_file_with, Node, ParserKind, ProgressObserver};
use crate::path::{EntityPath, EntityPathComponent};
use crate::selection::Selection;

pub struct LayoutLoader<'o> {
    parser: ParserKind,
    observer: Option<&'o mut dyn ProgressObserver>,
}

impl<'o> LayoutLoader<'o> {
    pub fn new(parser: ParserKind) -> Self {
        Self {
            parser,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: &'o mut dyn ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Read `path` and cross-reference it against `schematic`
    pub fn load(self, schematic: Schematic, path: &Path) -> Result<Project, LoadError> {
        let document = match self.observer {
            Some(observer) => parse_file_with(path, self.parser, Some(observer))?,
            None => parse_file_with(path, self.parser, None)?,
        };
        let board = board_from_document(&document, &file_label(path))?;
        cross_reference(schematic, board)
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse a board file on its own, without a schematic
pub fn read_board(path: &Path, parser: ParserKind) -> Result<Board, LoadError> {
    let document = parse_file_with(path, parser, None)?;
    board_from_document(&document, &file_label(path))
}

pub fn board_from_document(document: &Node, filename: &str) -> Result<Board, LoadError> {
    let pcb = Selection::of(document).children("kicad_pcb");
    if pcb.is_empty() {
        return Err(LoadError::format(filename, "expected a 'kicad_pcb' document"));
    }

    let mut board = Board {
        filename: filename.to_string(),
        version: pcb.child_value("version").in_file(filename)?.to_string(),
        id: if pcb.children("uuid").is_empty() {
            None
        } else {
            Some(pcb.child_value("uuid").in_file(filename)?.parse().in_file(filename)?)
        },
        ..Default::default()
    };

    board.layers = parse_layers(&pcb.children("layers"), filename)?;
    for net in pcb.children("net") {
        board.nets.push(BoardNet {
            id: net.value_by_index(0).in_file(filename)?.parse().in_file(filename)?,
            name: net.value_or(1, "").in_file(filename)?.to_string(),
        });
    }
    // KiCad 5 boards call footprints "module"
    for node in pcb.children("footprint") + pcb.children("module") {
        board.footprints.push(parse_footprint(&node, filename)?);
    }
    for node in pcb.children("segment") {
        board.tracks.push(parse_track(&node, TrackKind::Segment, &board.nets, filename)?);
    }
    for node in pcb.children("arc") {
        let mid = parse_xy(&node.children("mid"), filename)?;
        board.tracks.push(parse_track(&node, TrackKind::Arc { mid }, &board.nets, filename)?);
    }
    for node in pcb.children("via") {
        board.vias.push(parse_via(&node, &board.nets, filename)?);
    }
    for node in pcb.children("zone") {
        board.zones.push(parse_zone(&node, &board.nets, filename)?);
    }

    tracing::debug!(
        "Read board {}: {} footprints, {} tracks, {} vias, {} zones",
        filename,
        board.footprints.len(),
        board.tracks.len(),
        board.vias.len(),
        board.zones.len()
    );
    Ok(board)
}

fn item_id(node: &Selection<'_>, file: &str) -> Result<EntityPathComponent, LoadError> {
    let key = if node.children("uuid").is_empty() { "tstamp" } else { "uuid" };
    node.child_value(key).in_file(file)?.parse().in_file(file)
}

fn parse_number(value: &str, file: &str) -> Result<f64, LoadError> {
    value.parse::<f64>().in_file(file)
}

fn parse_xy(node: &Selection<'_>, file: &str) -> Result<Position, LoadError> {
    Ok(Position::new(
        parse_number(node.value_by_index(0).in_file(file)?, file)?,
        parse_number(node.value_by_index(1).in_file(file)?, file)?,
    ))
}

/// `(locked yes)` in KiCad 8+, a bare `locked` token before that
fn is_locked(node: &Selection<'_>, file: &str) -> Result<bool, LoadError> {
    let bare = node.values().in_file(file)?.iter().any(|v| v == "locked");
    Ok(bare || node.flag("locked", false).in_file(file)?)
}

/// `(net 3)` or, in newer files, `(net "GND")`
fn net_id(node: &Selection<'_>, nets: &[BoardNet], file: &str) -> Result<u32, LoadError> {
    let net = node.children("net");
    if net.is_empty() {
        return Ok(0);
    }
    let value = net.value_by_index(0).in_file(file)?;
    match value.parse() {
        Ok(id) => Ok(id),
        Err(_) => nets
            .iter()
            .find(|n| n.name == value)
            .map(|n| n.id)
            .ok_or_else(|| LoadError::format(file, format!("unknown net '{}'", value))),
    }
}

fn parse_layers(layers: &Selection<'_>, file: &str) -> Result<Vec<BoardLayer>, LoadError> {
    let mut result = Vec::new();
    // Entries are keyed by ordinal: `(0 "F.Cu" signal)`
    for layer in layers.nodes().iter().flat_map(|n| n.children()) {
        let entry = Selection::of(layer);
        result.push(BoardLayer {
            ordinal: entry.key().in_file(file)?.parse().in_file(file)?,
            canonical_name: entry.value_by_index(0).in_file(file)?.to_string(),
            layer_type: LayerType::from_token(entry.value_or(1, "signal").in_file(file)?),
            user_name: entry.value_by_index(2).ok().map(str::to_string),
        });
    }
    Ok(result)
}

fn parse_footprint(node: &Selection<'_>, file: &str) -> Result<PlacedFootprint, LoadError> {
    let at = node.children("at");
    let mut properties = BTreeMap::new();
    for property in node.children("property") {
        properties.insert(
            property.value_by_index(0).in_file(file)?.to_string(),
            property.value_or(1, "").in_file(file)?.to_string(),
        );
    }
    let text = |kind: &str| -> Option<String> {
        node.children("fp_text")
            .filter(0, kind)
            .value_by_index(1)
            .ok()
            .map(str::to_string)
    };
    let reference = properties
        .get("Reference")
        .cloned()
        .or_else(|| text("reference"))
        .unwrap_or_default();
    let value = properties
        .get("Value")
        .cloned()
        .or_else(|| text("value"))
        .unwrap_or_default();
    let board_only = node
        .children("attr")
        .first()
        .is_some_and(|attr| attr.values().iter().any(|v| v == "board_only"));
    let path = node.child_value("path").ok().map(str::to_string);

    Ok(PlacedFootprint {
        id: item_id(node, file)?,
        lib_id: node.value_by_index(0).in_file(file)?.to_string(),
        reference,
        value,
        path,
        position: parse_xy(&at, file)?,
        orientation: parse_number(at.value_or(2, "0").in_file(file)?, file)?,
        layer: node.child_value("layer").in_file(file)?.to_string(),
        locked: is_locked(node, file)?,
        board_only,
        properties,
    })
}

fn parse_track(
    node: &Selection<'_>,
    kind: TrackKind,
    nets: &[BoardNet],
    file: &str,
) -> Result<Track, LoadError> {
    Ok(Track {
        id: item_id(node, file)?,
        kind,
        start: parse_xy(&node.children("start"), file)?,
        end: parse_xy(&node.children("end"), file)?,
        width: parse_number(node.child_value("width").in_file(file)?, file)?,
        layer: node.child_value("layer").in_file(file)?.to_string(),
        net: net_id(node, nets, file)?,
        locked: is_locked(node, file)?,
    })
}

fn parse_via(node: &Selection<'_>, nets: &[BoardNet], file: &str) -> Result<Via, LoadError> {
    Ok(Via {
        id: item_id(node, file)?,
        position: parse_xy(&node.children("at"), file)?,
        size: parse_number(node.child_value("size").in_file(file)?, file)?,
        drill: parse_number(node.child_value("drill").in_file(file)?, file)?,
        layers: node.children("layers").values().in_file(file)?.to_vec(),
        net: net_id(node, nets, file)?,
        locked: is_locked(node, file)?,
    })
}

fn parse_zone(node: &Selection<'_>, nets: &[BoardNet], file: &str) -> Result<Zone, LoadError> {
    let net = net_id(node, nets, file)?;
    // Multi-layer zones list `(layers ...)`, single-layer ones `(layer ...)`
    let layers = match node.children("layers").values() {
        Ok(layers) => layers.to_vec(),
        Err(_) => vec![node.child_value("layer").in_file(file)?.to_string()],
    };
    let mut outline = Vec::new();
    for point in node.children("polygon").children("pts").children("xy") {
        outline.push(parse_xy(&point, file)?);
    }
    let net_name = match node.child_value("net_name") {
        Ok(name) => name.to_string(),
        Err(_) => nets
            .iter()
            .find(|n| n.id == net)
            .map(|n| n.name.clone())
            .unwrap_or_default(),
    };

    Ok(Zone {
        id: item_id(node, file)?,
        net,
        net_name,
        layers,
        outline,
        locked: is_locked(node, file)?,
    })
}

/// Link board footprints to component instances by symbol path.
///
/// Every footprint that is not board-only must resolve to exactly one
/// component, and no component may receive two footprints.
pub fn cross_reference(mut schematic: Schematic, board: Board) -> Result<Project, LoadError> {
    let root = schematic.root_path().clone();
    let mut by_unit: HashMap<EntityPath, ComponentReference> = HashMap::new();
    for component in schematic.component_instances.values() {
        for unit in &component.units {
            by_unit.insert(unit.clone(), component.reference.clone());
        }
    }

    let mut footprints = BTreeMap::new();
    for placed in &board.footprints {
        if placed.board_only {
            footprints.insert(placed.id, Footprint::from_placed(placed, None, None));
            continue;
        }

        let unmatched = || StructuralInconsistency::UnmatchedFootprint {
            reference: placed.reference.clone(),
            path: placed.path.clone(),
        };
        let native = placed.path.as_deref().ok_or_else(unmatched)?;
        let path = absolute_path(native.parse::<EntityPath>().map_err(|_| unmatched())?, &root);
        let reference = by_unit.get(&path).ok_or_else(unmatched)?;
        let component = schematic
            .component_instances
            .get_mut(reference)
            .ok_or_else(unmatched)?;

        if let Some(first) = component.footprint {
            return Err(StructuralInconsistency::DuplicateFootprint {
                designator: reference.to_string(),
                first,
                second: placed.id,
            }
            .into());
        }
        component.footprint = Some(placed.id);
        footprints.insert(
            placed.id,
            Footprint::from_placed(placed, Some(path), Some(reference.clone())),
        );
    }

    for component in schematic.component_instances.values() {
        if component.footprint.is_none() && component.on_board && !component.reference.is_virtual() {
            tracing::debug!("Component {} has no footprint on the board", component.reference);
        }
    }
    tracing::info!(
        "Linked {} footprints ({} board-only) to {} components",
        footprints.len(),
        board.footprints.iter().filter(|f| f.board_only).count(),
        schematic.component_instances.len()
    );

    Ok(Project {
        schematic,
        board,
        footprints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    const BOARD: &str = r#"(kicad_pcb (version 20240108) (generator "pcbnew")
        (layers (0 "F.Cu" signal) (31 "B.Cu" signal "Bottom") (44 "Edge.Cuts" user))
        (net 0 "") (net 1 "GND")
        (footprint "Resistor_SMD:R_0603" locked (layer "F.Cu")
            (uuid "aaaaaaaa-0000-4000-8000-000000000001")
            (at 10 20 90)
            (property "Reference" "R1" (at 0 0 0))
            (property "Value" "10k")
            (path "/22222222-2222-4222-8222-222222222222/33333333-3333-4333-8333-333333333333")
            (attr smd))
        (module "MountingHole:M3" (layer "B.Cu") (tstamp "aaaaaaaa-0000-4000-8000-000000000002")
            (at 1 2)
            (fp_text reference "H1" (at 0 0) (layer "B.SilkS"))
            (fp_text value "M3" (at 0 1))
            (attr board_only exclude_from_pos_files))
        (segment (start 0 0) (end 1 0) (width 0.25) (layer "F.Cu") (net 1)
            (uuid "bbbbbbbb-0000-4000-8000-000000000001"))
        (arc (start 0 0) (mid 1 1) (end 2 0) (width 0.25) (layer "B.Cu") (net "GND")
            (tstamp "bbbbbbbb-0000-4000-8000-000000000002"))
        (via (at 5 5) (size 0.6) (drill 0.3) (layers "F.Cu" "B.Cu") (net 1) (locked yes)
            (uuid "cccccccc-0000-4000-8000-000000000001"))
        (zone (net 1) (net_name "GND") (layers "F.Cu" "B.Cu")
            (uuid "dddddddd-0000-4000-8000-000000000001")
            (polygon (pts (xy 0 0) (xy 10 0) (xy 10 10)))))"#;

    fn board() -> Board {
        let root = parse(BOARD, &["demo.kicad_pcb"]).unwrap();
        board_from_document(&root, "demo.kicad_pcb").unwrap()
    }

    #[test]
    fn test_layers_and_nets() {
        let board = board();
        assert_eq!(board.version, "20240108");
        assert_eq!(board.id, None);
        assert_eq!(board.layers.len(), 3);
        assert_eq!(board.layers[1].user_name.as_deref(), Some("Bottom"));
        assert_eq!(board.layers[2].layer_type, LayerType::User);
        assert_eq!(board.copper_layers().count(), 2);
        assert_eq!(board.net_name(1), Some("GND"));
    }

    #[test]
    fn test_footprint_shapes() {
        let board = board();
        let r1 = &board.footprints[0];
        assert_eq!(r1.reference, "R1");
        assert_eq!(r1.value, "10k");
        assert!(r1.locked);
        assert!(!r1.board_only);
        assert_eq!(r1.orientation, 90.0);
        assert_eq!(r1.position, Position::new(10.0, 20.0));
        assert!(r1.path.is_some());

        let h1 = &board.footprints[1];
        assert_eq!(h1.reference, "H1");
        assert_eq!(h1.value, "M3");
        assert!(h1.board_only);
        assert!(!h1.locked);
        assert_eq!(h1.orientation, 0.0);
        assert_eq!(h1.path, None);
    }

    #[test]
    fn test_tracks_vias_zones() {
        let board = board();
        assert_eq!(board.tracks.len(), 2);
        assert_eq!(board.tracks[0].kind, TrackKind::Segment);
        assert_eq!(
            board.tracks[1].kind,
            TrackKind::Arc {
                mid: Position::new(1.0, 1.0)
            }
        );
        assert_eq!(board.tracks[1].net, 1);
        assert_eq!(board.vias[0].layers, vec!["F.Cu", "B.Cu"]);
        assert!(board.vias[0].locked);
        assert_eq!(board.zones[0].outline.len(), 3);
        assert_eq!(board.zones[0].net_name, "GND");
    }

    #[test]
    fn test_missing_footprint_layer_is_format_error() {
        let text = r#"(kicad_pcb (version 1)
            (footprint "X:Y" (uuid "aaaaaaaa-0000-4000-8000-000000000001") (at 0 0)))"#;
        let root = parse(text, &[]).unwrap();
        assert!(matches!(
            board_from_document(&root, "x.kicad_pcb"),
            Err(LoadError::Format { .. })
        ));
    }
}
