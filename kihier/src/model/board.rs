//! Board snapshot
//!
//! Data structures for a parsed `.kicad_pcb` file. All lengths are in
//! millimeters and angles in degrees, as KiCad stores them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::path::EntityPathComponent;

/// Represents a complete board file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub filename: String,
    pub version: String,
    pub id: Option<EntityPathComponent>, // Boards before KiCad 8 carry no uuid
    pub layers: Vec<BoardLayer>,
    pub nets: Vec<BoardNet>,
    pub footprints: Vec<PlacedFootprint>,
    pub tracks: Vec<Track>,
    pub vias: Vec<Via>,
    pub zones: Vec<Zone>,
}

impl Board {
    pub fn net_name(&self, id: u32) -> Option<&str> {
        self.nets.iter().find(|n| n.id == id).map(|n| n.name.as_str())
    }

    pub fn layer(&self, canonical_name: &str) -> Option<&BoardLayer> {
        self.layers.iter().find(|l| l.canonical_name == canonical_name)
    }

    pub fn footprint(&self, id: EntityPathComponent) -> Option<&PlacedFootprint> {
        self.footprints.iter().find(|f| f.id == id)
    }

    pub fn copper_layers(&self) -> impl Iterator<Item = &BoardLayer> {
        self.layers.iter().filter(|l| l.canonical_name.ends_with(".Cu"))
    }
}

/// Board layer definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardLayer {
    pub ordinal: u32,
    pub canonical_name: String, // e.g., "F.Cu", "B.Cu", "In1.Cu"
    pub layer_type: LayerType,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerType {
    #[default]
    Signal,
    Power,
    Mixed,
    Jumper,
    User,
    Unknown,
}

impl LayerType {
    pub fn from_token(token: &str) -> Self {
        match token {
            "signal" => LayerType::Signal,
            "power" => LayerType::Power,
            "mixed" => LayerType::Mixed,
            "jumper" => LayerType::Jumper,
            "user" => LayerType::User,
            _ => LayerType::Unknown,
        }
    }
}

/// Back-side layers mirror the front; a footprint on one is flipped
pub fn is_back_layer(layer: &str) -> bool {
    layer.starts_with("B.")
}

/// The mirrored counterpart of a sided layer, e.g. `F.Cu` <-> `B.Cu`
pub fn opposite_layer(layer: &str) -> String {
    if let Some(rest) = layer.strip_prefix("F.") {
        format!("B.{}", rest)
    } else if let Some(rest) = layer.strip_prefix("B.") {
        format!("F.{}", rest)
    } else {
        layer.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardNet {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Rotate around `center` by `degrees`, KiCad's clockwise-positive
    /// convention in a y-down frame.
    pub fn rotated_around(self, center: Position, degrees: f64) -> Position {
        // right angles are exact, as in KiCad's RotatePoint
        let (sin, cos) = match degrees.rem_euclid(360.0) {
            a if a == 0.0 => (0.0, 1.0),
            a if a == 90.0 => (1.0, 0.0),
            a if a == 180.0 => (0.0, -1.0),
            a if a == 270.0 => (-1.0, 0.0),
            _ => degrees.to_radians().sin_cos(),
        };
        let dx = self.x - center.x;
        let dy = self.y - center.y;
        Position {
            x: center.x + dx * cos + dy * sin,
            y: center.y - dx * sin + dy * cos,
        }
    }
}

impl std::ops::Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Footprint as it sits on the board, before schematic cross-reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedFootprint {
    pub id: EntityPathComponent,
    pub lib_id: String,
    pub reference: String,
    pub value: String,
    pub path: Option<String>, // Native `/uuid/uuid` string, root uuid omitted
    pub position: Position,
    pub orientation: f64,
    pub layer: String,
    pub locked: bool,
    pub board_only: bool,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TrackKind {
    Segment,
    Arc { mid: Position },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: EntityPathComponent,
    pub kind: TrackKind,
    pub start: Position,
    pub end: Position,
    pub width: f64,
    pub layer: String,
    pub net: u32,
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Via {
    pub id: EntityPathComponent,
    pub position: Position,
    pub size: f64,
    pub drill: f64,
    pub layers: Vec<String>,
    pub net: u32,
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: EntityPathComponent,
    pub net: u32,
    pub net_name: String,
    pub layers: Vec<String>,
    pub outline: Vec<Position>,
    pub locked: bool,
}
