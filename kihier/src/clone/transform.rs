//! Placements and the delta between two of them

use serde::{Deserialize, Serialize};

use crate::model::board::{is_back_layer, opposite_layer};
use crate::model::{Footprint, PlacedFootprint, Position};

/// Wrap an angle into [0, 360)
pub fn normalize_angle(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Wrap an orientation into (-180, 180], the range KiCad stores
pub fn normalize_orientation(degrees: f64) -> f64 {
    let wrapped = normalize_angle(degrees);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Where a footprint sits: position, orientation in degrees, and layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: Position,
    pub orientation: f64,
    pub layer: String,
}

impl Placement {
    pub fn new(position: Position, orientation: f64, layer: impl Into<String>) -> Self {
        Self {
            position,
            orientation,
            layer: layer.into(),
        }
    }

    pub fn is_flipped(&self) -> bool {
        is_back_layer(&self.layer)
    }

    /// Mirror left-right about `center` onto the other side of the board.
    ///
    /// The orientation value is kept. KiCad's own left-right flip stores
    /// `180 - orientation` instead, so a host wrapping it must put the
    /// orientation back after flipping. [`TransformDelta::between`] and the
    /// commands planned from it rely on this.
    pub fn flipped_around(&self, center: Position) -> Placement {
        Placement {
            position: Position::new(2.0 * center.x - self.position.x, self.position.y),
            orientation: self.orientation,
            layer: opposite_layer(&self.layer),
        }
    }

    pub fn rotated_around(&self, center: Position, degrees: f64) -> Placement {
        Placement {
            position: self.position.rotated_around(center, degrees),
            orientation: normalize_orientation(self.orientation + degrees),
            layer: self.layer.clone(),
        }
    }

    pub fn translated(&self, delta: Position) -> Placement {
        Placement {
            position: self.position + delta,
            orientation: self.orientation,
            layer: self.layer.clone(),
        }
    }
}

impl From<&PlacedFootprint> for Placement {
    fn from(footprint: &PlacedFootprint) -> Self {
        Placement::new(footprint.position, footprint.orientation, footprint.layer.clone())
    }
}

impl From<&Footprint> for Placement {
    fn from(footprint: &Footprint) -> Self {
        Placement::new(footprint.position, footprint.orientation, footprint.layer.clone())
    }
}

/// What it takes to bring `target` onto `reference`
///
/// Applied as: move by `displacement`, flip about the reference position if
/// `flip_changed`, then rotate by `rotation` about the reference position.
/// Flips keep the orientation value (see [`Placement::flipped_around`]).
/// Under that convention the mirrored-angle formula used across sides
/// reduces to `reference - target` for orientations in (-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformDelta {
    pub displacement: Position,
    pub rotation: f64,
    pub flip_changed: bool,
}

impl TransformDelta {
    pub fn between(reference: &Placement, target: &Placement) -> Self {
        let flip_changed = reference.is_flipped() != target.is_flipped();
        let rotation = if flip_changed {
            let flipped = (180.0 - reference.orientation.abs()).copysign(reference.orientation);
            normalize_angle(180.0 - flipped - target.orientation)
        } else {
            normalize_angle(reference.orientation - target.orientation)
        };
        Self {
            displacement: reference.position - target.position,
            rotation,
            flip_changed,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.displacement == Position::default() && self.rotation == 0.0 && !self.flip_changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement(x: f64, y: f64, angle: f64, layer: &str) -> Placement {
        Placement::new(Position::new(x, y), angle, layer)
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_angle(0.0), 0.0);
        assert_eq!(normalize_angle(360.0), 0.0);
        assert_eq!(normalize_angle(-90.0), 270.0);
        assert_eq!(normalize_angle(725.0), 5.0);
        assert_eq!(normalize_orientation(270.0), -90.0);
        assert_eq!(normalize_orientation(180.0), 180.0);
        assert_eq!(normalize_orientation(-180.0), 180.0);
    }

    #[test]
    fn test_delta_same_side() {
        let reference = placement(10.0, 5.0, 90.0, "F.Cu");
        let target = placement(4.0, 1.0, 180.0, "F.Cu");
        let delta = TransformDelta::between(&reference, &target);
        assert_eq!(delta.displacement, Position::new(6.0, 4.0));
        assert_eq!(delta.rotation, 270.0);
        assert!(!delta.flip_changed);
        assert!(TransformDelta::between(&reference, &reference).is_identity());
    }

    #[test]
    fn test_delta_flip_changed_uses_mirrored_angle() {
        // flipped = copysign(180 - |a|, a)
        let cases = [
            (30.0, 0.0, 30.0),    // 180 - 150 - 0
            (-30.0, 0.0, 330.0),  // 180 + 150 - 0
            (30.0, 45.0, 345.0),  // 180 - 150 - 45
            (0.0, 90.0, 270.0),   // 180 - 180 - 90
            (270.0, 0.0, 90.0),   // |a| > 180: flipped = 90
            (-135.0, 10.0, 215.0), // 180 + 45 - 10
        ];
        for (reference_angle, target_angle, expected) in cases {
            let reference = placement(0.0, 0.0, reference_angle, "B.Cu");
            let target = placement(0.0, 0.0, target_angle, "F.Cu");
            let delta = TransformDelta::between(&reference, &target);
            assert!(delta.flip_changed);
            assert!(
                (delta.rotation - expected).abs() < 1e-9,
                "reference {} target {}: got {}, expected {}",
                reference_angle,
                target_angle,
                delta.rotation,
                expected
            );
        }
    }

    #[test]
    fn test_flip_then_rotate_reaches_reference_orientation() {
        let angles = [-179.0, -135.0, -90.0, -30.0, 0.0, 12.5, 90.0, 150.0, 180.0];
        for reference_angle in angles {
            for target_angle in angles {
                let reference = placement(5.0, 5.0, reference_angle, "B.Cu");
                let target = placement(1.0, 2.0, target_angle, "F.Cu");
                let delta = TransformDelta::between(&reference, &target);
                let plain = normalize_angle(reference_angle - target_angle);
                assert!(
                    (delta.rotation - plain).abs() < 1e-9 || (delta.rotation - plain).abs() > 360.0 - 1e-9,
                    "reference {} target {}",
                    reference_angle,
                    target_angle
                );

                let reached = target
                    .translated(delta.displacement)
                    .flipped_around(reference.position)
                    .rotated_around(reference.position, delta.rotation);
                assert_eq!(reached.layer, "B.Cu");
                assert_eq!(reached.position, reference.position);
                let error = normalize_angle(reached.orientation - reference_angle);
                assert!(error < 1e-9 || error > 360.0 - 1e-9, "reference {} target {}", reference_angle, target_angle);
            }
        }
    }

    #[test]
    fn test_flip_is_an_involution() {
        let p = placement(3.0, 4.0, 45.0, "F.Cu");
        let center = Position::new(10.0, 0.0);
        let once = p.flipped_around(center);
        assert_eq!(once.position, Position::new(17.0, 4.0));
        assert_eq!(once.layer, "B.Cu");
        assert_eq!(once.flipped_around(center), p);
    }
}
