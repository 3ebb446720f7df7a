//! Replicate the placement of one sheet instance onto its peers
//!
//! The reference subtree is the sheet holding the anchor component, raised
//! `up_levels` times. Every footprint in that subtree is matched to its peer
//! in each target instance by the symbol path below the subtree root, and a
//! [`CommandList`] moves each peer to where the chosen
//! [`PlacementStrategy`] puts it.

use serde::{Deserialize, Serialize};

use super::board::BoardEdit;
use super::command::{AppliedCommands, Command, CommandList};
use super::transform::{Placement, TransformDelta};
use super::CloneError;
use crate::model::board::opposite_layer;
use crate::model::{Footprint, Position, Project};
use crate::path::{EntityPath, EntityPathComponent};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlacementStrategy {
    /// Keep each footprint where it sits relative to the anchor, re-expressed
    /// around the peer anchor
    #[default]
    Relative,
    /// Lay copies out on a grid next to the reference, which takes cell 0
    Grid {
        columns: usize,
        spacing_x: f64,
        spacing_y: f64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloneOptions {
    /// How many sheets above the anchor's own sheet the reference subtree starts
    pub up_levels: usize,
    /// Sheet instances to update; empty means every other instance of the
    /// reference sheet
    pub targets: Vec<EntityPath>,
    pub strategy: PlacementStrategy,
    /// Group each target's footprints on the board
    pub group: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClonePlan {
    pub anchor: String,
    pub reference: EntityPath,
    pub targets: Vec<EntityPath>,
    pub commands: CommandList,
}

pub struct Replicator<'p> {
    project: &'p Project,
    options: CloneOptions,
}

impl<'p> Replicator<'p> {
    pub fn new(project: &'p Project, options: CloneOptions) -> Self {
        Self { project, options }
    }

    pub fn options(&self) -> &CloneOptions {
        &self.options
    }

    /// Work out the commands without touching a board
    pub fn plan(&self, anchor: &str) -> Result<ClonePlan, CloneError> {
        self.build_plan(anchor).inspect_err(|e| {
            tracing::error!("Cannot replicate placement of {}: {}", anchor, e);
        })
    }

    /// Plan and apply. A failed apply leaves the board as it was.
    pub fn run(
        &self,
        anchor: &str,
        board: &mut dyn BoardEdit,
    ) -> Result<(ClonePlan, AppliedCommands), CloneError> {
        let plan = self.plan(anchor)?;
        let applied = plan.commands.apply(board).inspect_err(|e| {
            tracing::error!("Replicating placement of {} failed: {}", anchor, e);
        })?;
        tracing::info!(
            "Replicated {} onto {} sheet instances with {} commands",
            plan.reference,
            plan.targets.len(),
            applied.len()
        );
        Ok((plan, applied))
    }

    fn build_plan(&self, anchor: &str) -> Result<ClonePlan, CloneError> {
        let project = self.project;
        let no_anchor = || CloneError::NoAnchor(anchor.to_string());
        let component = project.component(anchor).ok_or_else(no_anchor)?;
        let anchor_footprint = component
            .footprint
            .and_then(|id| project.footprint(id))
            .ok_or_else(no_anchor)?;

        let reference = self.reference_sheet(&component.sheet())?;
        let targets = self.targets(&reference)?;

        let footprints = self.footprints_in(&reference);
        if footprints.is_empty() {
            return Err(CloneError::NoFootprints(reference));
        }

        let mut commands = CommandList::new();
        for (index, target) in targets.iter().enumerate() {
            let peer_anchor = self
                .peer(anchor_footprint, &reference, target)
                .ok_or_else(|| CloneError::NoAnchor(format!("{} in {}", anchor, target)))?;

            let mut members = Vec::new();
            for &footprint in &footprints {
                let Some(peer) = self.peer(footprint, &reference, target) else {
                    tracing::warn!("{} has no peer footprint in {}", footprint.reference, target);
                    continue;
                };
                let desired = match &self.options.strategy {
                    PlacementStrategy::Relative => {
                        if footprint.id == anchor_footprint.id {
                            members.push(peer.id);
                            continue;
                        }
                        relative_placement(
                            &Placement::from(footprint),
                            &Placement::from(anchor_footprint),
                            &Placement::from(peer_anchor),
                        )
                    }
                    PlacementStrategy::Grid {
                        columns,
                        spacing_x,
                        spacing_y,
                    } => grid_placement(&Placement::from(footprint), index + 1, *columns, *spacing_x, *spacing_y),
                };
                if peer.locked {
                    tracing::warn!("Skipping locked footprint {}", peer.reference);
                    continue;
                }
                commands.extend(commands_towards(peer.id, &Placement::from(peer), &desired));
                members.push(peer.id);
            }

            if self.options.group && !members.is_empty() {
                commands.push(Command::Group {
                    group: EntityPathComponent::random(),
                    items: members,
                });
            }
        }

        tracing::debug!(
            "Planned {} commands for {} footprints across {} targets",
            commands.len(),
            footprints.len(),
            targets.len()
        );
        Ok(ClonePlan {
            anchor: anchor.to_string(),
            reference,
            targets,
            commands,
        })
    }

    fn reference_sheet(&self, sheet: &EntityPath) -> Result<EntityPath, CloneError> {
        let up_levels = self.options.up_levels;
        if up_levels >= sheet.len() {
            return Err(CloneError::InvalidUpLevels {
                requested: up_levels,
                depth: sheet.len().saturating_sub(1),
            });
        }
        Ok(sheet.slice(..sheet.len() - up_levels))
    }

    fn targets(&self, reference: &EntityPath) -> Result<Vec<EntityPath>, CloneError> {
        let schematic = self.project.schematic();
        let definition = schematic
            .sheet_instance(reference)
            .map(|sheet| sheet.definition.clone())
            .unwrap_or_default();

        let targets: Vec<EntityPath> = if self.options.targets.is_empty() {
            schematic
                .instances_of(&definition)
                .into_iter()
                .map(|sheet| sheet.path.clone())
                .filter(|path| path != reference)
                .collect()
        } else {
            for target in &self.options.targets {
                let matches = schematic
                    .sheet_instance(target)
                    .is_some_and(|sheet| sheet.definition == definition);
                if !matches || target == reference {
                    return Err(CloneError::TargetMismatch {
                        target: target.clone(),
                        expected: definition,
                    });
                }
            }
            self.options.targets.clone()
        };

        if targets.is_empty() {
            return Err(CloneError::NoTargets(reference.clone()));
        }

        let all: Vec<&EntityPath> = std::iter::once(reference).chain(&targets).collect();
        for (i, first) in all.iter().enumerate() {
            for second in &all[i + 1..] {
                if first.starts_with(second) || second.starts_with(first) {
                    return Err(CloneError::OverlappingTargets {
                        first: (*first).clone(),
                        second: (*second).clone(),
                    });
                }
            }
        }
        Ok(targets)
    }

    /// Footprints of the components placed under `sheet`, one per component
    fn footprints_in(&self, sheet: &EntityPath) -> Vec<&'p Footprint> {
        let project = self.project;
        let mut footprints: Vec<&Footprint> = project
            .symbols_in_subtree(sheet)
            .filter_map(|symbol| project.component_of_symbol(symbol))
            .filter_map(|component| component.footprint)
            .filter_map(|id| project.footprint(id))
            .collect();
        footprints.sort_by_key(|f| f.id);
        footprints.dedup_by_key(|f| f.id);
        footprints
    }

    /// The footprint in `target` playing the role `footprint` plays in `reference`
    fn peer(&self, footprint: &Footprint, reference: &EntityPath, target: &EntityPath) -> Option<&'p Footprint> {
        let project = self.project;
        let suffix = footprint.symbol_path.as_ref()?.strip_prefix(reference)?;
        let symbol = project.symbol_instance(&target.join(&suffix))?;
        let id = project.component_of_symbol(symbol)?.footprint?;
        project.footprint(id)
    }
}

/// Where `footprint` goes when the frame of `reference_anchor` is carried onto
/// `peer_anchor`
pub fn relative_placement(footprint: &Placement, reference_anchor: &Placement, peer_anchor: &Placement) -> Placement {
    let (footprint, reference_anchor) = if reference_anchor.is_flipped() != peer_anchor.is_flipped() {
        let center = reference_anchor.position;
        (
            footprint.flipped_around(center),
            reference_anchor.flipped_around(center),
        )
    } else {
        (footprint.clone(), reference_anchor.clone())
    };
    let rotation = peer_anchor.orientation - reference_anchor.orientation;
    let offset = footprint.position.rotated_around(reference_anchor.position, rotation) - reference_anchor.position;
    Placement {
        position: peer_anchor.position + offset,
        ..footprint.rotated_around(footprint.position, rotation)
    }
}

/// Where `footprint` goes in grid cell `cell`, counted row-major from the
/// reference in cell 0
pub fn grid_placement(footprint: &Placement, cell: usize, columns: usize, spacing_x: f64, spacing_y: f64) -> Placement {
    let columns = columns.max(1);
    let column = (cell % columns) as f64;
    let row = (cell / columns) as f64;
    footprint.translated(Position::new(column * spacing_x, row * spacing_y))
}

/// Commands taking a footprint from `current` to `desired`
pub fn commands_towards(item: EntityPathComponent, current: &Placement, desired: &Placement) -> Vec<Command> {
    let delta = TransformDelta::between(desired, current);
    let mut commands = Vec::new();
    if !delta.flip_changed && current.layer != desired.layer {
        commands.push(Command::MoveToLayer {
            item,
            layer: desired.layer.clone(),
        });
    }
    if delta.displacement != Position::default() {
        commands.push(Command::Move {
            item,
            delta: delta.displacement,
        });
    }
    if delta.flip_changed {
        commands.push(Command::Flip {
            item,
            center: desired.position,
        });
        if opposite_layer(&current.layer) != desired.layer {
            commands.push(Command::MoveToLayer {
                item,
                layer: desired.layer.clone(),
            });
        }
    }
    if delta.rotation != 0.0 {
        commands.push(Command::Rotate {
            item,
            center: desired.position,
            angle: delta.rotation,
        });
    }
    commands
}
