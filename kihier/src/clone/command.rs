//! Reversible board commands
//!
//! A [`CommandList`] runs in order against a [`BoardEdit`]. Before each
//! command executes, its inverse is computed from the board as it stands, so
//! a failure part way through can be rolled back in reverse order and a
//! successful run can be undone later.
//!
//! Geometric commands are undone by restoring the placement captured before
//! they ran, not by applying the opposite move. Reversing a move or rotation
//! in floating point does not land on the original bits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::board::{BoardEdit, BoardError, ItemId};
use super::transform::Placement;
use super::CloneError;
use crate::model::Position;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    MoveToLayer { item: ItemId, layer: String },
    Move { item: ItemId, delta: Position },
    Rotate { item: ItemId, center: Position, angle: f64 },
    Flip { item: ItemId, center: Position },
    SetPlacement { item: ItemId, placement: Placement },
    Clone { source: ItemId, copy: ItemId },
    Remove { item: ItemId },
    Restore { item: ItemId },
    Group { group: ItemId, items: Vec<ItemId> },
    Ungroup { group: ItemId },
}

impl Command {
    /// The command that undoes this one, given the board before it runs
    pub fn inverse(&self, board: &dyn BoardEdit) -> Result<Command, BoardError> {
        let inverse = match self {
            Command::MoveToLayer { item, .. }
            | Command::Move { item, .. }
            | Command::Rotate { item, .. }
            | Command::Flip { item, .. }
            | Command::SetPlacement { item, .. } => Command::SetPlacement {
                item: *item,
                placement: board.placement(*item)?,
            },
            Command::Clone { copy, .. } => Command::Remove { item: *copy },
            Command::Remove { item } => Command::Restore { item: *item },
            Command::Restore { item } => Command::Remove { item: *item },
            Command::Group { group, .. } => Command::Ungroup { group: *group },
            Command::Ungroup { group } => Command::Group {
                group: *group,
                items: board.group_members(*group)?,
            },
        };
        Ok(inverse)
    }

    pub fn execute(&self, board: &mut dyn BoardEdit) -> Result<(), BoardError> {
        match self {
            Command::MoveToLayer { item, layer } => board.set_layer(*item, layer),
            Command::Move { item, delta } => board.translate(*item, *delta),
            Command::Rotate { item, center, angle } => board.rotate(*item, *center, *angle),
            Command::Flip { item, center } => board.flip(*item, *center),
            Command::SetPlacement { item, placement } => board.set_placement(*item, placement),
            Command::Clone { source, copy } => board.duplicate(*source, *copy),
            Command::Remove { item } => board.remove(*item),
            Command::Restore { item } => board.restore(*item),
            Command::Group { group, items } => board.group(*group, items),
            Command::Ungroup { group } => board.ungroup(*group).map(|_| ()),
        }
    }
}

/// A command stamped for logging or replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub command: Command,
}

impl CommandRecord {
    pub fn new(command: Command) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            command,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn records(&self) -> Vec<CommandRecord> {
        self.commands.iter().cloned().map(CommandRecord::new).collect()
    }

    /// Run every command in order. On the first failure everything applied
    /// so far is reverted and the board is back where it started.
    pub fn apply(&self, board: &mut dyn BoardEdit) -> Result<AppliedCommands, CloneError> {
        let mut inverses = Vec::with_capacity(self.commands.len());
        for command in &self.commands {
            let step = command
                .inverse(&*board)
                .and_then(|inverse| command.execute(board).map(|()| inverse));
            match step {
                Ok(inverse) => inverses.push(inverse),
                Err(cause) => {
                    tracing::warn!(
                        "command {} of {} failed ({}), reverting",
                        inverses.len() + 1,
                        self.commands.len(),
                        cause
                    );
                    let applied = inverses.len();
                    return match revert(&inverses, board) {
                        Ok(()) => Err(CloneError::PartialChangesReverted {
                            applied,
                            source: cause,
                        }),
                        Err(source) => Err(CloneError::RollbackFailed { cause, source }),
                    };
                }
            }
        }
        tracing::debug!("applied {} board commands", inverses.len());
        Ok(AppliedCommands { inverses })
    }
}

impl FromIterator<Command> for CommandList {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

impl Extend<Command> for CommandList {
    fn extend<I: IntoIterator<Item = Command>>(&mut self, iter: I) {
        self.commands.extend(iter);
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

/// Inverses recorded by a successful [`CommandList::apply`], in apply order
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedCommands {
    inverses: Vec<Command>,
}

impl AppliedCommands {
    pub fn len(&self) -> usize {
        self.inverses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inverses.is_empty()
    }

    pub fn inverses(&self) -> &[Command] {
        &self.inverses
    }

    /// Revert the whole run
    pub fn undo(self, board: &mut dyn BoardEdit) -> Result<(), BoardError> {
        revert(&self.inverses, board)
    }
}

fn revert(inverses: &[Command], board: &mut dyn BoardEdit) -> Result<(), BoardError> {
    for inverse in inverses.iter().rev() {
        inverse.execute(board)?;
    }
    Ok(())
}
