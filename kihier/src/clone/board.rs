//! The board mutation surface commands run against
//!
//! [`BoardEdit`] is what a host CAD application implements. [`SimulatedBoard`]
//! is an in-memory implementation used for dry runs and tests.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use super::transform::{normalize_orientation, Placement};
use crate::model::{Board, Position};
use crate::path::EntityPathComponent;

/// Board items are addressed by their uuid
pub type ItemId = EntityPathComponent;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("no item {0} on the board")]
    UnknownItem(ItemId),
    #[error("item {0} already exists")]
    AlreadyExists(ItemId),
    #[error("item {0} is locked")]
    Locked(ItemId),
    #[error("item {0} was not removed")]
    NotRemoved(ItemId),
    #[error("{0} is not a group")]
    NotAGroup(ItemId),
}

pub trait BoardEdit {
    fn placement(&self, item: ItemId) -> Result<Placement, BoardError>;
    fn set_layer(&mut self, item: ItemId, layer: &str) -> Result<(), BoardError>;
    fn translate(&mut self, item: ItemId, delta: Position) -> Result<(), BoardError>;
    fn rotate(&mut self, item: ItemId, center: Position, degrees: f64) -> Result<(), BoardError>;
    /// Mirror left-right about `center` onto the opposite layer, keeping the
    /// orientation value unchanged
    fn flip(&mut self, item: ItemId, center: Position) -> Result<(), BoardError>;
    /// Put `item` at exactly `placement`, bit for bit
    fn set_placement(&mut self, item: ItemId, placement: &Placement) -> Result<(), BoardError>;
    /// Copy `source` as a new item `copy`
    fn duplicate(&mut self, source: ItemId, copy: ItemId) -> Result<(), BoardError>;
    fn remove(&mut self, item: ItemId) -> Result<(), BoardError>;
    /// Bring back an item taken off by [`BoardEdit::remove`]
    fn restore(&mut self, item: ItemId) -> Result<(), BoardError>;
    fn group(&mut self, group: ItemId, items: &[ItemId]) -> Result<(), BoardError>;
    /// Dissolve `group`, returning its former members
    fn ungroup(&mut self, group: ItemId) -> Result<Vec<ItemId>, BoardError>;
    fn group_members(&self, group: ItemId) -> Result<Vec<ItemId>, BoardError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardItem {
    pub reference: String,
    pub placement: Placement,
    pub locked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulatedBoard {
    items: BTreeMap<ItemId, BoardItem>,
    removed: BTreeMap<ItemId, BoardItem>,
    groups: BTreeMap<ItemId, Vec<ItemId>>,
}

impl SimulatedBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Footprints of a parsed board, at their current placements
    pub fn from_board(board: &Board) -> Self {
        let mut simulated = Self::new();
        for footprint in &board.footprints {
            simulated.insert(
                footprint.id,
                BoardItem {
                    reference: footprint.reference.clone(),
                    placement: Placement::from(footprint),
                    locked: footprint.locked,
                },
            );
        }
        simulated
    }

    pub fn insert(&mut self, id: ItemId, item: BoardItem) {
        self.items.insert(id, item);
    }

    pub fn item(&self, id: ItemId) -> Option<&BoardItem> {
        self.items.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = (&ItemId, &BoardItem)> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn editable(&mut self, id: ItemId) -> Result<&mut BoardItem, BoardError> {
        let item = self.items.get_mut(&id).ok_or(BoardError::UnknownItem(id))?;
        if item.locked {
            return Err(BoardError::Locked(id));
        }
        Ok(item)
    }

    fn exists(&self, id: ItemId) -> bool {
        self.items.contains_key(&id) || self.removed.contains_key(&id) || self.groups.contains_key(&id)
    }
}

impl BoardEdit for SimulatedBoard {
    fn placement(&self, item: ItemId) -> Result<Placement, BoardError> {
        self.items
            .get(&item)
            .map(|i| i.placement.clone())
            .ok_or(BoardError::UnknownItem(item))
    }

    fn set_layer(&mut self, item: ItemId, layer: &str) -> Result<(), BoardError> {
        self.editable(item)?.placement.layer = layer.to_string();
        Ok(())
    }

    fn translate(&mut self, item: ItemId, delta: Position) -> Result<(), BoardError> {
        let item = self.editable(item)?;
        item.placement = item.placement.translated(delta);
        Ok(())
    }

    fn rotate(&mut self, item: ItemId, center: Position, degrees: f64) -> Result<(), BoardError> {
        let item = self.editable(item)?;
        item.placement = item.placement.rotated_around(center, degrees);
        item.placement.orientation = normalize_orientation(item.placement.orientation);
        Ok(())
    }

    fn flip(&mut self, item: ItemId, center: Position) -> Result<(), BoardError> {
        let item = self.editable(item)?;
        item.placement = item.placement.flipped_around(center);
        Ok(())
    }

    fn set_placement(&mut self, item: ItemId, placement: &Placement) -> Result<(), BoardError> {
        self.editable(item)?.placement = placement.clone();
        Ok(())
    }

    fn duplicate(&mut self, source: ItemId, copy: ItemId) -> Result<(), BoardError> {
        if self.exists(copy) {
            return Err(BoardError::AlreadyExists(copy));
        }
        let mut item = self.items.get(&source).cloned().ok_or(BoardError::UnknownItem(source))?;
        item.locked = false;
        self.items.insert(copy, item);
        Ok(())
    }

    fn remove(&mut self, item: ItemId) -> Result<(), BoardError> {
        self.editable(item)?;
        if let Some(removed) = self.items.remove(&item) {
            self.removed.insert(item, removed);
        }
        Ok(())
    }

    fn restore(&mut self, item: ItemId) -> Result<(), BoardError> {
        let removed = self.removed.remove(&item).ok_or(BoardError::NotRemoved(item))?;
        self.items.insert(item, removed);
        Ok(())
    }

    fn group(&mut self, group: ItemId, items: &[ItemId]) -> Result<(), BoardError> {
        if self.exists(group) {
            return Err(BoardError::AlreadyExists(group));
        }
        if let Some(missing) = items.iter().find(|id| !self.items.contains_key(id)) {
            return Err(BoardError::UnknownItem(*missing));
        }
        self.groups.insert(group, items.to_vec());
        Ok(())
    }

    fn ungroup(&mut self, group: ItemId) -> Result<Vec<ItemId>, BoardError> {
        self.groups.remove(&group).ok_or(BoardError::NotAGroup(group))
    }

    fn group_members(&self, group: ItemId) -> Result<Vec<ItemId>, BoardError> {
        self.groups.get(&group).cloned().ok_or(BoardError::NotAGroup(group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> ItemId {
        ItemId::new(uuid::Uuid::from_u128(n))
    }

    fn board() -> SimulatedBoard {
        let mut board = SimulatedBoard::new();
        board.insert(
            id(1),
            BoardItem {
                reference: "R1".into(),
                placement: Placement::new(Position::new(1.0, 2.0), 0.0, "F.Cu"),
                locked: false,
            },
        );
        board.insert(
            id(2),
            BoardItem {
                reference: "R2".into(),
                placement: Placement::new(Position::new(5.0, 5.0), 90.0, "F.Cu"),
                locked: true,
            },
        );
        board
    }

    #[test]
    fn test_locked_items_refuse_edits() {
        let mut board = board();
        assert_eq!(
            board.translate(id(2), Position::new(1.0, 0.0)),
            Err(BoardError::Locked(id(2)))
        );
        assert_eq!(board.remove(id(3)), Err(BoardError::UnknownItem(id(3))));
    }

    #[test]
    fn test_remove_and_restore() {
        let mut board = board();
        let before = board.clone();
        board.remove(id(1)).unwrap();
        assert!(board.item(id(1)).is_none());
        assert_eq!(board.restore(id(2)), Err(BoardError::NotRemoved(id(2))));
        board.restore(id(1)).unwrap();
        assert_eq!(board, before);
    }

    #[test]
    fn test_rotate_keeps_orientation_in_range() {
        let mut board = board();
        let center = Position::new(1.0, 2.0);
        board.rotate(id(1), center, 270.0).unwrap();
        assert_eq!(board.placement(id(1)).unwrap().orientation, -90.0);
        assert_eq!(board.placement(id(1)).unwrap().position, center);
    }

    #[test]
    fn test_groups() {
        let mut board = board();
        board.group(id(10), &[id(1), id(2)]).unwrap();
        assert_eq!(board.group(id(10), &[]), Err(BoardError::AlreadyExists(id(10))));
        assert_eq!(board.group_members(id(10)).unwrap(), vec![id(1), id(2)]);
        assert_eq!(board.ungroup(id(10)).unwrap(), vec![id(1), id(2)]);
        assert_eq!(board.ungroup(id(10)), Err(BoardError::NotAGroup(id(10))));
    }

    #[test]
    fn test_duplicate_unlocks_copy() {
        let mut board = board();
        board.duplicate(id(2), id(20)).unwrap();
        assert!(!board.item(id(20)).unwrap().locked);
        assert_eq!(board.duplicate(id(2), id(20)), Err(BoardError::AlreadyExists(id(20))));
    }
}
