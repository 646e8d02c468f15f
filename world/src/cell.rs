//! Variable-length per-cell layer slots.

use grotto_core::{EntityId, Layer};

/// Cell lengths a slot array may be allocated at, smallest first.
///
/// A cell only grows to the bucket covering its highest occupied layer, so a
/// mostly-empty world with a few high-layer fixtures stays small.
pub(crate) const LAYER_THRESHOLDS: [usize; 4] = [1, 4, 9, Layer::COUNT];

/// Length a cell needs so that `slot` is addressable.
pub(crate) fn bucket_len(slot: usize) -> usize {
    LAYER_THRESHOLDS
        .iter()
        .copied()
        .find(|threshold| *threshold > slot)
        .unwrap_or(Layer::COUNT)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Cell {
    slots: Vec<Option<EntityId>>,
}

impl Cell {
    pub(crate) fn with_len(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    /// Unallocated layers read as empty.
    pub(crate) fn get(&self, slot: usize) -> Option<EntityId> {
        self.slots.get(slot).copied().flatten()
    }

    fn reserve(&mut self, len: usize) {
        if self.slots.len() < len {
            self.slots.resize(len, None);
        }
    }

    pub(crate) fn put(&mut self, slot: usize, entity: EntityId) {
        self.reserve(bucket_len(slot));
        self.slots[slot] = Some(entity);
    }

    /// Clears `slot` only if it still holds `entity`.
    pub(crate) fn clear_if(&mut self, slot: usize, entity: EntityId) -> bool {
        match self.slots.get_mut(slot) {
            Some(occupant) if *occupant == Some(entity) => {
                *occupant = None;
                true
            }
            _ => false,
        }
    }

    /// Occupants ordered from the highest layer down.
    pub(crate) fn occupants_descending(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots.iter().rev().filter_map(|slot| *slot)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
