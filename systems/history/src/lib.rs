#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Undo and reset history for a level.
//!
//! Every undo unit is a list of [`Diff`] snapshots, one per tracked entity,
//! applied back to the grid in a single batch.

use std::collections::BTreeMap;

use grotto_core::{Activation, Category, ColorCounts, Diff, EntityId, Layer};
use grotto_world::{query, GridSystem};
use tracing::debug;

/// One restorable unit: a diff per tracked entity.
pub type Snapshot = Vec<(EntityId, Diff)>;

/// Per-level undo stack and reset target.
#[derive(Clone, Debug, Default)]
pub struct LevelState {
    categories: BTreeMap<Category, Vec<EntityId>>,
    panels: BTreeMap<EntityId, bool>,
    player: Option<EntityId>,
    undo_stack: Vec<Snapshot>,
    reset_target: Option<Snapshot>,
}

impl LevelState {
    /// Categorizes every entity of `grid` by its registry category.
    ///
    /// Panel entities are every entity of the `Panel` category plus every
    /// entity a screen's panel configuration drives; the configuration's
    /// `inverted` flag decides their reset state.
    #[must_use]
    pub fn from_grid(grid: &GridSystem) -> Self {
        let mut categories: BTreeMap<Category, Vec<EntityId>> = BTreeMap::new();
        let mut panels = BTreeMap::new();
        for id in grid.entity_ids() {
            let Some(category) = grid.entity(id).and_then(|entity| entity.category()) else {
                continue;
            };
            categories.entry(category).or_default().push(id);
            if category == Category::Panel {
                let _ = panels.insert(id, false);
            }
        }

        for config in grid.screen_data().iter().flat_map(|screen| &screen.panels) {
            let Some(id) = grid.get_data(config.coordinates, config.layer) else {
                continue;
            };
            let id = if config.layer == Layer::Piston {
                grid.primary_of(id)
            } else {
                id
            };
            let _ = panels.insert(id, config.inverted);
        }

        let player = query::player(grid);
        debug!(
            categories = categories.len(),
            panels = panels.len(),
            has_player = player.is_some(),
            "level state created"
        );
        Self {
            categories,
            panels,
            player,
            undo_stack: Vec::new(),
            reset_target: None,
        }
    }

    /// Tracked entities of `category`.
    #[must_use]
    pub fn entities(&self, category: Category) -> &[EntityId] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The player entity, if the level has one.
    #[must_use]
    pub fn player(&self) -> Option<EntityId> {
        self.player
    }

    /// Whether `id` is a panel entity configured as inverted.
    #[must_use]
    pub fn is_inverted_panel(&self, id: EntityId) -> bool {
        self.panels.get(&id).copied().unwrap_or(false)
    }

    /// Number of undo units on the stack.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Forgets every undo unit, keeping the reset target.
    pub fn clear_history(&mut self) {
        self.undo_stack.clear();
    }

    fn capture(&self, grid: &GridSystem) -> Snapshot {
        self.categories
            .values()
            .flatten()
            .filter_map(|id| grid.entity(*id).map(|entity| (*id, entity.data().get_diff())))
            .collect()
    }

    /// Pushes one undo unit capturing every tracked entity.
    pub fn record_puzzle_data(&mut self, grid: &GridSystem) {
        let snapshot = self.capture(grid);
        debug!(entities = snapshot.len(), depth = self.undo_stack.len() + 1, "undo unit recorded");
        self.undo_stack.push(snapshot);
    }

    /// Restores the most recent undo unit. Returns `false` on an empty stack.
    pub fn undo(&mut self, grid: &mut GridSystem) -> bool {
        let Some(snapshot) = self.undo_stack.pop() else {
            return false;
        };
        grid.apply_diffs(&snapshot);
        debug!(depth = self.undo_stack.len(), "undo applied");
        true
    }

    /// Records the state the level returns to on reset.
    ///
    /// Movable blocks go back to their origin, restored. Force blocks also get
    /// their facing index as state. Buttons switch off. Dig sites are restored
    /// and switched off. Panels switch off, or on when inverted. Everything
    /// else, the player included, keeps its current diff.
    pub fn record_reset_data(&mut self, grid: &GridSystem) {
        let mut target = Snapshot::new();
        for (category, ids) in &self.categories {
            for id in ids {
                let Some(entity) = grid.entity(*id) else {
                    continue;
                };
                let mut diff = entity.data().get_diff();
                if let Some(inverted) = self.panels.get(id) {
                    let activation = if *inverted { Activation::On } else { Activation::Off };
                    diff.state = activation.as_state();
                    target.push((*id, diff));
                    continue;
                }
                match category {
                    movable if movable.is_movable() => {
                        diff.coordinates = entity.data().origin;
                        diff.destroyed = false;
                        if entity.is_force() {
                            diff.state = facing_state(entity.data().facing.index());
                        }
                    }
                    Category::Button => diff.state = Activation::Off.as_state(),
                    Category::Dig => {
                        diff.destroyed = false;
                        diff.state = Activation::Off.as_state();
                    }
                    _ => {}
                }
                target.push((*id, diff));
            }
        }
        debug!(entities = target.len(), "reset target recorded");
        self.reset_target = Some(target);
    }

    /// Records an undo unit, then restores the reset target. Returns `false`
    /// when no reset target was recorded.
    pub fn reset(&mut self, grid: &mut GridSystem) -> bool {
        let Some(target) = self.reset_target.as_ref() else {
            return false;
        };
        let target = target.clone();
        self.record_puzzle_data(grid);
        grid.apply_diffs(&target);
        debug!("level reset");
        true
    }

    /// Counts live buttons that are `On` or `Alt`, per colour.
    #[must_use]
    pub fn recalculate_button_color_activations(&self, grid: &GridSystem) -> ColorCounts {
        let mut counts = ColorCounts::default();
        for id in self.entities(Category::Button) {
            if !grid.is_live(*id) {
                continue;
            }
            let Some(entity) = grid.entity(*id) else {
                continue;
            };
            if let (Some(color), true) = (entity.color(), entity.activation().is_active()) {
                counts.increment(color);
            }
        }
        counts
    }
}

fn facing_state(index: usize) -> i32 {
    i32::try_from(index).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_indices_fit_state() {
        assert_eq!(facing_state(3), 3);
        assert_eq!(facing_state(usize::MAX), 0);
    }
}
