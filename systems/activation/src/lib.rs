#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Activation system turning pressed buttons into physical world changes.
//!
//! Buttons feed per-colour counts into [`Panel`] lights; a panel whose lights
//! are all on activates, and its [`PanelKind`] decides what moves: piston
//! arms extend one segment at a time, tunnel doors slide open or shut. Every
//! animation is an explicit transition advanced once per tick, so a new
//! request simply replaces the one in flight.

mod panel;
mod piston;
mod transition;
mod tunnel;

use grotto_core::{ColorCounts, EntityId};
use grotto_world::{GameController, GridSystem};
use tracing::{debug, warn};

pub use panel::{Light, Panel, PanelKind};
pub use piston::{Piston, ARM_EXTEND_SECONDS, ARM_EXTENSION_FRAMES};
pub use transition::Progress;
pub use tunnel::{door_index, Tunnel, DOOR_CLOSED_INDEX, DOOR_FRAMES_PER_SECOND};

/// Every panel configured across a level's screens.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PanelBoard {
    panels: Vec<Panel>,
}

impl PanelBoard {
    /// Builds a panel for every panel configuration in the grid's screen
    /// data. Configurations pointing at empty cells are skipped.
    #[must_use]
    pub fn from_grid(grid: &GridSystem) -> Self {
        let mut panels = Vec::new();
        for screen in grid.screen_data() {
            for config in &screen.panels {
                match Panel::from_config(grid, config) {
                    Some(panel) => panels.push(panel),
                    None => warn!(
                        coordinates = ?config.coordinates,
                        layer = ?config.layer,
                        "panel configuration points at an empty cell"
                    ),
                }
            }
        }
        debug!(panels = panels.len(), "panel board built");
        Self { panels }
    }

    /// All panels, in configuration order.
    #[must_use]
    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    /// Panel driving `entity`.
    #[must_use]
    pub fn panel(&self, entity: EntityId) -> Option<&Panel> {
        self.panels.iter().find(|panel| panel.entity() == entity)
    }

    /// Mutable access to the panel driving `entity`.
    pub fn panel_mut(&mut self, entity: EntityId) -> Option<&mut Panel> {
        self.panels.iter_mut().find(|panel| panel.entity() == entity)
    }

    /// Refreshes every light-driven panel from `counts`. Returns how many
    /// panels changed activation.
    pub fn refresh_all(
        &mut self,
        grid: &mut GridSystem,
        controller: &mut dyn GameController,
        counts: &ColorCounts,
        instant: bool,
    ) -> usize {
        self.panels
            .iter_mut()
            .map(|panel| usize::from(panel.refresh(grid, controller, counts, instant)))
            .sum()
    }

    /// Drives every panel wired to gate `gate_index`. Returns how many
    /// accepted the change.
    pub fn drive_gate(
        &mut self,
        grid: &mut GridSystem,
        controller: &mut dyn GameController,
        gate_index: u32,
        active: bool,
        instant: bool,
    ) -> usize {
        self.panels
            .iter_mut()
            .filter(|panel| panel.gate_index() == Some(gate_index))
            .map(|panel| usize::from(panel.drive_gate(grid, controller, active, instant)))
            .sum()
    }

    /// Load-time reconciliation across every panel.
    pub fn update_if_blocked(
        &mut self,
        grid: &mut GridSystem,
        controller: &mut dyn GameController,
        instant: bool,
    ) -> usize {
        self.panels
            .iter_mut()
            .map(|panel| panel.update_if_blocked(grid, controller, instant))
            .sum()
    }

    /// Advances every animation by `dt` seconds. Returns [`Progress::Done`]
    /// once nothing is left in flight.
    pub fn tick(
        &mut self,
        dt: f32,
        grid: &mut GridSystem,
        controller: &mut dyn GameController,
    ) -> Progress {
        let mut progress = Progress::Done;
        for panel in &mut self.panels {
            if panel.advance(dt, grid, controller) == Progress::InProgress {
                progress = Progress::InProgress;
            }
        }
        progress
    }
}
