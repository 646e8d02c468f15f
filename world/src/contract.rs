//! Narrow contracts the world consumes from the surrounding game.

use grotto_core::{Activation, Coordinates, EntityId, GridData, LightColor};

use crate::GridSystem;

/// How a collaborator should move a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MoveType {
    /// Pushed by machinery or the player.
    Push,
    /// Displaced under gravity.
    Fall,
    /// Snapped into place without animation.
    Instant,
}

/// The game-loop collaborator that owns gravity, movement and presentation.
///
/// Panels and pistons never move blocks or apply activation side effects
/// themselves; they ask the controller, which may refuse.
pub trait GameController {
    /// Applies the world-visible effects of an activation change. Returning
    /// `false` vetoes the change.
    fn set_puzzle_activation(
        &mut self,
        grid: &mut GridSystem,
        entity: EntityId,
        activation: Activation,
        instant: bool,
    ) -> bool;

    /// Defers effects of a change that happened outside the visible region.
    fn check_off_screen_action(
        &mut self,
        grid: &GridSystem,
        entity: EntityId,
        color_hint: Option<LightColor>,
        activation: Activation,
    );

    /// Attempts to move an entity (and its group) one step. `false` means
    /// the move was blocked.
    fn move_block(
        &mut self,
        grid: &mut GridSystem,
        entity: EntityId,
        direction: Coordinates,
        move_type: MoveType,
    ) -> bool;

    /// Re-settles anything that should fall after a structural change.
    fn apply_gravity(&mut self, grid: &mut GridSystem);

    /// Easing curve for animated transitions; `t` is normalized progress.
    fn ease(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        t * t * (3.0 - 2.0 * t)
    }
}

/// Level persistence collaborator.
pub trait LevelStore {
    /// Error reported by the backing store.
    type Error;

    /// Loads the grid saved for `level` in `slot`, if any.
    fn load_grid(&self, level: &str, slot: u32) -> Result<Option<GridData>, Self::Error>;

    /// Saves `grid` for `level` in `slot`, trimming its bounds first when
    /// `trim` is set.
    fn save_grid(
        &mut self,
        level: &str,
        slot: u32,
        grid: &mut GridSystem,
        trim: bool,
    ) -> Result<(), Self::Error>;
}
