//! Piston arm sequencing.

use std::collections::VecDeque;

use grotto_core::{Activation, Coordinates, EntityId, Facing, Layer};
use grotto_world::{query, GameController, GridSystem, MoveType};
use tracing::debug;

use crate::transition::{frame_between, Progress, Tween};

/// Seconds one arm segment takes to extend or retract.
pub const ARM_EXTEND_SECONDS: f32 = 0.15;

/// Sprite index of a fully extended arm; zero is fully retracted.
pub const ARM_EXTENSION_FRAMES: i32 = 4;

/// Layers whose occupants an extending arm pushes.
const PUSHED_LAYERS: [Layer; 3] = [Layer::Block, Layer::Player, Layer::Piston];

/// Layers checked for a block resting on a retracting arm.
const RESTING_LAYERS: [Layer; 2] = [Layer::Block, Layer::Player];

/// A piston base and its arm segments, nearest first.
#[derive(Clone, Debug, PartialEq)]
pub struct Piston {
    base: EntityId,
    arms: Vec<EntityId>,
    motion: Option<ArmSequence>,
}

#[derive(Clone, Debug, PartialEq)]
struct ArmSequence {
    extend: bool,
    pending: VecDeque<EntityId>,
    step: Option<ArmStep>,
}

#[derive(Clone, Debug, PartialEq)]
struct ArmStep {
    arm: EntityId,
    tween: Tween,
}

impl Piston {
    /// Builds the piston driven by `base`, ordering its arms by distance.
    #[must_use]
    pub fn new(grid: &GridSystem, base: EntityId) -> Self {
        let origin = grid
            .entity(base)
            .map_or(Coordinates::ZERO, |entity| entity.coordinates());
        let mut arms: Vec<EntityId> = grid
            .entity(base)
            .map(|entity| entity.connected().to_vec())
            .unwrap_or_default();
        arms.sort_by_key(|arm| {
            grid.entity(*arm).map_or(i32::MAX, |entity| {
                let offset = entity.coordinates() - origin;
                offset.x.abs() + offset.y.abs()
            })
        });
        Self {
            base,
            arms,
            motion: None,
        }
    }

    /// Base entity.
    #[must_use]
    pub fn base(&self) -> EntityId {
        self.base
    }

    /// Arm segments, nearest to the base first.
    #[must_use]
    pub fn arms(&self) -> &[EntityId] {
        &self.arms
    }

    /// Whether an arm sequence is in flight.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.motion.is_some()
    }

    fn facing(&self, grid: &GridSystem) -> Facing {
        grid.entity(self.base)
            .map_or(Facing::Right, |entity| entity.data().facing)
    }

    /// Starts extending (`On`/`Alt`) or retracting (`Off`) the arms,
    /// replacing any sequence in flight. `instant` completes the whole
    /// sequence before returning.
    pub(crate) fn set_activation(
        &mut self,
        grid: &mut GridSystem,
        controller: &mut dyn GameController,
        activation: Activation,
        instant: bool,
    ) -> Progress {
        if let Some(previous) = self.motion.take() {
            if let Some(step) = previous.step {
                let _ = grid.set_sprite_state(step.arm, rest_frame(previous.extend));
            }
        }

        let extend = activation.is_active();
        let pending = if extend {
            self.arms.iter().copied().collect()
        } else {
            self.arms.iter().rev().copied().collect()
        };
        let mut sequence = ArmSequence {
            extend,
            pending,
            step: None,
        };

        if instant {
            loop {
                if let Some(step) = sequence.step.take() {
                    let _ = grid.set_sprite_state(step.arm, rest_frame(extend));
                }
                if !self.begin_next(&mut sequence, grid, controller) {
                    break;
                }
            }
            self.settle_arms(grid, extend);
            self.finish(extend, grid, controller);
            return Progress::Done;
        }

        if self.begin_next(&mut sequence, grid, controller) {
            self.motion = Some(sequence);
            Progress::InProgress
        } else {
            self.motion = None;
            self.finish(extend, grid, controller);
            Progress::Done
        }
    }

    /// Animates the current arm, starting the next one once it finishes.
    pub(crate) fn advance(
        &mut self,
        dt: f32,
        grid: &mut GridSystem,
        controller: &mut dyn GameController,
    ) -> Progress {
        let Some(mut sequence) = self.motion.take() else {
            return Progress::Done;
        };

        if let Some(step) = sequence.step.as_mut() {
            let t = step.tween.advance(dt);
            let (from, to) = if sequence.extend {
                (0.0, ARM_EXTENSION_FRAMES as f32)
            } else {
                (ARM_EXTENSION_FRAMES as f32, 0.0)
            };
            let _ = grid.set_sprite_state(step.arm, frame_between(from, to, t));
            if t < 1.0 {
                self.motion = Some(sequence);
                return Progress::InProgress;
            }
            sequence.step = None;
        }

        if self.begin_next(&mut sequence, grid, controller) {
            self.motion = Some(sequence);
            return Progress::InProgress;
        }
        self.finish(sequence.extend, grid, controller);
        Progress::Done
    }

    /// Commits the next arm that still needs to change. Returns `false` when
    /// the sequence is over, either exhausted or halted by an obstruction.
    fn begin_next(
        &self,
        sequence: &mut ArmSequence,
        grid: &mut GridSystem,
        controller: &mut dyn GameController,
    ) -> bool {
        let target = if sequence.extend {
            Activation::On
        } else {
            Activation::Off
        };
        let direction = self.facing(grid).direction();

        while let Some(arm) = sequence.pending.pop_front() {
            let Some(entity) = grid.entity(arm) else {
                continue;
            };
            if entity.activation().is_active() == sequence.extend {
                continue;
            }
            let cell = entity.coordinates();

            if sequence.extend {
                if let Some(occupant) = self.occupant_to_push(grid, cell) {
                    if !controller.move_block(grid, occupant, direction, MoveType::Push) {
                        debug!(base = %self.base, %arm, %occupant, "piston extension blocked");
                        sequence.pending.clear();
                        return false;
                    }
                }
            } else if direction == Coordinates::UP {
                self.drop_resting_block(grid, controller, cell);
            }

            let _ = grid.set_state(arm, target.as_state());
            sequence.step = Some(ArmStep {
                arm,
                tween: Tween::new(ARM_EXTEND_SECONDS),
            });
            return true;
        }
        false
    }

    fn occupant_to_push(&self, grid: &GridSystem, cell: Coordinates) -> Option<EntityId> {
        PUSHED_LAYERS
            .iter()
            .filter_map(|layer| grid.get_data(cell, *layer))
            .find(|id| *id != self.base && !self.arms.contains(id))
    }

    /// Lowers a block sitting on top of an upward arm before the arm pulls
    /// away, unless part of the block's group rests on something else.
    fn drop_resting_block(
        &self,
        grid: &mut GridSystem,
        controller: &mut dyn GameController,
        arm_cell: Coordinates,
    ) {
        let above = arm_cell + Coordinates::UP;
        let Some(resting) = query::occupant(grid, above, &RESTING_LAYERS) else {
            return;
        };
        if !grid
            .entity(resting)
            .is_some_and(|entity| entity.is_fall_sensitive())
        {
            return;
        }

        let members = query::group_cells(grid, resting);
        let supported_elsewhere = members.iter().any(|cell| {
            let below = *cell + Coordinates::DOWN;
            below != arm_cell && !members.contains(&below) && query::is_solid(grid, below)
        });
        if supported_elsewhere {
            return;
        }
        let _ = controller.move_block(grid, resting, Coordinates::DOWN, MoveType::Fall);
    }

    /// Snaps every arm already in the requested state to its resting frame.
    fn settle_arms(&self, grid: &mut GridSystem, extend: bool) {
        for arm in &self.arms {
            if grid
                .entity(*arm)
                .is_some_and(|entity| entity.activation().is_active() == extend)
            {
                let _ = grid.set_sprite_state(*arm, rest_frame(extend));
            }
        }
    }

    fn finish(&self, extend: bool, grid: &mut GridSystem, controller: &mut dyn GameController) {
        if !extend {
            controller.apply_gravity(grid);
        }
    }

    /// Forces every arm to agree with the base's persisted state while no
    /// sequence is in flight. Returns the number of arms changed.
    pub(crate) fn update_if_blocked(
        &mut self,
        grid: &mut GridSystem,
        controller: &mut dyn GameController,
        instant: bool,
    ) -> usize {
        if self.motion.is_some() {
            return 0;
        }
        let Some(target) = grid.entity(self.base).map(|entity| entity.activation()) else {
            return 0;
        };
        let extend = target.is_active();
        let target = if extend {
            Activation::On
        } else {
            Activation::Off
        };

        let mut forced = 0;
        for arm in &self.arms {
            let Some(entity) = grid.entity(*arm) else {
                continue;
            };
            if entity.activation().is_active() == extend {
                continue;
            }
            let _ = grid.set_state(*arm, target.as_state());
            let _ = grid.set_sprite_state(*arm, rest_frame(extend));
            if !instant {
                controller.check_off_screen_action(grid, *arm, None, target);
            }
            forced += 1;
        }
        if forced > 0 {
            debug!(base = %self.base, forced, "piston arms reconciled");
        }
        forced
    }
}

fn rest_frame(extend: bool) -> i32 {
    if extend {
        ARM_EXTENSION_FRAMES
    } else {
        0
    }
}
