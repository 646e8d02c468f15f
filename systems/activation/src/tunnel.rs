//! Tunnel door animation.

use grotto_core::{Activation, EntityId, Layer};
use grotto_world::{GameController, GridSystem};

use crate::transition::{frame_between, Progress, Tween};

/// Door sprite frames advanced per second while animating.
pub const DOOR_FRAMES_PER_SECOND: f32 = 12.0;

/// Sprite index of a fully closed door; zero is fully open.
pub const DOOR_CLOSED_INDEX: i32 = 5;

/// A tunnel door whose sprite index encodes how far it is open.
#[derive(Clone, Debug, PartialEq)]
pub struct Tunnel {
    door: EntityId,
    motion: Option<DoorMotion>,
}

#[derive(Clone, Debug, PartialEq)]
struct DoorMotion {
    from: i32,
    to: i32,
    tween: Tween,
}

/// Sprite index a door settles at for a physical activation.
#[must_use]
pub fn door_index(activation: Activation) -> i32 {
    match activation {
        Activation::On => 0,
        Activation::Off => DOOR_CLOSED_INDEX,
        Activation::Alt => DOOR_CLOSED_INDEX - 1,
    }
}

impl Tunnel {
    /// Wraps the door entity.
    #[must_use]
    pub fn new(door: EntityId) -> Self {
        Self { door, motion: None }
    }

    /// Door entity.
    #[must_use]
    pub fn door(&self) -> EntityId {
        self.door
    }

    /// Whether the door is animating.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.motion.is_some()
    }

    /// Whether the player stands in the cell the door faces.
    #[must_use]
    pub fn player_in_doorway(&self, grid: &GridSystem) -> bool {
        grid.entity(self.door).is_some_and(|door| {
            let doorway = door.coordinates() + door.data().facing.direction();
            grid.get_data(doorway, Layer::Player).is_some()
        })
    }

    /// Moves the door toward the frame matching `activation`. A request
    /// replaces any animation in flight and starts from the current frame.
    pub(crate) fn set_activation(
        &mut self,
        grid: &mut GridSystem,
        activation: Activation,
        instant: bool,
    ) -> Progress {
        let to = door_index(activation);
        let from = grid
            .entity(self.door)
            .map_or(to, |door| door.data().sprite_state);

        if instant || from == to {
            self.motion = None;
            let _ = grid.set_sprite_state(self.door, to);
            return Progress::Done;
        }

        let frames = (to - from).unsigned_abs() as f32;
        self.motion = Some(DoorMotion {
            from,
            to,
            tween: Tween::new(frames / DOOR_FRAMES_PER_SECOND),
        });
        Progress::InProgress
    }

    pub(crate) fn advance(
        &mut self,
        dt: f32,
        grid: &mut GridSystem,
        controller: &dyn GameController,
    ) -> Progress {
        let Some(motion) = self.motion.as_mut() else {
            return Progress::Done;
        };
        let t = motion.tween.advance(dt);
        let frame = frame_between(motion.from as f32, motion.to as f32, controller.ease(t));
        let _ = grid.set_sprite_state(self.door, frame);
        if t < 1.0 {
            return Progress::InProgress;
        }
        let _ = grid.set_sprite_state(self.door, motion.to);
        self.motion = None;
        Progress::Done
    }
}
