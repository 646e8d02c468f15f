//! Persisted block records and the serialized grid they are stored in.

use serde::{Deserialize, Serialize};

use crate::{Activation, Coordinates, Facing, Layer, LightColor};

/// Persistent state of a single grid cell occupant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockData {
    /// Registered type name.
    pub block_name: String,
    /// Direction the block faces.
    #[serde(default)]
    pub facing: Facing,
    /// Type-specific signed state; -1 means unset.
    #[serde(default = "unset_state")]
    pub state: i32,
    /// Presentation frame. Not interpreted by the world beyond storage.
    #[serde(default)]
    pub sprite_state: i32,
    /// Whether the block is archived rather than live.
    #[serde(default)]
    pub destroyed: bool,
    /// Current cell.
    pub coordinates: Coordinates,
    /// Cell the block returns to on reset.
    pub origin: Coordinates,
    /// Every cell of the block's connected group, primary first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_blocks: Option<Vec<Coordinates>>,
}

fn unset_state() -> i32 {
    -1
}

impl BlockData {
    /// Creates a single-cell block whose origin is its current position.
    #[must_use]
    pub fn new(block_name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            block_name: block_name.into(),
            facing: Facing::Right,
            state: unset_state(),
            sprite_state: 0,
            destroyed: false,
            coordinates,
            origin: coordinates,
            connected_blocks: None,
        }
    }

    /// Builder-style helper that sets the facing.
    #[must_use]
    pub fn facing(mut self, facing: Facing) -> Self {
        self.facing = facing;
        self
    }

    /// Builder-style helper that sets the state field.
    #[must_use]
    pub fn state(mut self, state: i32) -> Self {
        self.state = state;
        self
    }

    /// Builder-style helper that attaches the connected group coordinates.
    #[must_use]
    pub fn connected(mut self, cells: Vec<Coordinates>) -> Self {
        self.connected_blocks = Some(cells);
        self
    }

    /// Builder-style helper that marks the block as archived.
    #[must_use]
    pub fn destroyed(mut self, destroyed: bool) -> Self {
        self.destroyed = destroyed;
        self
    }

    /// Whether this block anchors its connected group.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.connected_blocks
            .as_ref()
            .and_then(|cells| cells.first())
            .is_some_and(|first| *first == self.coordinates)
    }

    /// Number of cells in the block's group, one for single-cell blocks.
    #[must_use]
    pub fn group_len(&self) -> usize {
        self.connected_blocks.as_ref().map_or(1, Vec::len)
    }

    /// Activation decoded from the state field.
    #[must_use]
    pub fn activation(&self) -> Activation {
        Activation::from_state(self.state)
    }

    /// Captures the restorable fields.
    #[must_use]
    pub fn get_diff(&self) -> Diff {
        Diff {
            facing: self.facing,
            state: self.state,
            destroyed: self.destroyed,
            coordinates: self.coordinates,
        }
    }

    /// Overwrites the restorable fields from `diff`.
    pub fn apply_diff(&mut self, diff: &Diff) {
        self.facing = diff.facing;
        self.state = diff.state;
        self.destroyed = diff.destroyed;
        self.coordinates = diff.coordinates;
    }

    /// Whether the restorable fields already equal `diff`.
    #[must_use]
    pub fn compare_diff(&self, diff: &Diff) -> bool {
        self.get_diff() == *diff
    }
}

/// Restorable snapshot of a block's mutable, non-structural fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diff {
    /// Facing at capture time.
    pub facing: Facing,
    /// State at capture time.
    pub state: i32,
    /// Archive flag at capture time.
    pub destroyed: bool,
    /// Cell at capture time.
    pub coordinates: Coordinates,
}

/// Light and inversion setup for one panel on a screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelConfig {
    /// Cell of the entity the panel drives.
    pub coordinates: Coordinates,
    /// Layer of the driven entity.
    pub layer: Layer,
    /// Light colours, left to right.
    #[serde(default)]
    pub lights: Vec<LightColor>,
    /// Whether the driven entity moves opposite to the lights.
    #[serde(default)]
    pub inverted: bool,
    /// Gate panels are driven directly instead of through lights.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_index: Option<u32>,
}

/// Per-screen metadata stored alongside the grid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenData {
    /// Screen position in screen units.
    pub coordinates: Coordinates,
    /// Panels that live on this screen.
    #[serde(default)]
    pub panels: Vec<PanelConfig>,
}

/// Flat serialized form of a level grid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridData {
    /// Extent of the backing array.
    pub size: Coordinates,
    /// Added to a coordinate to obtain its array position.
    pub offset: Coordinates,
    /// Screen metadata.
    #[serde(default)]
    pub screen_data: Vec<ScreenData>,
    /// Support crystal chains, grouped per structure then per chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_crystal_coordinates: Option<Vec<Vec<Vec<Coordinates>>>>,
    /// Live blocks highest layer first per cell, then archived groups.
    #[serde(default)]
    pub block_data: Vec<BlockData>,
}
