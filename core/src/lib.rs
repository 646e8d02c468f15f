#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Grotto puzzle engine.
//!
//! This crate defines the value types every other crate speaks: grid
//! [`Coordinates`], the persisted per-cell [`BlockData`] record and its
//! restorable [`Diff`], the serialized [`GridData`] the world is rebuilt from,
//! and the immutable [`BlockRegistry`] that classifies block names into
//! layers, capability tags and puzzle categories. The authoritative grid lives
//! in `grotto-world`; systems layer history and activation logic on top of it.

mod block;
mod coordinates;
mod registry;

use std::{fmt, ops::Index};

use serde::{Deserialize, Serialize};

pub use block::{BlockData, Diff, GridData, PanelConfig, ScreenData};
pub use coordinates::{
    facing_index, Coordinates, ALL_DIRECTIONS, COMPASS_DIRECTIONS, DIAGONAL_DIRECTIONS,
    FACING_DIRECTIONS,
};
pub use registry::{BlockRegistry, BlockType, RegistryError};

/// Stable handle to an entity stored in a grid's entity arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Position of the entity inside its arena.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Direction a block faces.
///
/// Stored on the wire as the index into [`FACING_DIRECTIONS`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Facing {
    /// Facing index 0.
    #[default]
    Right,
    /// Facing index 1.
    Up,
    /// Facing index 2.
    Left,
    /// Facing index 3.
    Down,
}

impl Facing {
    /// All facings in index order.
    pub const ALL: [Facing; 4] = [Facing::Right, Facing::Up, Facing::Left, Facing::Down];

    /// Index of the facing inside [`FACING_DIRECTIONS`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Right => 0,
            Self::Up => 1,
            Self::Left => 2,
            Self::Down => 3,
        }
    }

    /// Unit vector pointing where the block faces.
    #[must_use]
    pub const fn direction(self) -> Coordinates {
        FACING_DIRECTIONS[self.index()]
    }

    /// The facing pointing the other way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Up => Self::Down,
            Self::Left => Self::Right,
            Self::Down => Self::Up,
        }
    }

    /// Resolves a unit direction into a facing.
    #[must_use]
    pub fn from_direction(direction: Coordinates) -> Option<Self> {
        facing_index(direction).map(|index| Self::ALL[index])
    }
}

impl From<Facing> for u8 {
    fn from(facing: Facing) -> Self {
        facing.index() as u8
    }
}

impl TryFrom<u8> for Facing {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Facing::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| format!("facing {value} is outside 0..=3"))
    }
}

/// Activation state of buttons, panels and the machinery panels drive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Activation {
    /// Inactive; also what an unset (-1) state reads as.
    #[default]
    Off,
    /// Active.
    On,
    /// Blocked third state used by tunnel doors that cannot close on the player.
    Alt,
}

impl Activation {
    /// Decodes the activation stored in a block's signed `state` field.
    #[must_use]
    pub const fn from_state(state: i32) -> Self {
        match state {
            1 => Self::On,
            2 => Self::Alt,
            _ => Self::Off,
        }
    }

    /// Encodes the activation for a block's `state` field.
    #[must_use]
    pub const fn as_state(self) -> i32 {
        match self {
            Self::Off => 0,
            Self::On => 1,
            Self::Alt => 2,
        }
    }

    /// Swaps `Off` and `On`; `Alt` is left untouched.
    #[must_use]
    pub const fn inverted(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
            Self::Alt => Self::Alt,
        }
    }

    /// Whether the state counts as pressed for light aggregation.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::On | Self::Alt)
    }
}

/// Occupancy layers of a grid cell, lowest index first.
///
/// Several entities can share a coordinate as long as they sit on different
/// layers. The numeric order is significant: serialized cells list their
/// entities highest layer first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Layer {
    /// Solid movable and static blocks.
    Block,
    /// Crystals that hold up other blocks.
    SupportCrystal,
    /// Piston bases and arms.
    Piston,
    /// Tunnel segments and tunnel doors.
    Tunnel,
    /// Ordinary collectables.
    Collect,
    /// Power-up collectables.
    CollectPower,
    /// Colour collectables.
    CollectColor,
    /// Second background layer.
    Bg2,
    /// Foreground decoration.
    Fg,
    /// Diggable ground.
    Dig,
    /// Buttons, panels and other small fixtures.
    Misc,
    /// The player.
    Player,
    /// Not placed in the grid.
    None,
}

impl Layer {
    /// Number of layers that can hold an entity.
    pub const COUNT: usize = 12;

    /// Every storable layer, lowest first.
    pub const ALL: [Layer; Layer::COUNT] = [
        Layer::Block,
        Layer::SupportCrystal,
        Layer::Piston,
        Layer::Tunnel,
        Layer::Collect,
        Layer::CollectPower,
        Layer::CollectColor,
        Layer::Bg2,
        Layer::Fg,
        Layer::Dig,
        Layer::Misc,
        Layer::Player,
    ];

    /// Slot index of the layer inside a cell, or `None` for [`Layer::None`].
    #[must_use]
    pub const fn slot(self) -> Option<usize> {
        match self {
            Self::None => None,
            other => Some(other as usize),
        }
    }
}

/// Capabilities a block type may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    /// Blocks movement into its cell.
    Stop,
    /// Can be pushed.
    Push,
    /// Part of a multi-cell connected group.
    Connect,
    /// Ignores gravity.
    Float,
    /// Participates in tiling.
    Tile,
    /// The player character.
    Player,
}

impl Tag {
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Compact set of [`Tag`] values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Tags(u8);

impl Tags {
    /// The empty set.
    pub const EMPTY: Tags = Tags(0);

    /// Builds a set from a list of tags.
    #[must_use]
    pub fn from_slice(tags: &[Tag]) -> Self {
        tags.iter().fold(Self::EMPTY, |set, tag| set.with(*tag))
    }

    /// Returns the set with `tag` added.
    #[must_use]
    pub const fn with(self, tag: Tag) -> Self {
        Self(self.0 | tag.bit())
    }

    /// Whether `tag` is present.
    #[must_use]
    pub const fn contains(self, tag: Tag) -> bool {
        self.0 & tag.bit() != 0
    }
}

/// Colours shared by buttons and panel lights.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LightColor {
    /// Red.
    Red,
    /// Green.
    Green,
    /// Blue.
    Blue,
    /// Yellow.
    Yellow,
    /// Purple.
    Purple,
    /// White.
    White,
}

impl LightColor {
    /// Number of distinct colours.
    pub const COUNT: usize = 6;

    const fn index(self) -> usize {
        self as usize
    }
}

/// Number of active buttons per colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ColorCounts([u32; LightColor::COUNT]);

impl ColorCounts {
    /// Adds one active button of `color`.
    pub fn increment(&mut self, color: LightColor) {
        self.0[color.index()] = self.0[color.index()].saturating_add(1);
    }

    /// Consumes one count of `color`, returning whether one was available.
    pub fn take(&mut self, color: LightColor) -> bool {
        let slot = &mut self.0[color.index()];
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }

    /// Builder-style helper that sets the count for `color`.
    #[must_use]
    pub fn with(mut self, color: LightColor, count: u32) -> Self {
        self.0[color.index()] = count;
        self
    }

    /// Total across all colours.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }
}

impl Index<LightColor> for ColorCounts {
    type Output = u32;

    fn index(&self, color: LightColor) -> &u32 {
        &self.0[color.index()]
    }
}

/// Puzzle categories the level history groups entities by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Pushable rocks.
    Rock,
    /// Crystal clusters.
    Crystal,
    /// Floor buttons.
    Button,
    /// Pistons.
    Piston,
    /// Panels and the doors they drive.
    Panel,
    /// Diggable ground.
    Dig,
    /// Foreground pieces that react to the player.
    Fg,
    /// Gates.
    Gate,
    /// Slots that accept gates.
    GateSlot,
    /// Collectables.
    Collectable,
    /// The player.
    Player,
}

impl Category {
    /// Whether reset returns entities of this category to their origin.
    #[must_use]
    pub const fn is_movable(self) -> bool {
        matches!(self, Self::Rock | Self::Crystal | Self::Collectable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn activation_decodes_unset_state_as_off() {
        assert_eq!(Activation::from_state(-1), Activation::Off);
        assert_eq!(Activation::from_state(7), Activation::Off);
        for activation in [Activation::Off, Activation::On, Activation::Alt] {
            assert_eq!(Activation::from_state(activation.as_state()), activation);
        }
    }

    #[test]
    fn inversion_leaves_alt_untouched() {
        assert_eq!(Activation::Off.inverted(), Activation::On);
        assert_eq!(Activation::On.inverted(), Activation::Off);
        assert_eq!(Activation::Alt.inverted(), Activation::Alt);
    }

    #[test]
    fn facing_serializes_as_index() {
        let json = serde_json::to_string(&Facing::Left).expect("serialize");
        assert_eq!(json, "2");
        let parsed: Facing = serde_json::from_str("3").expect("deserialize");
        assert_eq!(parsed, Facing::Down);
        assert!(serde_json::from_str::<Facing>("4").is_err());
    }

    #[test]
    fn facing_direction_round_trips() {
        for facing in Facing::ALL {
            assert_eq!(Facing::from_direction(facing.direction()), Some(facing));
            assert_eq!(facing.opposite().direction(), -facing.direction());
        }
    }

    #[test]
    fn layer_slots_follow_declaration_order() {
        for (index, layer) in Layer::ALL.iter().enumerate() {
            assert_eq!(layer.slot(), Some(index));
        }
        assert_eq!(Layer::None.slot(), None);
        assert!(Layer::Block < Layer::Player);
    }

    #[test]
    fn tags_track_membership() {
        let tags = Tags::from_slice(&[Tag::Stop, Tag::Push]);
        assert!(tags.contains(Tag::Stop));
        assert!(tags.contains(Tag::Push));
        assert!(!tags.contains(Tag::Float));
        assert!(!Tags::EMPTY.contains(Tag::Player));
    }

    #[test]
    fn color_counts_are_consumed_one_at_a_time() {
        let mut counts = ColorCounts::default().with(LightColor::Red, 1);
        assert!(counts.take(LightColor::Red));
        assert!(!counts.take(LightColor::Red));
        assert!(!counts.take(LightColor::Green));
        counts.increment(LightColor::Blue);
        assert_eq!(counts[LightColor::Blue], 1);
        assert_eq!(counts.total(), 1);
    }

    #[test]
    fn value_types_round_trip_through_bincode() {
        assert_round_trip(&EntityId::new(42));
        assert_round_trip(&Layer::CollectColor);
        assert_round_trip(&Category::GateSlot);
        assert_round_trip(&Coordinates::new(-3, 9));
    }
}
