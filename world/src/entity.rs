//! Runtime wrapper around a persisted block.

use grotto_core::{
    Activation, BlockData, BlockType, Category, Coordinates, EntityId, Layer, LightColor, Tag,
    Tags,
};

/// A block living in a grid's entity arena.
///
/// Layer, tags and category are copied from the block's registry type when the
/// entity is created. Group links are maintained by the grid: `connected` is
/// populated only on a group's primary and `primary` only on its siblings.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub(crate) data: BlockData,
    layer: Layer,
    tags: Tags,
    category: Option<Category>,
    color: Option<LightColor>,
    force: bool,
    pub(crate) connected: Vec<EntityId>,
    pub(crate) primary: Option<EntityId>,
    pub(crate) moving: bool,
    pub(crate) move_direction: Coordinates,
}

impl Entity {
    pub(crate) fn new(data: BlockData, block_type: &BlockType) -> Self {
        Self {
            data,
            layer: block_type.layer,
            tags: block_type.tags,
            category: block_type.category,
            color: block_type.color,
            force: block_type.force,
            connected: Vec::new(),
            primary: None,
            moving: false,
            move_direction: Coordinates::ZERO,
        }
    }

    /// Persisted block record.
    #[must_use]
    pub fn data(&self) -> &BlockData {
        &self.data
    }

    /// Current cell.
    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        self.data.coordinates
    }

    /// Activation decoded from the block state.
    #[must_use]
    pub fn activation(&self) -> Activation {
        self.data.activation()
    }

    /// Layer the entity occupies.
    #[must_use]
    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Capability tags.
    #[must_use]
    pub fn tags(&self) -> Tags {
        self.tags
    }

    /// Shorthand for `tags().contains(tag)`.
    #[must_use]
    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(tag)
    }

    /// History category, if any.
    #[must_use]
    pub fn category(&self) -> Option<Category> {
        self.category
    }

    /// Button colour, if any.
    #[must_use]
    pub fn color(&self) -> Option<LightColor> {
        self.color
    }

    /// Whether the entity is a force block.
    #[must_use]
    pub fn is_force(&self) -> bool {
        self.force
    }

    /// Siblings of a primary, in `connected_blocks` order. Empty elsewhere.
    #[must_use]
    pub fn connected(&self) -> &[EntityId] {
        &self.connected
    }

    /// Primary of the group this sibling belongs to.
    #[must_use]
    pub fn primary(&self) -> Option<EntityId> {
        self.primary
    }

    /// Whether the block is archived.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.data.destroyed
    }

    /// Transient motion flag, uniform across a group.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Direction of the current motion.
    #[must_use]
    pub fn move_direction(&self) -> Coordinates {
        self.move_direction
    }

    /// Falls under gravity: pushable and not floating.
    #[must_use]
    pub fn is_fall_sensitive(&self) -> bool {
        self.has_tag(Tag::Push) && !self.has_tag(Tag::Float)
    }
}
