#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Grotto.
//!
//! [`GridSystem`] is a layered spatial index over block entities. Every
//! coordinate owns a cell with one slot per [`Layer`]; cells are only
//! allocated as long as their highest occupied layer needs. Entities live in
//! an arena addressed by [`EntityId`] and keep their memory when they leave
//! the live grid, so destroyed groups can be restored and undo can move
//! blocks back into place.

mod cell;
mod connectivity;
mod contract;
mod entity;

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use grotto_core::{
    BlockData, BlockRegistry, Coordinates, Diff, EntityId, Facing, GridData, Layer,
    RegistryError, ScreenData,
};
use thiserror::Error;
use tracing::{debug, trace, warn};

use cell::Cell;
use connectivity::{arena_id, link_groups};

pub use contract::{GameController, LevelStore, MoveType};
pub use entity::Entity;

/// Errors raised by grid construction and mutation.
#[derive(Debug, Error)]
pub enum GridError {
    /// The coordinate lies outside the grid's declared extent.
    #[error("({}, {}) lies outside the grid bounds", .0.x, .0.y)]
    OutOfBounds(Coordinates),
    /// The target slot already holds a different entity.
    #[error("{layer:?} slot at ({}, {}) is already held by {occupant}", .coordinates.x, .coordinates.y)]
    Occupied {
        /// Contested cell.
        coordinates: Coordinates,
        /// Contested layer.
        layer: Layer,
        /// Entity currently holding the slot.
        occupant: EntityId,
    },
    /// The entity's type maps to [`Layer::None`].
    #[error("entity {0} has no grid layer")]
    Unplaceable(EntityId),
    /// The block type is not registered.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A completed move, drained by the presentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveRecord {
    /// Entity that moved.
    pub entity: EntityId,
    /// Cell it left.
    pub from: Coordinates,
    /// Cell it entered.
    pub to: Coordinates,
    /// Whether presentation should snap instead of animating.
    pub instant: bool,
}

/// Layered spatial index over block entities.
#[derive(Debug)]
pub struct GridSystem {
    registry: Arc<BlockRegistry>,
    size: Coordinates,
    offset: Coordinates,
    full_grid: bool,
    cells: Vec<Cell>,
    entities: Vec<Entity>,
    destroyed: BTreeMap<EntityId, Vec<EntityId>>,
    screen_data: Vec<ScreenData>,
    support_crystal_coordinates: Option<Vec<Vec<Vec<Coordinates>>>>,
    moves: Vec<MoveRecord>,
}

impl GridSystem {
    /// Creates an empty grid covering `size` cells shifted by `offset`.
    #[must_use]
    pub fn new(
        size: Coordinates,
        offset: Coordinates,
        registry: Arc<BlockRegistry>,
        full_grid: bool,
    ) -> Self {
        let mut grid = Self {
            registry,
            size,
            offset,
            full_grid,
            cells: Vec::new(),
            entities: Vec::new(),
            destroyed: BTreeMap::new(),
            screen_data: Vec::new(),
            support_crystal_coordinates: None,
            moves: Vec::new(),
        };
        grid.cells = grid.allocate_cells();
        grid
    }

    /// Rebuilds a grid from its serialized form.
    ///
    /// `full_grid` allocates every cell at full layer length (tooling);
    /// otherwise each cell only grows to the bucket covering its highest
    /// occupied layer, which the highest-first entry order reaches at once. Live
    /// blocks must be in bounds and may not share a slot; an unknown block
    /// name fails the whole build.
    pub fn from_grid_data(
        data: GridData,
        registry: Arc<BlockRegistry>,
        full_grid: bool,
    ) -> Result<Self, GridError> {
        let GridData {
            size,
            offset,
            screen_data,
            support_crystal_coordinates,
            block_data,
        } = data;

        let mut grid = Self::new(size, offset, registry, full_grid);
        grid.screen_data = screen_data;
        grid.support_crystal_coordinates = support_crystal_coordinates;
        grid.entities.reserve(block_data.len());

        for block in block_data {
            let block_type = grid.registry.get(&block.block_name)?;
            let entity = Entity::new(block, block_type);
            let id = arena_id(grid.entities.len());
            if !entity.is_destroyed() {
                let coordinates = entity.coordinates();
                let (index, slot) = grid.vacant_slot(id, entity.layer(), coordinates)?;
                grid.cells[index].put(slot, id);
            }
            grid.entities.push(entity);
        }

        grid.destroyed = link_groups(&mut grid.entities);
        debug!(
            entities = grid.entities.len(),
            archived_groups = grid.destroyed.len(),
            allocated_slots = grid.allocated_slots(),
            full_grid,
            "grid rebuilt"
        );
        Ok(grid)
    }

    fn allocate_cells(&self) -> Vec<Cell> {
        let width = usize::try_from(self.size.x).unwrap_or(0);
        let height = usize::try_from(self.size.y).unwrap_or(0);
        let count = width.checked_mul(height).unwrap_or(0);
        if self.full_grid {
            vec![Cell::with_len(Layer::COUNT); count]
        } else {
            vec![Cell::default(); count]
        }
    }

    /// Array position of a coordinate, or `None` when out of bounds.
    fn index(&self, coordinates: Coordinates) -> Option<usize> {
        let local = coordinates + self.offset;
        if local.x < 0 || local.y < 0 || local.x >= self.size.x || local.y >= self.size.y {
            return None;
        }
        let column = usize::try_from(local.x).ok()?;
        let row = usize::try_from(local.y).ok()?;
        let width = usize::try_from(self.size.x).ok()?;
        Some(row * width + column)
    }

    fn vacant_slot(
        &self,
        id: EntityId,
        layer: Layer,
        coordinates: Coordinates,
    ) -> Result<(usize, usize), GridError> {
        let slot = layer.slot().ok_or(GridError::Unplaceable(id))?;
        let index = self
            .index(coordinates)
            .ok_or(GridError::OutOfBounds(coordinates))?;
        match self.cells[index].get(slot) {
            Some(occupant) if occupant != id => Err(GridError::Occupied {
                coordinates,
                layer,
                occupant,
            }),
            _ => Ok((index, slot)),
        }
    }

    /// Puts an entity into its slot without occupancy checks.
    fn seat(&mut self, id: EntityId) {
        let entity = &self.entities[id.index()];
        match (entity.layer().slot(), self.index(entity.coordinates())) {
            (Some(slot), Some(index)) => self.cells[index].put(slot, id),
            _ => warn!(%id, "cannot seat entity outside the grid"),
        }
    }

    /// Shared block type registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    /// Extent of the backing array.
    #[must_use]
    pub fn size(&self) -> Coordinates {
        self.size
    }

    /// Offset added to coordinates to obtain array positions.
    #[must_use]
    pub fn offset(&self) -> Coordinates {
        self.offset
    }

    /// Whether every cell is allocated at full layer length.
    #[must_use]
    pub fn is_full_grid(&self) -> bool {
        self.full_grid
    }

    /// Screen metadata carried through from the serialized grid.
    #[must_use]
    pub fn screen_data(&self) -> &[ScreenData] {
        &self.screen_data
    }

    /// Support crystal chains carried through from the serialized grid.
    #[must_use]
    pub fn support_crystal_coordinates(&self) -> Option<&[Vec<Vec<Coordinates>>]> {
        self.support_crystal_coordinates.as_deref()
    }

    /// Total number of layer slots allocated across all cells.
    #[must_use]
    pub fn allocated_slots(&self) -> usize {
        self.cells.iter().map(Cell::len).sum()
    }

    /// Whether `coordinates` lies inside `[-offset, size - offset)`.
    #[must_use]
    pub fn within_bounds(&self, coordinates: Coordinates) -> bool {
        self.index(coordinates).is_some()
    }

    /// Entity stored under `id`, live or archived.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index())
    }

    /// Every entity ever created in this grid, in creation order.
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        (0..self.entities.len()).map(arena_id)
    }

    /// Live entities, row by row from the bottom, highest layer first per cell.
    pub fn live_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.cells.iter().flat_map(Cell::occupants_descending)
    }

    /// Archived groups, keyed by their primary.
    pub fn destroyed_groups(&self) -> impl Iterator<Item = (EntityId, &[EntityId])> + '_ {
        self.destroyed
            .iter()
            .map(|(primary, members)| (*primary, members.as_slice()))
    }

    /// Whether the entity currently occupies the slot it claims.
    #[must_use]
    pub fn is_live(&self, id: EntityId) -> bool {
        self.entity(id).is_some_and(|entity| {
            self.get_data(entity.coordinates(), entity.layer()) == Some(id)
        })
    }

    /// Entity at `coordinates` on `layer`.
    ///
    /// Out-of-bounds coordinates and layers a compacted cell never allocated
    /// both read as empty.
    #[must_use]
    pub fn get_data(&self, coordinates: Coordinates, layer: Layer) -> Option<EntityId> {
        let slot = layer.slot()?;
        let index = self.index(coordinates)?;
        self.cells[index].get(slot)
    }

    /// The eight neighbours of `coordinates` on `layer`, clockwise from North.
    #[must_use]
    pub fn near_data(&self, coordinates: Coordinates, layer: Layer) -> [Option<EntityId>; 8] {
        coordinates
            .neighbors()
            .map(|neighbor| self.get_data(neighbor, layer))
    }

    /// Creates a new runtime entity (a fired projectile, a generated block)
    /// and adds it to the grid.
    ///
    /// Runtime entities are always single-cell. The slot must be empty.
    pub fn insert(&mut self, mut block: BlockData) -> Result<EntityId, GridError> {
        block.connected_blocks = None;
        let block_type = self.registry.get(&block.block_name)?;
        let entity = Entity::new(block, block_type);
        let id = arena_id(self.entities.len());
        if entity.is_destroyed() {
            self.entities.push(entity);
            let _ = self.destroyed.insert(id, vec![id]);
            return Ok(id);
        }

        let (index, slot) = self.vacant_slot(id, entity.layer(), entity.coordinates())?;
        self.entities.push(entity);
        self.cells[index].put(slot, id);
        trace!(%id, "entity inserted");
        Ok(id)
    }

    /// Adds an existing entity back into its slot. Never overwrites a
    /// different occupant.
    pub fn add_data(&mut self, id: EntityId) -> Result<(), GridError> {
        let Some(entity) = self.entity(id) else {
            return Err(GridError::Unplaceable(id));
        };
        let (index, slot) = self.vacant_slot(id, entity.layer(), entity.coordinates())?;
        self.cells[index].put(slot, id);
        Ok(())
    }

    /// Clears the entity's slot if, and only if, it still holds that entity.
    pub fn remove_data(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entity(id) else {
            return false;
        };
        let (Some(slot), Some(index)) = (entity.layer().slot(), self.index(entity.coordinates()))
        else {
            return false;
        };
        self.cells[index].clear_if(slot, id)
    }

    /// Moves an entity one step in `direction`.
    ///
    /// See [`GridSystem::set_data`] for the outcome contract.
    pub fn move_data(
        &mut self,
        direction: Coordinates,
        id: EntityId,
        instant: bool,
    ) -> Result<bool, GridError> {
        let Some(entity) = self.entity(id) else {
            return Ok(false);
        };
        let target = entity.coordinates() + direction;
        self.set_data(target, id, instant)
    }

    /// Moves an entity to `coordinates`.
    ///
    /// Returns `Ok(false)` without touching anything when the entity is not
    /// live (a stale handle). Out-of-bounds or occupied targets are rejected
    /// and leave the entity where it was.
    pub fn set_data(
        &mut self,
        coordinates: Coordinates,
        id: EntityId,
        instant: bool,
    ) -> Result<bool, GridError> {
        if !self.is_live(id) {
            trace!(%id, "ignoring move of an entity that is not in the grid");
            return Ok(false);
        }
        let entity = &self.entities[id.index()];
        let from = entity.coordinates();
        if from == coordinates {
            return Ok(true);
        }

        let (index, slot) = self.vacant_slot(id, entity.layer(), coordinates)?;
        let _ = self.remove_data(id);
        self.relocate(id, coordinates);
        self.cells[index].put(slot, id);
        self.moves.push(MoveRecord {
            entity: id,
            from,
            to: coordinates,
            instant,
        });
        Ok(true)
    }

    /// Moves every live member of the entity's group one step together.
    ///
    /// Members may move into cells the group itself is vacating. Nothing
    /// moves if any member's target is out of bounds or held by an outsider.
    pub fn move_group(
        &mut self,
        direction: Coordinates,
        id: EntityId,
        instant: bool,
    ) -> Result<bool, GridError> {
        let members: Vec<EntityId> = self
            .group_of(id)
            .into_iter()
            .filter(|member| self.is_live(*member))
            .collect();
        if members.is_empty() {
            return Ok(false);
        }

        let mut steps = Vec::with_capacity(members.len());
        for member in &members {
            let entity = &self.entities[member.index()];
            let from = entity.coordinates();
            let to = from + direction;
            match self.vacant_slot(*member, entity.layer(), to) {
                Err(GridError::Occupied { occupant, .. }) if members.contains(&occupant) => {}
                Err(error) => return Err(error),
                Ok(_) => {}
            }
            steps.push((*member, from, to));
        }

        for member in &members {
            let _ = self.remove_data(*member);
        }
        for (member, from, to) in steps {
            self.relocate(member, to);
            self.seat(member);
            self.moves.push(MoveRecord {
                entity: member,
                from,
                to,
                instant,
            });
        }
        Ok(true)
    }

    /// Updates an entity's coordinates and the matching entry in every
    /// group member's `connected_blocks`.
    fn relocate(&mut self, id: EntityId, to: Coordinates) {
        self.entities[id.index()].data.coordinates = to;
        let members = self.group_of(id);
        let Some(position) = members.iter().position(|member| *member == id) else {
            return;
        };
        for member in members {
            if let Some(cells) = self.entities[member.index()].data.connected_blocks.as_mut() {
                if let Some(cell) = cells.get_mut(position) {
                    *cell = to;
                }
            }
        }
    }

    /// Primary of the entity's group; the entity itself when ungrouped.
    #[must_use]
    pub fn primary_of(&self, id: EntityId) -> EntityId {
        self.entity(id).and_then(Entity::primary).unwrap_or(id)
    }

    /// Every member of the entity's group, primary first.
    #[must_use]
    pub fn group_of(&self, id: EntityId) -> Vec<EntityId> {
        let primary = self.primary_of(id);
        let Some(entity) = self.entity(primary) else {
            return Vec::new();
        };
        let mut members = Vec::with_capacity(entity.connected().len() + 1);
        members.push(primary);
        members.extend_from_slice(entity.connected());
        members
    }

    /// Moves a whole group between the live grid and the archive.
    ///
    /// Returns `false` when nothing changed: the group was already in the
    /// requested state, or a restore found one of its slots taken.
    pub fn destroy_data(&mut self, id: EntityId, destroy: bool) -> bool {
        if self.entity(id).is_none() {
            return false;
        }
        let primary = self.primary_of(id);

        if destroy {
            if self.destroyed.contains_key(&primary) {
                return false;
            }
            let members = self.group_of(primary);
            for member in &members {
                let _ = self.remove_data(*member);
                self.entities[member.index()].data.destroyed = true;
            }
            debug!(%primary, members = members.len(), "group destroyed");
            let _ = self.destroyed.insert(primary, members);
            return true;
        }

        let Some(members) = self.destroyed.remove(&primary) else {
            return false;
        };
        let blocked = members.iter().find_map(|member| {
            let entity = &self.entities[member.index()];
            self.vacant_slot(*member, entity.layer(), entity.coordinates())
                .err()
        });
        if let Some(error) = blocked {
            warn!(%primary, %error, "cannot restore destroyed group");
            let _ = self.destroyed.insert(primary, members);
            return false;
        }
        for member in &members {
            self.entities[member.index()].data.destroyed = false;
            self.seat(*member);
        }
        debug!(%primary, members = members.len(), "group restored");
        true
    }

    /// Sets the transient motion flags on the entity's whole group.
    pub fn set_motion(&mut self, id: EntityId, moving: bool, direction: Coordinates) {
        for member in self.group_of(id) {
            let entity = &mut self.entities[member.index()];
            entity.moving = moving;
            entity.move_direction = direction;
        }
    }

    /// Writes the type-specific state field.
    pub fn set_state(&mut self, id: EntityId, state: i32) -> bool {
        self.with_data(id, |data| data.state = state)
    }

    /// Writes the presentation frame.
    pub fn set_sprite_state(&mut self, id: EntityId, sprite_state: i32) -> bool {
        self.with_data(id, |data| data.sprite_state = sprite_state)
    }

    /// Writes the facing.
    pub fn set_facing(&mut self, id: EntityId, facing: Facing) -> bool {
        self.with_data(id, |data| data.facing = facing)
    }

    fn with_data(&mut self, id: EntityId, write: impl FnOnce(&mut BlockData)) -> bool {
        match self.entities.get_mut(id.index()) {
            Some(entity) => {
                write(&mut entity.data);
                true
            }
            None => false,
        }
    }

    /// Restores a batch of snapshots in one step.
    ///
    /// Every relocated entity is lifted before any is re-seated, so entities
    /// trading places never collide with each other. An entity whose restored
    /// slot is taken by something the batch does not cover keeps its previous
    /// state; if that slot is gone too it is archived. Archive entries are
    /// reconciled for every group the batch touched, and a group left partly
    /// live is archived whole.
    pub fn apply_diffs(&mut self, diffs: &[(EntityId, Diff)]) {
        let mut lifted = Vec::new();
        for (id, diff) in diffs {
            let Some(entity) = self.entity(*id) else {
                warn!(%id, "diff refers to an unknown entity");
                continue;
            };
            if entity.data.compare_diff(diff) {
                continue;
            }
            let from = entity.coordinates();
            let previous = entity.data.get_diff();
            let _ = self.remove_data(*id);
            lifted.push((*id, from, previous));
        }

        let mut groups = BTreeSet::new();
        for (id, diff) in diffs {
            if let Some(entity) = self.entities.get_mut(id.index()) {
                entity.data.apply_diff(diff);
            }
        }
        for (id, from, previous) in &lifted {
            let _ = groups.insert(self.primary_of(*id));
            let to = self.entities[id.index()].coordinates();
            self.relocate(*id, to);
            if self.entities[id.index()].is_destroyed() {
                continue;
            }
            match self.add_data(*id) {
                Ok(()) if *from != to => self.moves.push(MoveRecord {
                    entity: *id,
                    from: *from,
                    to,
                    instant: true,
                }),
                Ok(()) => {}
                Err(error) => {
                    warn!(%id, %error, "restored slot is taken; keeping the previous state");
                    self.revert(*id, previous);
                }
            }
        }

        for primary in groups {
            let members = self.group_of(primary);
            let archived = members
                .iter()
                .filter(|member| self.entities[member.index()].is_destroyed())
                .count();
            if archived == 0 {
                let _ = self.destroyed.remove(&primary);
                continue;
            }
            if archived < members.len() {
                warn!(
                    %primary,
                    archived,
                    members = members.len(),
                    "group only partly live; archiving it"
                );
                for member in &members {
                    let _ = self.remove_data(*member);
                    self.entities[member.index()].data.destroyed = true;
                }
            }
            let _ = self.destroyed.insert(primary, members);
        }
        debug!(diffs = diffs.len(), lifted = lifted.len(), "diffs applied");
    }

    /// Puts a lifted entity back the way it was before a failed restore.
    fn revert(&mut self, id: EntityId, previous: &Diff) {
        self.entities[id.index()].data.apply_diff(previous);
        let back = self.entities[id.index()].coordinates();
        self.relocate(id, back);
        if self.entities[id.index()].is_destroyed() {
            return;
        }
        if let Err(error) = self.add_data(id) {
            warn!(%id, %error, "previous slot is taken as well; archiving entity");
            self.entities[id.index()].data.destroyed = true;
        }
    }

    /// Shrinks `size`/`offset` to the bounding box of every stored entity.
    ///
    /// Archived groups and the origins that blocks reset to stay inside the
    /// box, so they can still be restored afterwards.
    pub fn trim_bounds(&mut self) {
        let live: Vec<EntityId> = self.live_entities().collect();
        let stored: Vec<Coordinates> = live
            .iter()
            .chain(self.destroyed.values().flatten())
            .map(|id| &self.entities[id.index()])
            .flat_map(|entity| [entity.coordinates(), entity.data.origin])
            .collect();
        let Some((&start, rest)) = stored.split_first() else {
            self.size = Coordinates::ZERO;
            self.offset = Coordinates::ZERO;
            self.cells.clear();
            return;
        };
        let (min, max) = rest.iter().fold((start, start), |(min, max), coordinates| {
            (min.min(*coordinates), max.max(*coordinates))
        });
        self.offset = -min;
        self.size = max - min + Coordinates::new(1, 1);
        self.cells = self.allocate_cells();
        for id in live {
            self.seat(id);
        }
        debug!(size = ?self.size, offset = ?self.offset, "bounds trimmed");
    }

    /// Flattens the grid into the block list it can be rebuilt from: live
    /// blocks highest layer first per cell, then every archived group.
    #[must_use]
    pub fn sort_block_data(&self) -> Vec<BlockData> {
        let archived = self.destroyed.values().flatten().copied();
        self.live_entities()
            .chain(archived)
            .map(|id| self.entities[id.index()].data.clone())
            .collect()
    }

    /// Serializable snapshot of the whole grid.
    #[must_use]
    pub fn to_grid_data(&self) -> GridData {
        GridData {
            size: self.size,
            offset: self.offset,
            screen_data: self.screen_data.clone(),
            support_crystal_coordinates: self.support_crystal_coordinates.clone(),
            block_data: self.sort_block_data(),
        }
    }

    /// Drains the journal of completed moves.
    pub fn take_moves(&mut self) -> Vec<MoveRecord> {
        std::mem::take(&mut self.moves)
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use grotto_core::{Category, Coordinates, EntityId, Layer, Tag};

    use super::GridSystem;

    /// First occupant of `coordinates` among `layers`, in the given order.
    #[must_use]
    pub fn occupant(grid: &GridSystem, coordinates: Coordinates, layers: &[Layer]) -> Option<EntityId> {
        layers
            .iter()
            .find_map(|layer| grid.get_data(coordinates, *layer))
    }

    /// Whether any live entity at `coordinates` carries the `Stop` tag.
    #[must_use]
    pub fn is_solid(grid: &GridSystem, coordinates: Coordinates) -> bool {
        Layer::ALL.iter().any(|layer| {
            grid.get_data(coordinates, *layer)
                .and_then(|id| grid.entity(id))
                .is_some_and(|entity| entity.has_tag(Tag::Stop))
        })
    }

    /// The live player entity, if one exists.
    #[must_use]
    pub fn player(grid: &GridSystem) -> Option<EntityId> {
        grid.live_entities().find(|id| {
            grid.entity(*id)
                .is_some_and(|entity| entity.has_tag(Tag::Player))
        })
    }

    /// Every entity, live or archived, registered under `category`.
    #[must_use]
    pub fn entities_in_category(grid: &GridSystem, category: Category) -> Vec<EntityId> {
        grid.entity_ids()
            .filter(|id| {
                grid.entity(*id)
                    .is_some_and(|entity| entity.category() == Some(category))
            })
            .collect()
    }

    /// Current cells of every member of the entity's group, primary first.
    #[must_use]
    pub fn group_cells(grid: &GridSystem, id: EntityId) -> Vec<Coordinates> {
        grid.group_of(id)
            .into_iter()
            .filter_map(|member| grid.entity(member).map(|entity| entity.coordinates()))
            .collect()
    }
}
