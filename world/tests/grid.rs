use std::sync::Arc;

use grotto_core::{
    BlockData, BlockRegistry, Coordinates, EntityId, Facing, GridData, Layer, RegistryError,
};
use grotto_world::{query, GridError, GridSystem, MoveRecord};

fn registry() -> Arc<BlockRegistry> {
    Arc::new(BlockRegistry::builtin())
}

fn grid_data(size: Coordinates, offset: Coordinates, block_data: Vec<BlockData>) -> GridData {
    GridData {
        size,
        offset,
        block_data,
        ..GridData::default()
    }
}

/// Blocks listed in the order the grid writes them back out.
fn sorted_level() -> Vec<BlockData> {
    let piston = vec![Coordinates::new(1, 0), Coordinates::new(2, 0)];
    let formation = vec![Coordinates::new(0, 2), Coordinates::new(1, 2)];
    vec![
        BlockData::new("Vine", Coordinates::new(0, 0)),
        BlockData::new("Rock", Coordinates::new(0, 0)),
        BlockData::new("PistonBase", Coordinates::new(1, 0))
            .facing(Facing::Right)
            .state(0)
            .connected(piston.clone()),
        BlockData::new("PistonArm", Coordinates::new(2, 0))
            .facing(Facing::Right)
            .connected(piston),
        BlockData::new("Player", Coordinates::new(3, 2)),
        BlockData::new("RockFormation", Coordinates::new(0, 2))
            .connected(formation.clone())
            .destroyed(true),
        BlockData::new("RockFormation", Coordinates::new(1, 2))
            .connected(formation)
            .destroyed(true),
    ]
}

fn level() -> GridSystem {
    GridSystem::from_grid_data(
        grid_data(Coordinates::new(4, 3), Coordinates::ZERO, sorted_level()),
        registry(),
        false,
    )
    .expect("level builds")
}

fn id(grid: &GridSystem, coordinates: Coordinates, layer: Layer) -> EntityId {
    grid.get_data(coordinates, layer)
        .unwrap_or_else(|| panic!("nothing at {coordinates:?} on {layer:?}"))
}

#[test]
fn sorted_block_data_round_trips() {
    let grid = level();
    let data = grid.to_grid_data();
    assert_eq!(data.block_data, sorted_level(), "sorted output differs from input");

    let json = serde_json::to_string(&data).expect("serialize");
    let parsed: GridData = serde_json::from_str(&json).expect("deserialize");
    let rebuilt = GridSystem::from_grid_data(parsed, registry(), false).expect("rebuild");
    assert_eq!(rebuilt.sort_block_data(), sorted_level());
}

#[test]
fn connected_groups_link_primary_and_siblings() {
    let grid = level();
    let base = id(&grid, Coordinates::new(1, 0), Layer::Piston);
    let arm = id(&grid, Coordinates::new(2, 0), Layer::Piston);

    assert_eq!(grid.primary_of(arm), base);
    assert_eq!(grid.group_of(arm), vec![base, arm]);
    assert_eq!(grid.entity(base).map(|e| e.connected().to_vec()), Some(vec![arm]));
    assert_eq!(grid.entity(arm).and_then(|e| e.primary()), Some(base));
    assert_eq!(
        query::group_cells(&grid, base),
        vec![Coordinates::new(1, 0), Coordinates::new(2, 0)]
    );
}

#[test]
fn destroyed_groups_are_archived_under_their_primary() {
    let grid = level();
    let archived: Vec<_> = grid.destroyed_groups().collect();
    assert_eq!(archived.len(), 1, "one archived group expected");
    let (primary, members) = archived[0];
    assert_eq!(members.len(), 2);
    assert_eq!(members[0], primary);
    assert_eq!(grid.get_data(Coordinates::new(0, 2), Layer::Block), None);
}

#[test]
fn compact_cells_allocate_only_what_they_use() {
    let data = grid_data(
        Coordinates::new(3, 3),
        Coordinates::ZERO,
        vec![BlockData::new("Rock", Coordinates::new(1, 1))],
    );
    let compact = GridSystem::from_grid_data(data.clone(), registry(), false).expect("compact");
    assert_eq!(compact.allocated_slots(), 1);
    assert_eq!(compact.get_data(Coordinates::new(1, 1), Layer::Player), None);

    let full = GridSystem::from_grid_data(data, registry(), true).expect("full");
    assert_eq!(full.allocated_slots(), 9 * Layer::COUNT);
}

#[test]
fn cells_grow_to_their_highest_layer_in_any_entry_order() {
    let data = grid_data(
        Coordinates::new(2, 1),
        Coordinates::ZERO,
        vec![
            BlockData::new("Rock", Coordinates::ZERO),
            BlockData::new("Player", Coordinates::ZERO),
            BlockData::new("Rock", Coordinates::new(1, 0)),
        ],
    );
    let grid = GridSystem::from_grid_data(data, registry(), false).expect("level");
    assert_eq!(grid.allocated_slots(), Layer::COUNT + 1);
    assert!(query::player(&grid).is_some());
    assert!(grid.get_data(Coordinates::ZERO, Layer::Block).is_some());
}

#[test]
fn duplicate_slots_and_unknown_blocks_are_rejected() {
    let duplicate = grid_data(
        Coordinates::new(2, 2),
        Coordinates::ZERO,
        vec![
            BlockData::new("Rock", Coordinates::new(0, 0)),
            BlockData::new("Crystal", Coordinates::new(0, 0)),
        ],
    );
    assert!(matches!(
        GridSystem::from_grid_data(duplicate, registry(), false),
        Err(GridError::Occupied { layer: Layer::Block, .. })
    ));

    let unknown = grid_data(
        Coordinates::new(2, 2),
        Coordinates::ZERO,
        vec![BlockData::new("Teapot", Coordinates::new(0, 0))],
    );
    assert!(matches!(
        GridSystem::from_grid_data(unknown, registry(), false),
        Err(GridError::Registry(RegistryError::UnknownBlock(name))) if name == "Teapot"
    ));

    let outside = grid_data(
        Coordinates::new(2, 2),
        Coordinates::ZERO,
        vec![BlockData::new("Rock", Coordinates::new(5, 0))],
    );
    assert!(matches!(
        GridSystem::from_grid_data(outside, registry(), false),
        Err(GridError::OutOfBounds(_))
    ));
}

#[test]
fn bounds_follow_the_offset() {
    let grid = GridSystem::new(
        Coordinates::new(4, 4),
        Coordinates::new(2, 2),
        registry(),
        false,
    );
    assert!(grid.within_bounds(Coordinates::new(-2, -2)));
    assert!(grid.within_bounds(Coordinates::new(1, 1)));
    assert!(!grid.within_bounds(Coordinates::new(2, 0)));
    assert!(!grid.within_bounds(Coordinates::new(-3, 0)));
    assert_eq!(grid.get_data(Coordinates::new(40, 40), Layer::Block), None);
}

#[test]
fn moves_reject_occupied_and_out_of_bounds_targets() {
    let mut grid = level();
    let rock = id(&grid, Coordinates::new(0, 0), Layer::Block);
    let blocker = grid
        .insert(BlockData::new("Rock", Coordinates::new(0, 1)))
        .expect("insert");

    assert!(matches!(
        grid.set_data(Coordinates::new(0, 1), rock, false),
        Err(GridError::Occupied { occupant, .. }) if occupant == blocker
    ));
    assert!(matches!(
        grid.move_data(Coordinates::LEFT, rock, false),
        Err(GridError::OutOfBounds(_))
    ));
    assert_eq!(grid.get_data(Coordinates::new(0, 0), Layer::Block), Some(rock));

    // Different layers share a cell.
    assert_eq!(grid.move_data(Coordinates::RIGHT, rock, false).ok(), Some(true));
    assert_eq!(grid.get_data(Coordinates::new(1, 0), Layer::Block), Some(rock));
    assert_eq!(
        grid.take_moves(),
        vec![MoveRecord {
            entity: rock,
            from: Coordinates::new(0, 0),
            to: Coordinates::new(1, 0),
            instant: false,
        }]
    );
    assert!(grid.take_moves().is_empty(), "journal drains");
}

#[test]
fn stale_handles_do_nothing() {
    let mut grid = level();
    let rock = id(&grid, Coordinates::new(0, 0), Layer::Block);
    assert!(grid.remove_data(rock));
    assert!(!grid.remove_data(rock), "second removal is a no-op");
    assert_eq!(grid.move_data(Coordinates::UP, rock, false).ok(), Some(false));
    assert_eq!(
        grid.set_data(Coordinates::new(3, 0), EntityId::new(999), true).ok(),
        Some(false)
    );
    assert!(!grid.is_live(rock));
}

#[test]
fn group_moves_keep_connected_blocks_in_sync() {
    let mut grid = level();
    let base = id(&grid, Coordinates::new(1, 0), Layer::Piston);
    let arm = id(&grid, Coordinates::new(2, 0), Layer::Piston);

    assert_eq!(grid.move_group(Coordinates::UP, arm, false).ok(), Some(true));
    let expected = vec![Coordinates::new(1, 1), Coordinates::new(2, 1)];
    for member in [base, arm] {
        let entity = grid.entity(member).expect("member");
        assert_eq!(entity.data().connected_blocks.as_ref(), Some(&expected));
    }
    assert_eq!(grid.get_data(Coordinates::new(1, 0), Layer::Piston), None);
    assert_eq!(grid.get_data(Coordinates::new(2, 1), Layer::Piston), Some(arm));

    // A group may slide into cells it vacates itself.
    assert_eq!(grid.move_group(Coordinates::RIGHT, base, false).ok(), Some(true));
    assert_eq!(grid.get_data(Coordinates::new(2, 1), Layer::Piston), Some(base));
    assert!(grid.is_live(base) && grid.is_live(arm));
}

#[test]
fn group_moves_are_all_or_nothing() {
    let mut grid = level();
    let base = id(&grid, Coordinates::new(1, 0), Layer::Piston);
    let _ = grid
        .insert(BlockData::new("PistonArm", Coordinates::new(2, 1)))
        .expect("insert");

    assert!(matches!(
        grid.move_group(Coordinates::UP, base, false),
        Err(GridError::Occupied { .. })
    ));
    assert_eq!(grid.get_data(Coordinates::new(1, 0), Layer::Piston), Some(base));
    assert!(grid.take_moves().is_empty());
}

#[test]
fn destroy_and_restore_whole_groups() {
    let mut grid = level();
    let base = id(&grid, Coordinates::new(1, 0), Layer::Piston);
    let arm = id(&grid, Coordinates::new(2, 0), Layer::Piston);

    assert!(grid.destroy_data(arm, true), "destroying via a sibling archives the group");
    assert!(!grid.destroy_data(base, true), "already archived");
    assert!(!grid.is_live(base) && !grid.is_live(arm));
    assert!(grid.destroyed_groups().any(|(primary, _)| primary == base));

    let squatter = grid
        .insert(BlockData::new("PistonArm", Coordinates::new(2, 0)))
        .expect("insert");
    assert!(!grid.destroy_data(base, false), "restore blocked by an occupied slot");
    assert!(grid.entity(base).is_some_and(|e| e.is_destroyed()));

    assert!(grid.remove_data(squatter));
    assert!(grid.destroy_data(base, false));
    assert!(grid.is_live(base) && grid.is_live(arm));
    assert!(!grid.destroyed_groups().any(|(primary, _)| primary == base));
}

#[test]
fn motion_flags_cover_the_whole_group() {
    let mut grid = level();
    let base = id(&grid, Coordinates::new(1, 0), Layer::Piston);
    let arm = id(&grid, Coordinates::new(2, 0), Layer::Piston);

    grid.set_motion(arm, true, Coordinates::DOWN);
    for member in [base, arm] {
        let entity = grid.entity(member).expect("member");
        assert!(entity.is_moving());
        assert_eq!(entity.move_direction(), Coordinates::DOWN);
    }
}

#[test]
fn diffs_swap_entities_without_collisions() {
    let mut grid = GridSystem::from_grid_data(
        grid_data(
            Coordinates::new(2, 1),
            Coordinates::ZERO,
            vec![
                BlockData::new("Rock", Coordinates::new(0, 0)),
                BlockData::new("Crystal", Coordinates::new(1, 0)),
            ],
        ),
        registry(),
        false,
    )
    .expect("level");
    let rock = id(&grid, Coordinates::new(0, 0), Layer::Block);
    let crystal = id(&grid, Coordinates::new(1, 0), Layer::Block);

    let mut rock_diff = grid.entity(rock).expect("rock").data().get_diff();
    let mut crystal_diff = grid.entity(crystal).expect("crystal").data().get_diff();
    rock_diff.coordinates = Coordinates::new(1, 0);
    crystal_diff.coordinates = Coordinates::new(0, 0);

    grid.apply_diffs(&[(rock, rock_diff), (crystal, crystal_diff)]);
    assert_eq!(grid.get_data(Coordinates::new(1, 0), Layer::Block), Some(rock));
    assert_eq!(grid.get_data(Coordinates::new(0, 0), Layer::Block), Some(crystal));
    assert!(grid.take_moves().iter().all(|record| record.instant));
}

#[test]
fn diffs_restore_destroyed_groups() {
    let mut grid = level();
    let base = id(&grid, Coordinates::new(1, 0), Layer::Piston);
    let arm = id(&grid, Coordinates::new(2, 0), Layer::Piston);
    let before: Vec<_> = [base, arm]
        .into_iter()
        .map(|member| (member, grid.entity(member).expect("member").data().get_diff()))
        .collect();

    assert!(grid.destroy_data(base, true));
    grid.apply_diffs(&before);

    assert!(grid.is_live(base) && grid.is_live(arm));
    assert!(!grid.destroyed_groups().any(|(primary, _)| primary == base));
}

#[test]
fn trimming_shrinks_to_live_blocks() {
    let mut grid = GridSystem::from_grid_data(
        grid_data(
            Coordinates::new(10, 10),
            Coordinates::new(5, 5),
            vec![
                BlockData::new("Rock", Coordinates::new(-2, 1)),
                BlockData::new("Player", Coordinates::new(3, -1)),
            ],
        ),
        registry(),
        false,
    )
    .expect("level");

    grid.trim_bounds();
    assert_eq!(grid.offset(), Coordinates::new(2, 1));
    assert_eq!(grid.size(), Coordinates::new(6, 3));
    assert!(grid.get_data(Coordinates::new(-2, 1), Layer::Block).is_some());
    assert!(query::player(&grid).is_some());
    assert!(!grid.within_bounds(Coordinates::new(-3, 0)));
}

#[test]
fn trimming_keeps_archived_groups_restorable() {
    let formation = vec![Coordinates::new(3, 3), Coordinates::new(4, 3)];
    let mut grid = GridSystem::from_grid_data(
        grid_data(
            Coordinates::new(6, 5),
            Coordinates::ZERO,
            vec![
                BlockData::new("Rock", Coordinates::ZERO),
                BlockData::new("RockFormation", formation[0])
                    .connected(formation.clone())
                    .destroyed(true),
                BlockData::new("RockFormation", formation[1])
                    .connected(formation.clone())
                    .destroyed(true),
            ],
        ),
        registry(),
        false,
    )
    .expect("level");
    let (primary, _) = grid.destroyed_groups().next().expect("archived formation");

    grid.trim_bounds();
    assert_eq!(grid.size(), Coordinates::new(5, 4), "box covers the archive");
    assert!(grid.destroy_data(primary, false), "formation restores after trimming");
    for cell in &formation {
        assert!(grid.get_data(*cell, Layer::Block).is_some(), "{cell:?} restored");
    }
}

#[test]
fn trimming_keeps_block_origins_in_bounds() {
    let mut grid = GridSystem::from_grid_data(
        grid_data(
            Coordinates::new(5, 1),
            Coordinates::ZERO,
            vec![BlockData::new("Rock", Coordinates::ZERO)],
        ),
        registry(),
        false,
    )
    .expect("level");
    let rock = id(&grid, Coordinates::ZERO, Layer::Block);
    assert_eq!(grid.set_data(Coordinates::new(2, 0), rock, true).ok(), Some(true));

    grid.trim_bounds();
    assert_eq!(grid.size(), Coordinates::new(3, 1));
    assert!(grid.within_bounds(Coordinates::ZERO), "origin stays reachable for a reset");
}

#[test]
fn trimming_an_empty_grid_collapses_it() {
    let mut grid = GridSystem::new(Coordinates::new(3, 3), Coordinates::ZERO, registry(), false);
    grid.trim_bounds();
    assert_eq!(grid.size(), Coordinates::ZERO);
    assert_eq!(grid.live_entities().count(), 0);
}

#[test]
fn neighbours_are_read_clockwise_from_north() {
    let mut grid = GridSystem::new(Coordinates::new(3, 3), Coordinates::new(1, 1), registry(), false);
    let north = grid
        .insert(BlockData::new("Rock", Coordinates::new(0, 1)))
        .expect("north");
    let west = grid
        .insert(BlockData::new("Rock", Coordinates::new(-1, 0)))
        .expect("west");

    let near = grid.near_data(Coordinates::ZERO, Layer::Block);
    assert_eq!(near[0], Some(north));
    assert_eq!(near[6], Some(west));
    assert_eq!(near.iter().flatten().count(), 2);
    assert!(query::is_solid(&grid, Coordinates::new(0, 1)));
    assert!(!query::is_solid(&grid, Coordinates::ZERO));
}
