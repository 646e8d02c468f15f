//! Rebuilds multi-cell group links from raw block records.

use std::collections::{BTreeMap, HashMap};

use grotto_core::{Coordinates, EntityId, Layer};
use tracing::warn;

use crate::entity::Entity;

/// Groups are matched by value, never by the identity of a shared array.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct GroupKey {
    layer: Layer,
    destroyed: bool,
    cells: Vec<Coordinates>,
}

/// Links every connected group and returns the archive of destroyed groups,
/// keyed by each group's primary.
pub(crate) fn link_groups(entities: &mut [Entity]) -> BTreeMap<EntityId, Vec<EntityId>> {
    let mut groups: HashMap<GroupKey, Vec<EntityId>> = HashMap::new();
    for (index, entity) in entities.iter().enumerate() {
        let Some(cells) = entity.data.connected_blocks.as_ref() else {
            continue;
        };
        if cells.len() < 2 {
            continue;
        }
        groups
            .entry(GroupKey {
                layer: entity.layer(),
                destroyed: entity.data.destroyed,
                cells: cells.clone(),
            })
            .or_default()
            .push(arena_id(index));
    }

    let mut keys: Vec<&GroupKey> = groups.keys().collect();
    keys.sort_by(|a, b| a.cells.cmp(&b.cells).then(a.layer.cmp(&b.layer)));
    for key in keys {
        let members = &groups[key];
        let Some(&primary) = members
            .iter()
            .find(|id| entities[id.index()].data.is_primary())
        else {
            warn!(cells = ?key.cells, layer = ?key.layer, "connected group has no primary");
            continue;
        };

        let mut siblings = Vec::with_capacity(key.cells.len() - 1);
        for cell in &key.cells[1..] {
            match members
                .iter()
                .copied()
                .find(|id| *id != primary && entities[id.index()].coordinates() == *cell)
            {
                Some(sibling) => siblings.push(sibling),
                None => warn!(
                    %primary,
                    cell = ?cell,
                    "connected group is missing a sibling"
                ),
            }
        }

        for sibling in &siblings {
            entities[sibling.index()].primary = Some(primary);
        }
        entities[primary.index()].connected = siblings;
    }

    let mut archive = BTreeMap::new();
    for (index, entity) in entities.iter().enumerate() {
        if !entity.data.destroyed || entity.primary.is_some() {
            continue;
        }
        let id = arena_id(index);
        let mut members = vec![id];
        members.extend_from_slice(&entity.connected);
        let _ = archive.insert(id, members);
    }
    archive
}

pub(crate) fn arena_id(index: usize) -> EntityId {
    EntityId::new(u32::try_from(index).unwrap_or(u32::MAX))
}
