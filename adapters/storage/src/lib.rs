#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! File-backed persistence for level grids and block registries.
//!
//! Grids are stored as `<root>/<level>/<slot>.json`, wrapped in a versioned
//! envelope so older saves can be rejected with a clear message.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use grotto_core::{BlockRegistry, GridData};
use grotto_world::{GridSystem, LevelStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SUPPORTED_SNAPSHOT_VERSION: u32 = 1;
const SNAPSHOT_EXTENSION: &str = "json";

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    grid: &'a GridData,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    grid: GridData,
}

/// Level store writing one JSON file per level slot.
#[derive(Clone, Debug)]
pub struct FileLevelStore {
    root: PathBuf,
}

impl FileLevelStore {
    /// Creates a store rooted at `root`. Directories are created on save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a level slot is stored in.
    pub fn slot_path(&self, level: &str, slot: u32) -> Result<PathBuf> {
        validate_level_name(level)?;
        Ok(self
            .root
            .join(level)
            .join(format!("{slot}.{SNAPSHOT_EXTENSION}")))
    }

    /// Slots saved for `level`, ascending. A level never saved has none.
    pub fn slots(&self, level: &str) -> Result<Vec<u32>> {
        validate_level_name(level)?;
        let dir = self.root.join(level);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut slots = Vec::new();
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("failed to list level directory {}", dir.display()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("failed to read entry in {}", dir.display()))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            if let Some(slot) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse().ok())
            {
                slots.push(slot);
            }
        }
        slots.sort_unstable();
        Ok(slots)
    }

    /// Removes a saved slot. Returns whether a file was deleted.
    pub fn delete_grid(&mut self, level: &str, slot: u32) -> Result<bool> {
        let path = self.slot_path(level, slot)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)
            .with_context(|| format!("failed to delete level snapshot {}", path.display()))?;
        debug!(level, slot, "level snapshot deleted");
        Ok(true)
    }

    /// Loads a slot and rebuilds its grid against `registry`.
    pub fn load_level(
        &self,
        level: &str,
        slot: u32,
        registry: Arc<BlockRegistry>,
    ) -> Result<Option<GridSystem>> {
        let Some(data) = self.load_grid(level, slot)? else {
            return Ok(None);
        };
        let grid = GridSystem::from_grid_data(data, registry, false)
            .with_context(|| format!("level `{level}` slot {slot} contains an invalid grid"))?;
        Ok(Some(grid))
    }
}

impl LevelStore for FileLevelStore {
    type Error = anyhow::Error;

    fn load_grid(&self, level: &str, slot: u32) -> Result<Option<GridData>> {
        let path = self.slot_path(level, slot)?;
        if !path.is_file() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read level snapshot {}", path.display()))?;
        let grid = parse_snapshot(&contents)
            .with_context(|| format!("failed to decode level snapshot {}", path.display()))?;
        debug!(level, slot, blocks = grid.block_data.len(), "level snapshot loaded");
        Ok(Some(grid))
    }

    fn save_grid(
        &mut self,
        level: &str,
        slot: u32,
        grid: &mut GridSystem,
        trim: bool,
    ) -> Result<()> {
        let path = self.slot_path(level, slot)?;
        if trim {
            grid.trim_bounds();
        }
        let data = grid.to_grid_data();
        let json = serde_json::to_vec_pretty(&SnapshotRef {
            version: SUPPORTED_SNAPSHOT_VERSION,
            grid: &data,
        })
        .context("failed to serialize level snapshot")?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create level directory {}", dir.display()))?;
        }
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json)
            .with_context(|| format!("failed to write level snapshot {}", staging.display()))?;
        fs::rename(&staging, &path)
            .with_context(|| format!("failed to move level snapshot into {}", path.display()))?;
        debug!(level, slot, blocks = data.block_data.len(), trim, "level snapshot saved");
        Ok(())
    }
}

fn parse_snapshot(contents: &str) -> Result<GridData> {
    let snapshot: Snapshot =
        serde_json::from_str(contents).context("failed to parse level snapshot json")?;
    if snapshot.version != SUPPORTED_SNAPSHOT_VERSION {
        bail!(
            "unsupported level snapshot version {}; expected {}",
            snapshot.version,
            SUPPORTED_SNAPSHOT_VERSION
        );
    }
    Ok(snapshot.grid)
}

fn validate_level_name(level: &str) -> Result<()> {
    let valid = !level.is_empty()
        && level != "."
        && level != ".."
        && !level.contains(['/', '\\'])
        && !level.contains(':');
    if !valid {
        bail!("level name `{level}` cannot be used as a directory name");
    }
    Ok(())
}

/// Loads a block type registry from a TOML manifest on disk.
pub fn load_registry(path: impl AsRef<Path>) -> Result<BlockRegistry> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read block manifest at {}", path.display()))?;
    let registry = BlockRegistry::from_toml_str(&contents)
        .with_context(|| format!("invalid block manifest at {}", path.display()))?;
    debug!(types = registry.len(), path = %path.display(), "block registry loaded");
    Ok(registry)
}
