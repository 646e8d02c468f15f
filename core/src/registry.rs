//! Immutable table classifying block names into layers, tags and categories.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use crate::{Category, Layer, LightColor, Tag, Tags};

const SUPPORTED_MANIFEST_VERSION: u32 = 1;

/// Static description of one block type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockType {
    /// Name blocks of this type carry in `BlockData::block_name`.
    pub name: String,
    /// Layer the type occupies.
    pub layer: Layer,
    /// Capabilities.
    pub tags: Tags,
    /// History category, if the type takes part in undo/reset.
    pub category: Option<Category>,
    /// Colour fed into light aggregation by buttons.
    pub color: Option<LightColor>,
    /// Force blocks reset their state to their facing index.
    pub force: bool,
}

/// Errors raised while building or querying a [`BlockRegistry`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A block name is missing from the registry. Indicates corrupt level data.
    #[error("block type `{0}` is not registered")]
    UnknownBlock(String),
    /// The same name was registered twice.
    #[error("block type `{0}` is registered more than once")]
    Duplicate(String),
    /// The manifest declares a version this build cannot read.
    #[error("unsupported block manifest version {found}; expected {expected}")]
    UnsupportedVersion {
        /// Version found in the manifest.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },
    /// The manifest is not valid TOML or does not match the schema.
    #[error("could not parse block manifest: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Read-only lookup from block name to [`BlockType`].
///
/// Built once at startup and shared by every grid; nothing mutates it
/// afterwards.
#[derive(Clone, Debug, Default)]
pub struct BlockRegistry {
    types: HashMap<String, BlockType>,
}

impl BlockRegistry {
    /// Builds a registry from explicit type descriptions.
    pub fn from_types(types: impl IntoIterator<Item = BlockType>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for block_type in types {
            if registry.types.contains_key(&block_type.name) {
                return Err(RegistryError::Duplicate(block_type.name));
            }
            let _ = registry
                .types
                .insert(block_type.name.clone(), block_type);
        }
        Ok(registry)
    }

    /// Parses a TOML manifest of `[[block]]` tables.
    pub fn from_toml_str(contents: &str) -> Result<Self, RegistryError> {
        let manifest: Manifest = toml::from_str(contents)?;
        if manifest.version != SUPPORTED_MANIFEST_VERSION {
            return Err(RegistryError::UnsupportedVersion {
                found: manifest.version,
                expected: SUPPORTED_MANIFEST_VERSION,
            });
        }
        Self::from_types(manifest.block.into_iter().map(ManifestEntry::into_type))
    }

    /// The block set the game ships with.
    #[must_use]
    pub fn builtin() -> Self {
        use Tag::*;

        let mut types = HashMap::new();
        let mut add = |name: &str,
                       layer: Layer,
                       tags: &[Tag],
                       category: Option<Category>,
                       color: Option<LightColor>| {
            let _ = types.insert(
                name.to_owned(),
                BlockType {
                    name: name.to_owned(),
                    layer,
                    tags: Tags::from_slice(tags),
                    category,
                    color,
                    force: false,
                },
            );
        };

        add("Player", Layer::Player, &[Player, Stop, Push], Some(Category::Player), None);
        add("Rock", Layer::Block, &[Stop, Push], Some(Category::Rock), None);
        add("RockFormation", Layer::Block, &[Stop, Push, Connect], Some(Category::Rock), None);
        add("Crystal", Layer::Block, &[Stop, Push, Connect], Some(Category::Crystal), None);
        add("FloatCrystal", Layer::Block, &[Stop, Push, Connect, Float], Some(Category::Crystal), None);
        add("SupportCrystal", Layer::SupportCrystal, &[Stop, Connect, Float], Some(Category::Crystal), None);
        add("Wall", Layer::Block, &[Stop, Tile, Float], None, None);
        add("PistonBase", Layer::Piston, &[Stop, Connect, Float], Some(Category::Piston), None);
        add("PistonArm", Layer::Piston, &[Connect, Float], Some(Category::Piston), None);
        add("Tunnel", Layer::Tunnel, &[Tile, Float], None, None);
        add("TunnelDoor", Layer::Tunnel, &[Stop, Float], Some(Category::Panel), None);
        add("Door", Layer::Block, &[Stop, Float], Some(Category::Panel), None);
        add("Gate", Layer::Block, &[Stop, Push], Some(Category::Gate), None);
        add("GateSlot", Layer::Misc, &[Float], Some(Category::GateSlot), None);
        add("Gem", Layer::Collect, &[Float], Some(Category::Collectable), None);
        add("PowerCell", Layer::CollectPower, &[Float], Some(Category::Collectable), None);
        add("ColorOrb", Layer::CollectColor, &[Float], Some(Category::Collectable), None);
        add("Dirt", Layer::Dig, &[Stop, Float, Tile], Some(Category::Dig), None);
        add("Vine", Layer::Fg, &[Float], Some(Category::Fg), None);
        add("Backdrop", Layer::Bg2, &[Float, Tile], None, None);
        for (name, color) in [
            ("ButtonRed", LightColor::Red),
            ("ButtonGreen", LightColor::Green),
            ("ButtonBlue", LightColor::Blue),
            ("ButtonYellow", LightColor::Yellow),
            ("ButtonPurple", LightColor::Purple),
            ("ButtonWhite", LightColor::White),
        ] {
            add(name, Layer::Misc, &[Float], Some(Category::Button), Some(color));
        }
        add("ForceBlock", Layer::Block, &[Stop, Push], Some(Category::Rock), None);
        if let Some(force) = types.get_mut("ForceBlock") {
            force.force = true;
        }

        Self { types }
    }

    /// Looks up a type by name.
    pub fn get(&self, name: &str) -> Result<&BlockType, RegistryError> {
        self.types
            .get(name)
            .ok_or_else(|| RegistryError::UnknownBlock(name.to_owned()))
    }

    /// Every registered type, in no particular order.
    pub fn types(&self) -> impl Iterator<Item = &BlockType> + '_ {
        self.types.values()
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    version: u32,
    #[serde(default)]
    block: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    name: String,
    layer: Layer,
    #[serde(default)]
    tags: Vec<Tag>,
    category: Option<Category>,
    color: Option<LightColor>,
    #[serde(default)]
    force: bool,
}

impl ManifestEntry {
    fn into_type(self) -> BlockType {
        BlockType {
            name: self.name,
            layer: self.layer,
            tags: Tags::from_slice(&self.tags),
            category: self.category,
            color: self.color,
            force: self.force,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
        version = 1

        [[block]]
        name = "Rock"
        layer = "Block"
        tags = ["Stop", "Push"]
        category = "Rock"

        [[block]]
        name = "ButtonRed"
        layer = "Misc"
        category = "Button"
        color = "Red"

        [[block]]
        name = "Spinner"
        layer = "Block"
        tags = ["Stop", "Push"]
        category = "Rock"
        force = true
    "#;

    #[test]
    fn manifest_parses_into_registry() {
        let registry = BlockRegistry::from_toml_str(MANIFEST).expect("manifest parses");
        assert_eq!(registry.len(), 3);

        let rock = registry.get("Rock").expect("rock registered");
        assert_eq!(rock.layer, Layer::Block);
        assert!(rock.tags.contains(Tag::Push));
        assert_eq!(rock.category, Some(Category::Rock));

        let button = registry.get("ButtonRed").expect("button registered");
        assert_eq!(button.color, Some(LightColor::Red));
        assert!(registry.get("Spinner").expect("spinner registered").force);
    }

    #[test]
    fn unknown_names_are_reported() {
        let registry = BlockRegistry::builtin();
        match registry.get("Unobtainium") {
            Err(RegistryError::UnknownBlock(name)) => assert_eq!(name, "Unobtainium"),
            other => panic!("expected unknown block error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let manifest = format!("{MANIFEST}\n[[block]]\nname = \"Rock\"\nlayer = \"Block\"\n");
        assert!(matches!(
            BlockRegistry::from_toml_str(&manifest),
            Err(RegistryError::Duplicate(name)) if name == "Rock"
        ));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let manifest = MANIFEST.replace("version = 1", "version = 2");
        assert!(matches!(
            BlockRegistry::from_toml_str(&manifest),
            Err(RegistryError::UnsupportedVersion { found: 2, expected: 1 })
        ));
    }

    #[test]
    fn builtin_registry_classifies_core_types() {
        let registry = BlockRegistry::builtin();
        assert!(!registry.is_empty());
        assert_eq!(registry.get("Player").expect("player").layer, Layer::Player);
        assert_eq!(registry.get("PistonArm").expect("arm").layer, Layer::Piston);
        assert_eq!(registry.get("TunnelDoor").expect("door").layer, Layer::Tunnel);
        assert!(registry.get("ForceBlock").expect("force").force);
        assert_eq!(
            registry.get("ButtonGreen").expect("button").color,
            Some(LightColor::Green)
        );
        assert!(registry.contains("Dirt"));
    }
}
