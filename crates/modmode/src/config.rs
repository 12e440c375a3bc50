//! Mod mode configuration, stored as TOML.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use bevy_ecs::resource::Resource;
use modmode_data::{LocalDb, ModeStorage};
use modmode_permission::Mode;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Resource, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ModModeConfig {
    /// Log every transition step at `info` instead of `debug`.
    pub debug: bool,
    /// Global flight switch. A group's `allow_flight` only applies while this is on.
    pub allow_flight: bool,
    /// Node names that are never stripped when entering a mode.
    pub persistent_nodes: Vec<String>,
    /// Players holding this capability keep their vanish state across logins and get it back
    /// when leaving a mode.
    pub persistent_vanish_capability: String,
    /// Prefix color of vanished players that are not in a mode.
    pub vanished_color: String,
    pub hooks: Hooks,
    pub groups: Groups,
    pub storage: StorageConfig,
}

impl Default for ModModeConfig {
    fn default() -> Self {
        Self {
            debug: false,
            allow_flight: true,
            persistent_nodes: Vec::new(),
            persistent_vanish_capability: "modmode.vanish.persistent".to_owned(),
            vanished_color: "gray".to_owned(),
            hooks: Hooks::default(),
            groups: Groups::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Host commands run around a transition, in order. `{player}` and `{uuid}` are substituted.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Hooks {
    pub before_activate: Vec<String>,
    pub after_activate: Vec<String>,
    pub before_deactivate: Vec<String>,
    pub after_deactivate: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Groups {
    #[serde(default = "GroupConfig::moderator")]
    pub moderator: GroupConfig,
    #[serde(default = "GroupConfig::admin")]
    pub admin: GroupConfig,
}

impl Default for Groups {
    fn default() -> Self {
        Self {
            moderator: GroupConfig::moderator(),
            admin: GroupConfig::admin(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GroupConfig {
    pub name: String,
    pub color: String,
    pub collidable: bool,
    pub allow_flight: bool,
    pub interact_with_items: bool,
    pub suppress_join_messages: bool,
    /// The node that marks a player as being in this mode.
    pub node: String,
    /// Capability required to enter the mode.
    pub permission: String,
    /// Capability to see players of this tier while they are hidden.
    pub see_hidden: String,
    /// Items handed out when the mode inventory is empty.
    #[serde(default)]
    pub kit: Vec<KitItem>,
}

impl GroupConfig {
    #[must_use]
    pub fn moderator() -> Self {
        Self {
            name: "ModMode".to_owned(),
            color: "green".to_owned(),
            collidable: false,
            allow_flight: true,
            interact_with_items: true,
            suppress_join_messages: true,
            node: "modmode.mode.moderator".to_owned(),
            permission: "modmode.toggle.moderator".to_owned(),
            see_hidden: "modmode.seehidden.moderator".to_owned(),
            kit: vec![KitItem {
                slot: 0,
                item: "minecraft:compass".to_owned(),
            }],
        }
    }

    #[must_use]
    pub fn admin() -> Self {
        Self {
            name: "AdminMode".to_owned(),
            color: "red".to_owned(),
            collidable: false,
            allow_flight: true,
            interact_with_items: false,
            suppress_join_messages: true,
            node: "modmode.mode.admin".to_owned(),
            permission: "modmode.toggle.admin".to_owned(),
            see_hidden: "modmode.seehidden.admin".to_owned(),
            kit: Vec::new(),
        }
    }
}

/// Where the heed backed mode store lives.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub directory: PathBuf,
    /// Upper bound of the store size in MiB.
    pub map_size_mib: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("run/modmode"),
            map_size_mib: 10,
        }
    }
}

impl StorageConfig {
    /// Opens the store, ready for [`BackendsBuilder::store`](crate::BackendsBuilder::store).
    pub fn open(&self) -> anyhow::Result<ModeStorage> {
        let map_size = self.map_size_mib.checked_mul(1024 * 1024).with_context(|| {
            format!("storage map size of {} MiB is too large", self.map_size_mib)
        })?;
        let db = LocalDb::open(&self.directory, map_size)?;
        ModeStorage::new(&db)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct KitItem {
    pub slot: u8,
    /// Opaque item descriptor understood by the host.
    pub item: String,
}

impl ModModeConfig {
    /// Loads the config at `path`, writing the default one there first if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!("writing default mod mode config to {}", path.display());
            let config = Self::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let contents = toml::to_string_pretty(&config)?;
            fs::write(path, contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    #[must_use]
    pub const fn group(&self, mode: Mode) -> &GroupConfig {
        match mode {
            Mode::Moderator => &self.groups.moderator,
            Mode::Admin => &self.groups.admin,
        }
    }

    /// Names of nodes that must survive a transition: the persistent nodes plus every
    /// mode-designation node.
    #[must_use]
    pub fn preserved_node_names(&self) -> BTreeSet<String> {
        self.persistent_nodes
            .iter()
            .cloned()
            .chain(Mode::ALL.iter().map(|&mode| self.group(mode).node.clone()))
            .collect()
    }
}
