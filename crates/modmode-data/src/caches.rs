use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything the mod mode subsystem keeps across restarts, keyed by player identity.
///
/// Modes are stored as their numeric code so this crate does not need to know which modes exist.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModeCaches {
    pub modes: BTreeMap<Uuid, u8>,
    pub vanished: BTreeSet<Uuid>,
    pub logged_out_vanished: BTreeSet<Uuid>,
    /// Players who held the persistent vanish capability when they entered their current mode.
    pub persistent_vanish_at_entry: BTreeSet<Uuid>,
    pub pending: BTreeSet<Uuid>,
    pub item_interact: BTreeSet<Uuid>,
    pub snapshots: BTreeMap<Uuid, Vec<StoredNode>>,
}

/// A permission node as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Durable home of [`ModeCaches`]. Saves are wholesale; the last writer wins.
pub trait ModeStore {
    fn load(&self) -> anyhow::Result<ModeCaches>;
    fn save(&self, caches: &ModeCaches) -> anyhow::Result<()>;
}

/// A [`ModeStore`] that only lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    caches: Mutex<ModeCaches>,
}

impl ModeStore for MemoryStore {
    fn load(&self) -> anyhow::Result<ModeCaches> {
        Ok(self.caches.lock().clone())
    }

    fn save(&self, caches: &ModeCaches) -> anyhow::Result<()> {
        *self.caches.lock() = caches.clone();
        Ok(())
    }
}
