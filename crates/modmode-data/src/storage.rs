//! Heed backed [`ModeStore`].

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Context;
use heed::{
    Database, Env,
    types::{Str, U8, Unit},
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{LocalDb, ModeCaches, ModeStore, StoredNode};

type UuidSet = Database<Str, Unit>;

/// How many named databases [`ModeStorage`] keeps in its environment.
pub(crate) const NAMED_DATABASES: u32 = 7;

/// Persists [`ModeCaches`] in a handful of named databases inside a [`LocalDb`].
///
/// Identities are stored as their hyphenated string form. Entries that fail to parse on load are
/// dropped with a warning instead of failing the whole load.
#[derive(Debug, Clone)]
pub struct ModeStorage {
    env: Env,
    modes: Database<Str, U8>,
    vanished: UuidSet,
    logged_out_vanished: UuidSet,
    persistent_vanish_at_entry: UuidSet,
    pending: UuidSet,
    item_interact: UuidSet,
    snapshots: Database<Str, Str>,
}

impl ModeStorage {
    /// Creates a new [`ModeStorage`] from a given [`LocalDb`].
    pub fn new(db: &LocalDb) -> anyhow::Result<Self> {
        let env = &db.env;
        let mut wtxn = env.write_txn()?;
        let modes = env.create_database(&mut wtxn, Some("mode-players"))?;
        let vanished = env.create_database(&mut wtxn, Some("vanished-players"))?;
        let logged_out_vanished = env.create_database(&mut wtxn, Some("logged-out-vanished"))?;
        let persistent_vanish_at_entry =
            env.create_database(&mut wtxn, Some("entry-persistent-vanish"))?;
        let pending = env.create_database(&mut wtxn, Some("pending-transitions"))?;
        let item_interact = env.create_database(&mut wtxn, Some("item-interact"))?;
        let snapshots = env.create_database(&mut wtxn, Some("permission-snapshots"))?;
        wtxn.commit()?;

        Ok(Self {
            env: env.clone(),
            modes,
            vanished,
            logged_out_vanished,
            persistent_vanish_at_entry,
            pending,
            item_interact,
            snapshots,
        })
    }
}

fn parse_identity(key: &str, table: &str) -> Option<Uuid> {
    match Uuid::parse_str(key) {
        Ok(uuid) => Some(uuid),
        Err(e) => {
            warn!("dropping malformed identity {key:?} from {table}: {e}");
            None
        }
    }
}

fn collect_set<'t>(
    entries: impl Iterator<Item = heed::Result<(&'t str, ())>>,
    table: &str,
) -> anyhow::Result<BTreeSet<Uuid>> {
    let mut set = BTreeSet::new();
    for entry in entries {
        let (key, ()) = entry?;
        if let Some(uuid) = parse_identity(key, table) {
            set.insert(uuid);
        }
    }
    Ok(set)
}

impl ModeStore for ModeStorage {
    fn load(&self) -> anyhow::Result<ModeCaches> {
        let rtxn = self.env.read_txn()?;

        let mut modes = BTreeMap::new();
        for entry in self.modes.iter(&rtxn)? {
            let (key, code) = entry?;
            if let Some(uuid) = parse_identity(key, "mode-players") {
                modes.insert(uuid, code);
            }
        }

        let mut snapshots = BTreeMap::new();
        for entry in self.snapshots.iter(&rtxn)? {
            let (key, json) = entry?;
            let Some(uuid) = parse_identity(key, "permission-snapshots") else {
                continue;
            };
            match serde_json::from_str::<Vec<StoredNode>>(json) {
                Ok(nodes) => {
                    snapshots.insert(uuid, nodes);
                }
                Err(e) => warn!("dropping unreadable permission snapshot of {uuid}: {e}"),
            }
        }

        let caches = ModeCaches {
            modes,
            vanished: collect_set(self.vanished.iter(&rtxn)?, "vanished-players")?,
            logged_out_vanished: collect_set(
                self.logged_out_vanished.iter(&rtxn)?,
                "logged-out-vanished",
            )?,
            persistent_vanish_at_entry: collect_set(
                self.persistent_vanish_at_entry.iter(&rtxn)?,
                "entry-persistent-vanish",
            )?,
            pending: collect_set(self.pending.iter(&rtxn)?, "pending-transitions")?,
            item_interact: collect_set(self.item_interact.iter(&rtxn)?, "item-interact")?,
            snapshots,
        };

        info!(
            "loaded mod mode caches: {} in a mode, {} vanished",
            caches.modes.len(),
            caches.vanished.len()
        );

        Ok(caches)
    }

    fn save(&self, caches: &ModeCaches) -> anyhow::Result<()> {
        let mut wtxn = self.env.write_txn()?;

        self.modes.clear(&mut wtxn)?;
        for (uuid, code) in &caches.modes {
            self.modes.put(&mut wtxn, uuid.to_string().as_str(), code)?;
        }

        for (db, set) in [
            (self.vanished, &caches.vanished),
            (self.logged_out_vanished, &caches.logged_out_vanished),
            (
                self.persistent_vanish_at_entry,
                &caches.persistent_vanish_at_entry,
            ),
            (self.pending, &caches.pending),
            (self.item_interact, &caches.item_interact),
        ] {
            db.clear(&mut wtxn)?;
            for uuid in set {
                db.put(&mut wtxn, uuid.to_string().as_str(), &())?;
            }
        }

        self.snapshots.clear(&mut wtxn)?;
        for (uuid, nodes) in &caches.snapshots {
            let json = serde_json::to_string(nodes)
                .with_context(|| format!("failed to encode permission snapshot of {uuid}"))?;
            self.snapshots
                .put(&mut wtxn, uuid.to_string().as_str(), json.as_str())?;
        }

        wtxn.commit()?;
        Ok(())
    }
}
