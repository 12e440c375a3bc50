//! The owned state of a running mod mode subsystem.

use bevy_ecs::resource::Resource;
use modmode_data::ModeCaches;
use modmode_permission::{Mode, PermissionSnapshot};
use rustc_hash::FxHashMap;
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::ModModeConfig,
    group::{GroupRegistry, PresentationGroups},
    record::PlayerModeRecord,
};

/// Player records and group memberships. Only mutated from the primary context.
#[derive(Resource, Debug, Clone)]
pub struct SessionState {
    records: FxHashMap<Uuid, PlayerModeRecord>,
    groups: GroupRegistry,
    presentation: PresentationGroups,
}

impl SessionState {
    #[must_use]
    pub fn new(config: &ModModeConfig) -> Self {
        Self {
            records: FxHashMap::default(),
            groups: GroupRegistry::new(config),
            presentation: PresentationGroups::default(),
        }
    }

    /// Rebuilds the session from what was persisted by [`Self::to_caches`].
    #[must_use]
    pub fn from_caches(config: &ModModeConfig, caches: ModeCaches) -> Self {
        let mut session = Self::new(config);

        for (uuid, code) in caches.modes {
            match Mode::from_code(code) {
                Some(mode) => {
                    let vanished = caches.vanished.contains(&uuid);
                    session.apply_state(uuid, Some(mode), vanished);
                }
                None => warn!("dropping unknown mode code {code} persisted for {uuid}"),
            }
        }

        for uuid in caches.vanished {
            let mode = session.active_mode(uuid);
            session.apply_state(uuid, mode, true);
        }
        for uuid in caches.logged_out_vanished {
            session.record_mut(uuid).logged_out_vanished = true;
        }
        for uuid in caches.persistent_vanish_at_entry {
            session.record_mut(uuid).persistent_vanish_at_entry = true;
        }
        for uuid in caches.item_interact {
            session.record_mut(uuid).item_interact = true;
        }
        for (uuid, nodes) in caches.snapshots {
            session.record_mut(uuid).permission_snapshot = PermissionSnapshot::from(nodes);
        }
        for uuid in caches.pending {
            session.record_mut(uuid).mark_pending();
        }

        session
    }

    #[must_use]
    pub fn to_caches(&self) -> ModeCaches {
        let mut caches = ModeCaches::default();
        for (&uuid, record) in &self.records {
            if let Some(mode) = record.active_mode() {
                caches.modes.insert(uuid, mode.code());
            }
            if record.is_vanished() {
                caches.vanished.insert(uuid);
            }
            if record.logged_out_vanished {
                caches.logged_out_vanished.insert(uuid);
            }
            if record.persistent_vanish_at_entry {
                caches.persistent_vanish_at_entry.insert(uuid);
            }
            if record.pending_transition() {
                caches.pending.insert(uuid);
            }
            if record.item_interact {
                caches.item_interact.insert(uuid);
            }
            if !record.permission_snapshot.is_empty() {
                caches
                    .snapshots
                    .insert(uuid, record.permission_snapshot.to_stored());
            }
        }
        caches
    }

    #[must_use]
    pub fn record(&self, player: Uuid) -> Option<&PlayerModeRecord> {
        self.records.get(&player)
    }

    /// The record of `player`, created on first reference.
    pub fn record_mut(&mut self, player: Uuid) -> &mut PlayerModeRecord {
        self.records.entry(player).or_default()
    }

    #[must_use]
    pub fn active_mode(&self, player: Uuid) -> Option<Mode> {
        self.record(player)
            .and_then(PlayerModeRecord::active_mode)
    }

    #[must_use]
    pub fn is_vanished(&self, player: Uuid) -> bool {
        self.record(player)
            .is_some_and(PlayerModeRecord::is_vanished)
    }

    #[must_use]
    pub const fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    #[must_use]
    pub const fn presentation(&self) -> &PresentationGroups {
        &self.presentation
    }

    pub(crate) const fn presentation_mut(&mut self) -> &mut PresentationGroups {
        &mut self.presentation
    }

    /// Updates mode, vanish flag and group membership of `player` as one step.
    pub(crate) fn apply_state(&mut self, player: Uuid, mode: Option<Mode>, vanished: bool) {
        self.record_mut(player).set_state(mode, vanished);
        self.groups.assign(player, mode);
    }

    pub(crate) fn reload_groups(&mut self, config: &ModModeConfig) {
        self.groups.reload(config);
    }

    pub fn records(&self) -> impl Iterator<Item = (Uuid, &PlayerModeRecord)> {
        self.records.iter().map(|(&uuid, record)| (uuid, record))
    }
}
