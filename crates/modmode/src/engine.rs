//! The mode transition engine.
//!
//! Every entry point runs a fixed, ordered pipeline of steps. Steps that talk to the host are
//! best effort: failures are logged (and reported to the player where it matters) and the rest of
//! the pipeline still runs.

use anyhow::Context;
use itertools::Itertools;
use modmode_permission::{Mode, Node, PermissionSnapshotStore, Propagation};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    backend::{Backends, Slot, SlotLoad},
    config::{GroupConfig, ModModeConfig},
    record::PlayerModeRecord,
    session::SessionState,
    visibility::VisibilityCoordinator,
};

/// Result of a request that may or may not change state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied {
        /// The permission change is still waiting for confirmation.
        pending: bool,
    },
    /// Nothing changed; the player was told why.
    Unchanged,
}

impl TransitionOutcome {
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The join message to broadcast, `None` if it was suppressed.
    pub join_message: Option<String>,
    /// A deferred transition was completed during this join.
    pub recovered: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct QuitOutcome {
    pub suppress_quit_message: bool,
}

pub struct ModeTransitionEngine<'a> {
    session: &'a mut SessionState,
    backends: &'a mut Backends,
    config: &'a ModModeConfig,
}

impl<'a> ModeTransitionEngine<'a> {
    pub fn new(
        session: &'a mut SessionState,
        backends: &'a mut Backends,
        config: &'a ModModeConfig,
    ) -> Self {
        Self {
            session,
            backends,
            config,
        }
    }

    fn coordinator(&mut self) -> VisibilityCoordinator<'_> {
        VisibilityCoordinator::new(
            &mut *self.session,
            self.config,
            &*self.backends.permissions,
            &mut *self.backends.visibility,
            &mut *self.backends.presentation,
        )
    }

    fn trace_step(&self, player: Uuid, step: &str) {
        if self.config.debug {
            info!(%player, "mod mode: {step}");
        } else {
            debug!(%player, "mod mode: {step}");
        }
    }

    fn name_of(&self, player: Uuid) -> String {
        self.backends
            .host
            .display_name(player)
            .unwrap_or_else(|| player.to_string())
    }

    fn tell(&mut self, player: Uuid, message: &str) {
        self.backends.host.send_message(player, message);
    }

    fn has_persistent_vanish(&self, player: Uuid) -> bool {
        self.backends
            .permissions
            .has_capability(player, &self.config.persistent_vanish_capability)
    }

    fn run_hooks(&mut self, hooks: &[String], player: Uuid) {
        let name = self.name_of(player);
        for hook in hooks {
            let command = hook
                .replace("{player}", &name)
                .replace("{uuid}", &player.to_string());
            if let Err(e) = self.backends.host.dispatch_command(&command) {
                warn!("hook command {command:?} failed for {player}: {e:#}");
            }
        }
    }

    fn refresh_all(&mut self, player: Uuid) {
        let online = self.backends.host.online_players();
        let mut coordinator = self.coordinator();
        coordinator.assign_presentation_group(player);
        coordinator.refresh_all(&online);
    }

    fn swap_slots(&mut self, player: Uuid, from: Slot, to: Slot) -> anyhow::Result<SlotLoad> {
        self.backends
            .states
            .save_snapshot(player, from)
            .with_context(|| format!("failed to save the {from:?} slot"))?;
        self.backends
            .states
            .load_snapshot(player, to)
            .with_context(|| format!("failed to load the {to:?} slot"))
    }

    fn give_kit(&mut self, player: Uuid, group: &GroupConfig) {
        for kit_item in &group.kit {
            if let Err(e) = self
                .backends
                .host
                .give_item(player, kit_item.slot, &kit_item.item)
            {
                warn!("failed to give kit item {} to {player}: {e:#}", kit_item.item);
            }
        }
    }

    fn set_flight(&mut self, player: Uuid, mode: Option<Mode>) {
        let allow = mode.is_some_and(|mode| {
            self.config.allow_flight && self.session.groups().get(mode).allow_flight
        });
        self.backends.host.set_allow_flight(player, allow);
    }

    /// Writes the persisted caches. Failures are logged; the in-memory state stays authoritative.
    pub fn persist(&mut self) -> bool {
        match self.backends.store.save(&self.session.to_caches()) {
            Ok(()) => true,
            Err(e) => {
                error!("failed to persist mod mode state: {e:#}");
                false
            }
        }
    }

    /// Moves `player` into `mode`.
    pub fn enter(&mut self, player: Uuid, mode: Mode) -> TransitionOutcome {
        let config = self.config;
        let group = config.group(mode);

        if let Some(current) = self.session.active_mode(player) {
            let current_name = &config.group(current).name;
            let message = if current == mode {
                format!("§cYou are already in {current_name}.")
            } else {
                format!("§cYou are in {current_name}; leave it before entering {}.", group.name)
            };
            self.tell(player, &message);
            return TransitionOutcome::Unchanged;
        }

        if !self
            .backends
            .permissions
            .has_capability(player, &group.permission)
        {
            self.tell(player, &format!("§cYou may not enter {}.", group.name));
            return TransitionOutcome::Unchanged;
        }

        self.trace_step(player, "running pre-activation hooks");
        self.run_hooks(&config.hooks.before_activate, player);

        // Asked before the strip, which may remove the node granting it.
        let was_vanished = self.backends.visibility.is_vanished(player);
        let persistent_vanish = self.has_persistent_vanish(player);

        self.trace_step(player, "swapping permissions");
        let mut store = PermissionSnapshotStore::new(&mut *self.backends.permissions);
        let snapshot = store.capture(player, &config.preserved_node_names());
        let mut propagation = store.strip(player, &snapshot);
        match self
            .backends
            .permissions
            .add_node(player, &Node::global(&group.node))
        {
            Ok(outcome) => propagation = propagation.and(outcome),
            Err(e) => error!("failed to apply {} to {player}: {e}", group.node),
        }

        self.trace_step(player, "updating mode and vanish state");
        self.session.apply_state(player, Some(mode), true);
        let record = self.session.record_mut(player);
        record.permission_snapshot = snapshot;
        record.persistent_vanish_at_entry = persistent_vanish;
        record.logged_out_vanished = persistent_vanish && was_vanished;
        if propagation.is_deferred() {
            record.mark_pending();
        }
        self.backends.visibility.set_vanished(player, true);

        self.trace_step(player, "refreshing visibility");
        self.refresh_all(player);

        self.trace_step(player, "swapping player state");
        match self.swap_slots(player, Slot::Normal, Slot::Mode) {
            Ok(SlotLoad::Empty) => self.give_kit(player, group),
            Ok(SlotLoad::Restored) => {}
            Err(e) => {
                error!("state swap of {player} into {} failed: {e:#}", group.name);
                self.tell(
                    player,
                    &format!("§cYour inventory could not be swapped: {e:#}"),
                );
            }
        }

        self.backends.host.reset_fall_distance(player);
        self.set_flight(player, Some(mode));

        self.trace_step(player, "running post-activation hooks");
        self.run_hooks(&config.hooks.after_activate, player);

        self.persist();

        info!("{} entered {}", self.name_of(player), group.name);
        self.tell(player, &format!("§aYou are now in {}.", group.name));

        TransitionOutcome::Applied {
            pending: propagation.is_deferred(),
        }
    }

    /// Moves `player` out of whatever mode it is in.
    pub fn exit(&mut self, player: Uuid) -> TransitionOutcome {
        let config = self.config;

        let Some(mode) = self.session.active_mode(player) else {
            self.tell(player, "§cYou are not in a mode.");
            return TransitionOutcome::Unchanged;
        };
        let group = config.group(mode);

        self.trace_step(player, "running pre-deactivation hooks");
        self.run_hooks(&config.hooks.before_deactivate, player);

        self.trace_step(player, "restoring permissions");
        let mut propagation = match self
            .backends
            .permissions
            .remove_node(player, &Node::global(&group.node))
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("failed to remove {} from {player}: {e}", group.node);
                Propagation::Applied
            }
        };
        let record = self.session.record_mut(player);
        let snapshot = std::mem::take(&mut record.permission_snapshot);
        record.item_interact = false;
        let report = PermissionSnapshotStore::new(&mut *self.backends.permissions)
            .restore(player, &snapshot);
        propagation = propagation.and(report.propagation);
        if !report.skipped.is_empty() {
            let skipped = report.skipped.iter().map(|(node, _)| node).join(", ");
            self.tell(
                player,
                &format!("§eSome permissions could not be restored: {skipped}"),
            );
        }

        self.trace_step(player, "updating mode and vanish state");
        let record = self.session.record_mut(player);
        let vanished = record.persistent_vanish_at_entry && record.logged_out_vanished;
        record.logged_out_vanished = vanished;
        record.persistent_vanish_at_entry = false;
        self.session.apply_state(player, None, vanished);
        if propagation.is_deferred() {
            self.session.record_mut(player).mark_pending();
        }
        self.backends.visibility.set_vanished(player, vanished);

        self.trace_step(player, "refreshing visibility");
        self.refresh_all(player);

        self.trace_step(player, "swapping player state");
        if let Err(e) = self.swap_slots(player, Slot::Mode, Slot::Normal) {
            error!("state swap of {player} out of {} failed: {e:#}", group.name);
            self.tell(
                player,
                &format!("§cYour inventory could not be swapped back: {e:#}"),
            );
        }

        self.backends.host.reset_fall_distance(player);
        self.set_flight(player, None);

        if !vanished
            && let Some(message) = self.session.record_mut(player).suppressed_join_message.take()
        {
            self.backends.host.broadcast(&message);
        }

        self.trace_step(player, "running post-deactivation hooks");
        self.run_hooks(&config.hooks.after_deactivate, player);

        self.persist();

        info!("{} left {}", self.name_of(player), group.name);
        self.tell(player, &format!("§aYou are no longer in {}.", group.name));

        TransitionOutcome::Applied {
            pending: propagation.is_deferred(),
        }
    }

    /// Completes the permission half of a transition that was never confirmed: the player ends
    /// up holding exactly the mode node of its active mode.
    fn recover_pending(&mut self, player: Uuid) {
        let config = self.config;
        let mode = self.session.active_mode(player);
        let held = self.backends.permissions.list_nodes(player);

        for candidate in Mode::ALL {
            let node = Node::global(&config.group(candidate).node);
            let result = if mode == Some(candidate) {
                self.backends.permissions.add_node(player, &node)
            } else if held.contains(&node) {
                self.backends.permissions.remove_node(player, &node)
            } else {
                continue;
            };
            match result {
                Ok(Propagation::Deferred) => {
                    debug!("re-applied {node} to {player}, confirmation deferred again");
                }
                Ok(Propagation::Applied) => {}
                Err(e) => warn!("failed to reconcile {node} for {player}: {e}"),
            }
        }

        self.session.record_mut(player).settle();
        info!("completed deferred mode transition of {player}");
    }

    /// The join pipeline. `join_message` is the broadcast the host would normally send.
    pub fn on_join(&mut self, player: Uuid, join_message: Option<String>) -> JoinOutcome {
        let config = self.config;
        self.trace_step(player, "processing join");

        let recovered = self
            .session
            .record(player)
            .is_some_and(PlayerModeRecord::pending_transition);
        if recovered {
            self.recover_pending(player);
        }

        let mode = self.session.active_mode(player);
        let persistent_vanish = self.has_persistent_vanish(player);
        let record = self.session.record_mut(player);
        let vanished = match mode {
            Some(_) => true,
            None => persistent_vanish && record.logged_out_vanished,
        };
        if mode.is_none() && !persistent_vanish {
            record.logged_out_vanished = false;
        }
        self.session.apply_state(player, mode, vanished);
        self.backends.visibility.set_vanished(player, vanished);

        let suppress = vanished
            && mode.is_none_or(|mode| self.session.groups().get(mode).suppress_join_messages);
        let join_message = if suppress {
            self.session.record_mut(player).suppressed_join_message = join_message;
            None
        } else {
            join_message
        };

        let online = self.backends.host.online_players();
        let mut coordinator = self.coordinator();
        coordinator.assign_presentation_group(player);
        coordinator.refresh_player(player, &online);

        if let Some(mode) = mode {
            self.set_flight(player, Some(mode));
            let name = &config.group(mode).name;
            self.tell(player, &format!("§eYou are still in {name}."));
        } else if vanished {
            self.tell(player, "§eYou joined vanished.");
        }

        self.persist();

        JoinOutcome {
            join_message,
            recovered,
        }
    }

    /// The quit pipeline.
    pub fn on_quit(&mut self, player: Uuid) -> QuitOutcome {
        self.trace_step(player, "processing quit");

        let vanished = self.backends.visibility.is_vanished(player);
        let persistent_vanish = self.has_persistent_vanish(player);
        let record = self.session.record_mut(player);

        if record.active_mode().is_none() {
            record.logged_out_vanished = persistent_vanish && vanished;
        }
        record.suppressed_join_message = None;

        if record.pending_transition() {
            warn!(
                "{player} disconnected before their permission change was confirmed; it will be \
                 completed on their next join"
            );
        }

        let hidden = vanished || record.active_mode().is_some();
        self.session.presentation_mut().remove(player);

        self.persist();

        QuitOutcome {
            suppress_quit_message: hidden,
        }
    }

    /// Records the vanish state every online player outside a mode should get back on the next
    /// join, then persists.
    pub fn on_shutdown(&mut self) -> bool {
        for player in self.backends.host.online_players() {
            if self.session.active_mode(player).is_some() {
                continue;
            }
            let vanished = self.backends.visibility.is_vanished(player);
            let persistent_vanish = self.has_persistent_vanish(player);
            self.session.record_mut(player).logged_out_vanished = persistent_vanish && vanished;
        }
        self.persist()
    }

    /// Handles a confirmation from the asynchronous permission worker.
    pub fn on_permission_confirmed(&mut self, player: Uuid) {
        if !self
            .session
            .record(player)
            .is_some_and(PlayerModeRecord::pending_transition)
        {
            return;
        }

        if !self.backends.host.is_online(player) {
            debug!("confirmation for offline player {player}; completing on their next join");
            return;
        }

        self.session.record_mut(player).settle();
        self.refresh_all(player);
        self.persist();
    }

    /// Processes every confirmation received since the last call.
    pub fn drain_confirmations(&mut self) {
        for confirmation in self.backends.confirmations.drain() {
            self.on_permission_confirmed(confirmation.player);
        }
    }

    /// Explicit vanish toggle for players allowed to vanish.
    pub fn set_vanished(&mut self, player: Uuid, vanished: bool) -> TransitionOutcome {
        let config = self.config;
        let mode = self.session.active_mode(player);

        if let Some(mode) = mode {
            if !vanished {
                let name = &config.group(mode).name;
                self.tell(player, &format!("§cYou cannot become visible while in {name}."));
                return TransitionOutcome::Unchanged;
            }
        } else if !self.has_persistent_vanish(player) {
            self.tell(player, "§cYou may not vanish outside of a mode.");
            return TransitionOutcome::Unchanged;
        }

        if self.backends.visibility.is_vanished(player) == vanished {
            let state = if vanished { "vanished" } else { "visible" };
            self.tell(player, &format!("§eYou are already {state}."));
            return TransitionOutcome::Unchanged;
        }

        self.session.apply_state(player, mode, vanished);
        self.backends.visibility.set_vanished(player, vanished);
        if mode.is_none() {
            let record = self.session.record_mut(player);
            record.logged_out_vanished = vanished;
            if !vanished && let Some(message) = record.suppressed_join_message.take() {
                self.backends.host.broadcast(&message);
            }
        }

        let online = self.backends.host.online_players();
        let mut coordinator = self.coordinator();
        coordinator.assign_presentation_group(player);
        coordinator.refresh_player(player, &online);

        self.persist();

        let message = if vanished {
            "§aYou are now vanished."
        } else {
            "§aYou are now visible."
        };
        self.tell(player, message);

        TransitionOutcome::Applied { pending: false }
    }

    /// Recomputes visibility after the privileges of `player` changed.
    pub fn on_permissions_reloaded(&mut self, player: Uuid) {
        let online = self.backends.host.online_players();
        let mut coordinator = self.coordinator();
        coordinator.assign_presentation_group(player);
        coordinator.refresh_player(player, &online);
    }

    /// Whether `player` may pick up or drop items right now.
    #[must_use]
    pub fn can_interact_with_items(&self, player: Uuid) -> bool {
        match self.session.groups().group_of(player) {
            None => true,
            Some(group) => {
                group.interact_with_items
                    && self
                        .session
                        .record(player)
                        .is_some_and(|record| record.item_interact)
            }
        }
    }

    /// Sets (or with `None` flips) the item interaction bypass of `player` within `mode`.
    pub fn set_item_interact(
        &mut self,
        player: Uuid,
        mode: Mode,
        desired: Option<bool>,
    ) -> TransitionOutcome {
        let group = self.session.groups().get(mode);
        let name = group.name.clone();

        if !group.contains(player) {
            self.tell(player, &format!("§cYou must be in {name} to change item interaction."));
            return TransitionOutcome::Unchanged;
        }
        if !group.interact_with_items {
            self.tell(player, &format!("§c{name} does not allow item interaction."));
            return TransitionOutcome::Unchanged;
        }

        let record = self.session.record_mut(player);
        let enabled = desired.unwrap_or(!record.item_interact);
        if record.item_interact == enabled {
            let state = if enabled { "enabled" } else { "disabled" };
            self.tell(player, &format!("§eItem interaction is already {state}."));
            return TransitionOutcome::Unchanged;
        }
        record.item_interact = enabled;

        self.persist();

        let state = if enabled { "enabled" } else { "disabled" };
        self.tell(player, &format!("§aItem interaction {state}."));
        TransitionOutcome::Applied { pending: false }
    }

    /// The message listing every online vanished player, sorted by name.
    #[must_use]
    pub fn vanished_list(&self) -> String {
        let names = self
            .backends
            .host
            .online_players()
            .into_iter()
            .filter(|&player| self.backends.visibility.is_vanished(player))
            .map(|player| self.name_of(player))
            .sorted_unstable()
            .collect::<Vec<_>>();

        if names.is_empty() {
            "§aAll players are visible.".to_owned()
        } else {
            format!("§eVanished: {}", names.join(", "))
        }
    }
}
