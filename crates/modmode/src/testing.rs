//! In-memory host used by the tests. Every clone of a [`FakeHost`] shares one [`FakeWorld`].

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Once},
};

use anyhow::bail;
use modmode_data::{ModeCaches, ModeStore};
use modmode_permission::{Node, PermissionBackend, PermissionError, Propagation, Scope};
use parking_lot::{Mutex, MutexGuard};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::backend::{
    Backends, Host, PresentationBackend, Slot, SlotLoad, StateStore, VisibilityBackend,
};

/// Sends logs to the test output. `RUST_LOG=debug` shows every transition step.
pub fn init_tracing() {
    static TRACING: Once = Once::new();
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

#[derive(Debug, Default)]
pub struct FakeWorld {
    pub online: Vec<Uuid>,
    pub names: BTreeMap<Uuid, String>,
    pub nodes: BTreeMap<Uuid, BTreeSet<Node>>,
    pub capabilities: BTreeMap<Uuid, BTreeSet<String>>,
    pub partitions: BTreeSet<String>,
    pub defer_permissions: bool,
    pub vanished: BTreeSet<Uuid>,
    /// (observer, subject) pairs currently hidden.
    pub hidden: BTreeSet<(Uuid, Uuid)>,
    pub refreshed: Vec<Uuid>,
    pub messages: Vec<(Uuid, String)>,
    pub broadcasts: Vec<String>,
    pub commands: Vec<String>,
    pub failing_commands: BTreeSet<String>,
    pub prefixes: BTreeMap<Uuid, Option<String>>,
    pub collision: BTreeMap<Uuid, bool>,
    pub flight: BTreeMap<Uuid, bool>,
    pub fall_resets: Vec<Uuid>,
    pub filled_slots: BTreeSet<(Uuid, Slot)>,
    pub slot_log: Vec<(Uuid, Slot, &'static str)>,
    pub broken_state_store: bool,
    pub items: Vec<(Uuid, u8, String)>,
    pub persisted: ModeCaches,
    pub saves: usize,
}

impl FakeWorld {
    pub fn grant(&mut self, player: Uuid, capability: &str) {
        self.capabilities
            .entry(player)
            .or_default()
            .insert(capability.to_owned());
    }

    pub fn nodes_of(&self, player: Uuid) -> BTreeSet<Node> {
        self.nodes.get(&player).cloned().unwrap_or_default()
    }

    pub fn messages_to(&self, player: Uuid) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|(recipient, _)| *recipient == player)
            .map(|(_, message)| message.as_str())
            .collect()
    }

    fn outcome(&self) -> Propagation {
        if self.defer_permissions {
            Propagation::Deferred
        } else {
            Propagation::Applied
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FakeHost(Arc<Mutex<FakeWorld>>);

impl FakeHost {
    pub fn world(&self) -> MutexGuard<'_, FakeWorld> {
        self.0.lock()
    }

    /// Adds a new online player called `name`.
    pub fn join(&self, name: &str) -> Uuid {
        let player = Uuid::new_v4();
        self.rejoin(player, name);
        player
    }

    pub fn rejoin(&self, player: Uuid, name: &str) {
        let mut world = self.world();
        world.online.push(player);
        world.names.insert(player, name.to_owned());
    }

    pub fn leave(&self, player: Uuid) {
        self.world().online.retain(|&online| online != player);
    }

    pub fn backends(&self) -> Backends {
        Backends::builder(self.clone())
            .permissions(self.clone())
            .visibility(self.clone())
            .presentation(self.clone())
            .states(self.clone())
            .store(self.clone())
            .build()
            .unwrap()
    }
}

impl Host for FakeHost {
    fn online_players(&self) -> Vec<Uuid> {
        self.world().online.clone()
    }

    fn display_name(&self, player: Uuid) -> Option<String> {
        self.world().names.get(&player).cloned()
    }

    fn send_message(&mut self, player: Uuid, message: &str) {
        self.world().messages.push((player, message.to_owned()));
    }

    fn broadcast(&mut self, message: &str) {
        self.world().broadcasts.push(message.to_owned());
    }

    fn dispatch_command(&mut self, command: &str) -> anyhow::Result<()> {
        let mut world = self.world();
        world.commands.push(command.to_owned());
        if world.failing_commands.contains(command) {
            bail!("unknown command");
        }
        Ok(())
    }

    fn reset_fall_distance(&mut self, player: Uuid) {
        self.world().fall_resets.push(player);
    }

    fn set_allow_flight(&mut self, player: Uuid, allow: bool) {
        self.world().flight.insert(player, allow);
    }

    fn give_item(&mut self, player: Uuid, slot: u8, item: &str) -> anyhow::Result<()> {
        self.world().items.push((player, slot, item.to_owned()));
        Ok(())
    }
}

impl PermissionBackend for FakeHost {
    fn list_nodes(&self, player: Uuid) -> BTreeSet<Node> {
        self.world().nodes_of(player)
    }

    fn add_node(&mut self, player: Uuid, node: &Node) -> Result<Propagation, PermissionError> {
        let mut world = self.world();
        if let Scope::Partition(partition) = &node.scope {
            if !world.partitions.contains(partition) {
                return Err(PermissionError::UnknownScope(partition.clone()));
            }
        }
        world.nodes.entry(player).or_default().insert(node.clone());
        Ok(world.outcome())
    }

    fn remove_node(&mut self, player: Uuid, node: &Node) -> Result<Propagation, PermissionError> {
        let mut world = self.world();
        world.nodes.entry(player).or_default().remove(node);
        Ok(world.outcome())
    }

    fn has_capability(&self, player: Uuid, capability: &str) -> bool {
        let world = self.world();
        world
            .capabilities
            .get(&player)
            .is_some_and(|capabilities| capabilities.contains(capability))
            || world
                .nodes_of(player)
                .iter()
                .any(|node| node.name == capability)
    }
}

impl VisibilityBackend for FakeHost {
    fn is_vanished(&self, player: Uuid) -> bool {
        self.world().vanished.contains(&player)
    }

    fn set_vanished(&mut self, player: Uuid, vanished: bool) {
        let mut world = self.world();
        if vanished {
            world.vanished.insert(player);
        } else {
            world.vanished.remove(&player);
        }
    }

    fn show_player(&mut self, observer: Uuid, subject: Uuid) {
        self.world().hidden.remove(&(observer, subject));
    }

    fn hide_player(&mut self, observer: Uuid, subject: Uuid) {
        self.world().hidden.insert((observer, subject));
    }

    fn refresh_observer(&mut self, observer: Uuid) {
        self.world().refreshed.push(observer);
    }
}

impl PresentationBackend for FakeHost {
    fn set_group_prefix(&mut self, player: Uuid, color: Option<&str>) {
        self.world()
            .prefixes
            .insert(player, color.map(str::to_owned));
    }

    fn set_collision(&mut self, player: Uuid, collidable: bool) {
        self.world().collision.insert(player, collidable);
    }
}

impl StateStore for FakeHost {
    fn save_snapshot(&mut self, player: Uuid, slot: Slot) -> anyhow::Result<()> {
        let mut world = self.world();
        if world.broken_state_store {
            bail!("disk full");
        }
        world.slot_log.push((player, slot, "save"));
        world.filled_slots.insert((player, slot));
        Ok(())
    }

    fn load_snapshot(&mut self, player: Uuid, slot: Slot) -> anyhow::Result<SlotLoad> {
        let mut world = self.world();
        if world.broken_state_store {
            bail!("disk full");
        }
        world.slot_log.push((player, slot, "load"));
        if world.filled_slots.contains(&(player, slot)) {
            Ok(SlotLoad::Restored)
        } else {
            Ok(SlotLoad::Empty)
        }
    }
}

impl ModeStore for FakeHost {
    fn load(&self) -> anyhow::Result<ModeCaches> {
        Ok(self.world().persisted.clone())
    }

    fn save(&self, caches: &ModeCaches) -> anyhow::Result<()> {
        let mut world = self.world();
        world.persisted = caches.clone();
        world.saves += 1;
        Ok(())
    }
}
