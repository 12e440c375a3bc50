//! Capability surfaces the host environment provides to the mod mode subsystem.

use bevy_ecs::resource::Resource;
use modmode_data::{MemoryStore, ModeStore};
use modmode_permission::PermissionBackend;
use uuid::Uuid;

use crate::{confirm::ConfirmationChannel, error::StartupError};

/// General host primitives: who is online, chat, commands and player physics.
pub trait Host {
    fn online_players(&self) -> Vec<Uuid>;

    fn is_online(&self, player: Uuid) -> bool {
        self.online_players().contains(&player)
    }

    fn display_name(&self, player: Uuid) -> Option<String>;

    fn send_message(&mut self, player: Uuid, message: &str);

    fn broadcast(&mut self, message: &str);

    /// Runs an opaque command string as the console.
    fn dispatch_command(&mut self, command: &str) -> anyhow::Result<()>;

    fn reset_fall_distance(&mut self, player: Uuid);

    fn set_allow_flight(&mut self, player: Uuid, allow: bool);

    /// Places an opaque item descriptor into an inventory slot.
    fn give_item(&mut self, player: Uuid, slot: u8, item: &str) -> anyhow::Result<()>;
}

/// The authoritative vanish implementation.
pub trait VisibilityBackend {
    fn is_vanished(&self, player: Uuid) -> bool;

    fn set_vanished(&mut self, player: Uuid, vanished: bool);

    fn show_player(&mut self, observer: Uuid, subject: Uuid);

    fn hide_player(&mut self, observer: Uuid, subject: Uuid);

    /// Pushes pending show/hide changes to `observer`.
    fn refresh_observer(&mut self, observer: Uuid);
}

/// Name tag and collision rendering.
pub trait PresentationBackend {
    /// `None` clears the prefix.
    fn set_group_prefix(&mut self, player: Uuid, color: Option<&str>);

    fn set_collision(&mut self, player: Uuid, collidable: bool);
}

/// Which persisted copy of a player's inventory, position and health is live.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    Normal,
    Mode,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotLoad {
    Restored,
    /// Nothing was stored in the slot yet.
    Empty,
}

/// Scoped save/load of player state.
pub trait StateStore {
    fn save_snapshot(&mut self, player: Uuid, slot: Slot) -> anyhow::Result<()>;

    fn load_snapshot(&mut self, player: Uuid, slot: Slot) -> anyhow::Result<SlotLoad>;
}

/// Used when the host has no name tag support.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPresentation;

impl PresentationBackend for NoPresentation {
    fn set_group_prefix(&mut self, _: Uuid, _: Option<&str>) {}

    fn set_collision(&mut self, _: Uuid, _: bool) {}
}

/// Used when the host does not swap player state between slots.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStateStore;

impl StateStore for NoStateStore {
    fn save_snapshot(&mut self, _: Uuid, _: Slot) -> anyhow::Result<()> {
        Ok(())
    }

    fn load_snapshot(&mut self, _: Uuid, _: Slot) -> anyhow::Result<SlotLoad> {
        Ok(SlotLoad::Restored)
    }
}

/// Every backend the engine talks to.
#[derive(Resource)]
pub struct Backends {
    pub host: Box<dyn Host + Send + Sync>,
    pub permissions: Box<dyn PermissionBackend + Send + Sync>,
    pub visibility: Box<dyn VisibilityBackend + Send + Sync>,
    pub presentation: Box<dyn PresentationBackend + Send + Sync>,
    pub states: Box<dyn StateStore + Send + Sync>,
    pub store: Box<dyn ModeStore + Send + Sync>,
    pub confirmations: ConfirmationChannel,
}

impl Backends {
    #[must_use]
    pub fn builder(host: impl Host + Send + Sync + 'static) -> BackendsBuilder {
        BackendsBuilder {
            host: Box::new(host),
            permissions: None,
            visibility: None,
            presentation: Box::new(NoPresentation),
            states: Box::new(NoStateStore),
            store: Box::new(MemoryStore::default()),
            confirmations: ConfirmationChannel::new(),
        }
    }
}

/// Builds [`Backends`]. The permission and visibility backends are mandatory.
pub struct BackendsBuilder {
    host: Box<dyn Host + Send + Sync>,
    permissions: Option<Box<dyn PermissionBackend + Send + Sync>>,
    visibility: Option<Box<dyn VisibilityBackend + Send + Sync>>,
    presentation: Box<dyn PresentationBackend + Send + Sync>,
    states: Box<dyn StateStore + Send + Sync>,
    store: Box<dyn ModeStore + Send + Sync>,
    confirmations: ConfirmationChannel,
}

impl BackendsBuilder {
    #[must_use]
    pub fn permissions(mut self, backend: impl PermissionBackend + Send + Sync + 'static) -> Self {
        self.permissions = Some(Box::new(backend));
        self
    }

    #[must_use]
    pub fn visibility(mut self, backend: impl VisibilityBackend + Send + Sync + 'static) -> Self {
        self.visibility = Some(Box::new(backend));
        self
    }

    #[must_use]
    pub fn presentation(
        mut self,
        backend: impl PresentationBackend + Send + Sync + 'static,
    ) -> Self {
        self.presentation = Box::new(backend);
        self
    }

    #[must_use]
    pub fn states(mut self, backend: impl StateStore + Send + Sync + 'static) -> Self {
        self.states = Box::new(backend);
        self
    }

    #[must_use]
    pub fn store(mut self, store: impl ModeStore + Send + Sync + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    /// Use `channel` for confirmations; hand its sender to the permission worker.
    #[must_use]
    pub fn confirmations(mut self, channel: ConfirmationChannel) -> Self {
        self.confirmations = channel;
        self
    }

    pub fn build(self) -> Result<Backends, StartupError> {
        Ok(Backends {
            host: self.host,
            permissions: self
                .permissions
                .ok_or(StartupError::MissingPermissionBackend)?,
            visibility: self
                .visibility
                .ok_or(StartupError::MissingVisibilityBackend)?,
            presentation: self.presentation,
            states: self.states,
            store: self.store,
            confirmations: self.confirmations,
        })
    }
}
