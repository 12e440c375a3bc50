//! Wires the engine into a bevy [`App`]. Hosts trigger the events below from their own listeners.

use std::path::PathBuf;

use bevy_app::{App, FixedUpdate, Plugin};
use bevy_ecs::{
    event::Event,
    observer::On,
    resource::Resource,
    system::{Res, ResMut},
};
use modmode_data::ModeCaches;
use modmode_permission::Mode;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    backend::Backends,
    command::{CommandSender, ModCommands},
    config::ModModeConfig,
    engine::ModeTransitionEngine,
    error::StartupError,
    session::SessionState,
};

/// Activates the subsystem. A [`Backends`] resource must be inserted before this plugin is added;
/// without one the subsystem stays inactive.
pub struct ModModePlugin {
    config_path: PathBuf,
}

impl ModModePlugin {
    #[must_use]
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }
}

impl Default for ModModePlugin {
    fn default() -> Self {
        Self::new("modmode.toml")
    }
}

/// Where the active [`ModModeConfig`] was loaded from, used by `reload`.
#[derive(Resource, Debug, Clone)]
pub struct ConfigPath(pub PathBuf);

#[derive(Event, Debug, Clone)]
pub struct PlayerJoined {
    pub player: Uuid,
    /// Broadcast unless the player joins hidden.
    pub join_message: Option<String>,
}

#[derive(Event, Debug, Clone)]
pub struct PlayerQuit {
    pub player: Uuid,
    pub quit_message: Option<String>,
}

#[derive(Event, Debug, Clone)]
pub struct ModCommandIssued {
    pub sender: CommandSender,
    pub mode: Mode,
    pub args: Vec<String>,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct VanishListRequested {
    pub sender: CommandSender,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct VanishToggled {
    pub player: Uuid,
    pub vanished: bool,
}

/// The privileges of `player` changed outside of mod mode.
#[derive(Event, Debug, Clone, Copy)]
pub struct PermissionsReloaded {
    pub player: Uuid,
}

#[derive(Event, Debug, Clone, Copy, Default)]
pub struct SubsystemShutdown;

impl Plugin for ModModePlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<Backends>() {
            error!("mod mode disabled: {}", StartupError::MissingBackends);
            return;
        }

        let config = match ModModeConfig::load(&self.config_path) {
            Ok(config) => config,
            Err(e) => {
                error!("mod mode disabled: {}", StartupError::Config(e));
                return;
            }
        };

        let caches = match app.world().resource::<Backends>().store.load() {
            Ok(caches) => caches,
            Err(e) => {
                warn!("failed to load persisted mod mode state, starting empty: {e:#}");
                ModeCaches::default()
            }
        };
        let session = SessionState::from_caches(&config, caches);
        info!(
            "mod mode enabled with {} persisted player records",
            session.records().count()
        );

        app.insert_resource(session);
        app.insert_resource(config);
        app.insert_resource(ConfigPath(self.config_path.clone()));

        app.add_observer(player_joined);
        app.add_observer(player_quit);
        app.add_observer(mod_command);
        app.add_observer(vanish_list);
        app.add_observer(vanish_toggled);
        app.add_observer(permissions_reloaded);
        app.add_observer(shutdown);
        app.add_systems(FixedUpdate, drain_confirmations);
    }
}

fn player_joined(
    joined: On<'_, '_, PlayerJoined>,
    mut session: ResMut<'_, SessionState>,
    mut backends: ResMut<'_, Backends>,
    config: Res<'_, ModModeConfig>,
) {
    let outcome = ModeTransitionEngine::new(&mut session, &mut backends, &config)
        .on_join(joined.player, joined.join_message.clone());
    if let Some(message) = outcome.join_message {
        backends.host.broadcast(&message);
    }
}

fn player_quit(
    quit: On<'_, '_, PlayerQuit>,
    mut session: ResMut<'_, SessionState>,
    mut backends: ResMut<'_, Backends>,
    config: Res<'_, ModModeConfig>,
) {
    let outcome = ModeTransitionEngine::new(&mut session, &mut backends, &config).on_quit(quit.player);
    if outcome.suppress_quit_message {
        return;
    }
    if let Some(message) = &quit.quit_message {
        backends.host.broadcast(message);
    }
}

fn mod_command(
    command: On<'_, '_, ModCommandIssued>,
    mut session: ResMut<'_, SessionState>,
    mut backends: ResMut<'_, Backends>,
    mut config: ResMut<'_, ModModeConfig>,
    path: Res<'_, ConfigPath>,
) {
    ModCommands::new(&mut session, &mut backends, &mut config, &path.0).toggle(
        command.sender,
        command.mode,
        &command.args,
    );
}

fn vanish_list(
    request: On<'_, '_, VanishListRequested>,
    mut session: ResMut<'_, SessionState>,
    mut backends: ResMut<'_, Backends>,
    mut config: ResMut<'_, ModModeConfig>,
    path: Res<'_, ConfigPath>,
) {
    ModCommands::new(&mut session, &mut backends, &mut config, &path.0).vanish_list(request.sender);
}

fn vanish_toggled(
    toggle: On<'_, '_, VanishToggled>,
    mut session: ResMut<'_, SessionState>,
    mut backends: ResMut<'_, Backends>,
    config: Res<'_, ModModeConfig>,
) {
    ModeTransitionEngine::new(&mut session, &mut backends, &config)
        .set_vanished(toggle.player, toggle.vanished);
}

fn permissions_reloaded(
    reloaded: On<'_, '_, PermissionsReloaded>,
    mut session: ResMut<'_, SessionState>,
    mut backends: ResMut<'_, Backends>,
    config: Res<'_, ModModeConfig>,
) {
    ModeTransitionEngine::new(&mut session, &mut backends, &config)
        .on_permissions_reloaded(reloaded.player);
}

fn shutdown(
    _: On<'_, '_, SubsystemShutdown>,
    mut session: ResMut<'_, SessionState>,
    mut backends: ResMut<'_, Backends>,
    config: Res<'_, ModModeConfig>,
) {
    if ModeTransitionEngine::new(&mut session, &mut backends, &config).on_shutdown() {
        info!("mod mode state saved");
    }
}

fn drain_confirmations(
    mut session: ResMut<'_, SessionState>,
    mut backends: ResMut<'_, Backends>,
    config: Res<'_, ModModeConfig>,
) {
    ModeTransitionEngine::new(&mut session, &mut backends, &config).drain_confirmations();
}
