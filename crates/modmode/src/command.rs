//! The toggle command bound to each mode and the vanish list command.

use std::path::Path;

use clap::{Parser, Subcommand, ValueEnum};
use modmode_permission::Mode;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    backend::Backends,
    config::ModModeConfig,
    engine::{ModeTransitionEngine, TransitionOutcome},
    session::SessionState,
};

pub const USAGE: &str = "§eUsage: /<mode> [on|off|save|reload|help|iteminteract [on|off]]";

#[derive(Parser, Debug, PartialEq, Eq)]
#[command(
    name = "modmode",
    no_binary_name = true,
    disable_help_flag = true,
    disable_help_subcommand = true,
    disable_version_flag = true
)]
pub struct ToggleCommand {
    #[command(subcommand)]
    pub action: Option<ToggleAction>,
}

#[derive(Subcommand, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ToggleAction {
    On,
    Off,
    Save,
    Reload,
    Help,
    Iteminteract { state: Option<Switch> },
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

impl From<Switch> for bool {
    fn from(switch: Switch) -> Self {
        matches!(switch, Switch::On)
    }
}

/// Who ran a command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandSender {
    Player(Uuid),
    Console,
}

/// Runs commands against a live session.
pub struct ModCommands<'a> {
    session: &'a mut SessionState,
    backends: &'a mut Backends,
    config: &'a mut ModModeConfig,
    config_path: &'a Path,
}

impl<'a> ModCommands<'a> {
    pub fn new(
        session: &'a mut SessionState,
        backends: &'a mut Backends,
        config: &'a mut ModModeConfig,
        config_path: &'a Path,
    ) -> Self {
        Self {
            session,
            backends,
            config,
            config_path,
        }
    }

    fn engine(&mut self) -> ModeTransitionEngine<'_> {
        ModeTransitionEngine::new(&mut *self.session, &mut *self.backends, &*self.config)
    }

    fn reply(&mut self, sender: CommandSender, message: &str) {
        match sender {
            CommandSender::Player(player) => self.backends.host.send_message(player, message),
            CommandSender::Console => info!("{message}"),
        }
    }

    /// The command bound to `mode`, e.g. `/modmode` for [`Mode::Moderator`].
    pub fn toggle<S: AsRef<str>>(
        &mut self,
        sender: CommandSender,
        mode: Mode,
        args: &[S],
    ) -> TransitionOutcome {
        let command = match ToggleCommand::try_parse_from(args.iter().map(AsRef::<str>::as_ref)) {
            Ok(command) => command,
            Err(_) => {
                self.reply(sender, USAGE);
                return TransitionOutcome::Unchanged;
            }
        };

        match command.action {
            Some(ToggleAction::Help) => {
                self.reply(sender, USAGE);
                return TransitionOutcome::Unchanged;
            }
            Some(ToggleAction::Save) => return self.save(sender, mode),
            Some(ToggleAction::Reload) => return self.reload(sender, mode),
            _ => {}
        }

        let CommandSender::Player(player) = sender else {
            self.reply(sender, "§cThis command can only be run by a player.");
            return TransitionOutcome::Unchanged;
        };

        let group_name = self.config.group(mode).name.clone();
        let current = self.session.active_mode(player);

        match (command.action, current) {
            (Some(ToggleAction::Iteminteract { state }), _) => {
                self.engine()
                    .set_item_interact(player, mode, state.map(bool::from))
            }
            (None | Some(ToggleAction::Off), Some(current)) if current == mode => {
                self.engine().exit(player)
            }
            (None | Some(ToggleAction::On), None) => self.engine().enter(player, mode),
            (Some(ToggleAction::On), Some(_)) if current == Some(mode) => {
                self.reply(sender, &format!("§eYou are already in {group_name}."));
                TransitionOutcome::Unchanged
            }
            (_, Some(other)) => {
                let other_name = self.config.group(other).name.clone();
                self.reply(
                    sender,
                    &format!("§cYou are in {other_name}, not {group_name}."),
                );
                TransitionOutcome::Unchanged
            }
            (_, None) => {
                self.reply(sender, &format!("§eYou are not in {group_name}."));
                TransitionOutcome::Unchanged
            }
        }
    }

    fn may_administer(&self, sender: CommandSender, mode: Mode) -> bool {
        match sender {
            CommandSender::Console => true,
            CommandSender::Player(player) => self
                .backends
                .permissions
                .has_capability(player, &self.config.group(mode).permission),
        }
    }

    fn save(&mut self, sender: CommandSender, mode: Mode) -> TransitionOutcome {
        if !self.may_administer(sender, mode) {
            self.reply(sender, "§cYou may not do that.");
            return TransitionOutcome::Unchanged;
        }
        if self.engine().persist() {
            self.reply(sender, "§aMod mode state saved.");
        } else {
            self.reply(sender, "§cFailed to save mod mode state, see the server log.");
        }
        TransitionOutcome::Unchanged
    }

    fn reload(&mut self, sender: CommandSender, mode: Mode) -> TransitionOutcome {
        if !self.may_administer(sender, mode) {
            self.reply(sender, "§cYou may not do that.");
            return TransitionOutcome::Unchanged;
        }
        match ModModeConfig::load(self.config_path) {
            Ok(config) => {
                *self.config = config;
                self.session.reload_groups(self.config);
                self.reply(sender, "§aMod mode configuration reloaded.");
            }
            Err(e) => {
                error!("failed to reload mod mode configuration: {e:#}");
                self.reply(sender, &format!("§cFailed to reload configuration: {e}"));
            }
        }
        TransitionOutcome::Unchanged
    }

    /// Tells `sender` which online players are vanished.
    pub fn vanish_list(&mut self, sender: CommandSender) {
        let message = self.engine().vanished_list();
        self.reply(sender, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    struct Fixture {
        host: FakeHost,
        backends: Backends,
        session: SessionState,
        config: ModModeConfig,
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let host = FakeHost::default();
            let config = ModModeConfig::default();
            Self {
                backends: host.backends(),
                session: SessionState::new(&config),
                host,
                config,
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn moderator(&self, name: &str) -> Uuid {
            let player = self.host.join(name);
            self.host
                .world()
                .grant(player, "modmode.toggle.moderator");
            player
        }

        fn run(&mut self, sender: CommandSender, mode: Mode, args: &[&str]) -> TransitionOutcome {
            let path = self.dir.path().join("modmode.toml");
            ModCommands::new(
                &mut self.session,
                &mut self.backends,
                &mut self.config,
                &path,
            )
            .toggle(sender, mode, args)
        }
    }

    #[test]
    fn parses_arguments() {
        let parse = |args: &[&str]| ToggleCommand::try_parse_from(args).map(|c| c.action).ok();
        assert_eq!(parse(&[]), Some(None));
        assert_eq!(parse(&["on"]), Some(Some(ToggleAction::On)));
        assert_eq!(parse(&["help"]), Some(Some(ToggleAction::Help)));
        assert_eq!(
            parse(&["iteminteract", "off"]),
            Some(Some(ToggleAction::Iteminteract {
                state: Some(Switch::Off)
            }))
        );
        assert_eq!(
            parse(&["iteminteract"]),
            Some(Some(ToggleAction::Iteminteract { state: None }))
        );
        assert_eq!(parse(&["sideways"]), None);
    }

    #[test]
    fn bare_command_toggles() {
        let mut fixture = Fixture::new();
        let player = fixture.moderator("mod");
        let sender = CommandSender::Player(player);

        assert!(fixture.run(sender, Mode::Moderator, &[]).is_applied());
        assert_eq!(fixture.session.active_mode(player), Some(Mode::Moderator));

        assert!(fixture.run(sender, Mode::Moderator, &[]).is_applied());
        assert_eq!(fixture.session.active_mode(player), None);
    }

    #[test]
    fn on_and_off_are_idempotent() {
        let mut fixture = Fixture::new();
        let player = fixture.moderator("mod");
        let sender = CommandSender::Player(player);

        assert_eq!(
            fixture.run(sender, Mode::Moderator, &["off"]),
            TransitionOutcome::Unchanged
        );
        assert!(fixture.run(sender, Mode::Moderator, &["on"]).is_applied());
        assert_eq!(
            fixture.run(sender, Mode::Moderator, &["on"]),
            TransitionOutcome::Unchanged
        );
        assert_eq!(fixture.session.active_mode(player), Some(Mode::Moderator));
        assert!(
            fixture
                .host
                .world()
                .messages_to(player)
                .contains(&"§eYou are already in ModMode.")
        );
    }

    #[test]
    fn other_group_is_named_in_the_rejection() {
        let mut fixture = Fixture::new();
        let player = fixture.moderator("mod");
        fixture.host.world().grant(player, "modmode.toggle.admin");
        let sender = CommandSender::Player(player);

        fixture.run(sender, Mode::Admin, &[]);
        assert_eq!(
            fixture.run(sender, Mode::Moderator, &[]),
            TransitionOutcome::Unchanged
        );

        assert_eq!(fixture.session.active_mode(player), Some(Mode::Admin));
        assert!(
            fixture
                .host
                .world()
                .messages_to(player)
                .contains(&"§cYou are in AdminMode, not ModMode.")
        );
    }

    #[test]
    fn console_cannot_toggle() {
        let mut fixture = Fixture::new();
        assert_eq!(
            fixture.run(CommandSender::Console, Mode::Moderator, &[]),
            TransitionOutcome::Unchanged
        );
        assert!(fixture.session.records().next().is_none());
    }

    #[test]
    fn item_interact_requires_group_policy() {
        let mut fixture = Fixture::new();
        let player = fixture.moderator("mod");
        fixture.host.world().grant(player, "modmode.toggle.admin");
        let sender = CommandSender::Player(player);

        assert_eq!(
            fixture.run(sender, Mode::Moderator, &["iteminteract"]),
            TransitionOutcome::Unchanged
        );

        fixture.run(sender, Mode::Moderator, &["on"]);
        assert!(
            fixture
                .run(sender, Mode::Moderator, &["iteminteract", "on"])
                .is_applied()
        );
        assert!(fixture.session.record(player).unwrap().item_interact);

        fixture.run(sender, Mode::Moderator, &["off"]);
        fixture.run(sender, Mode::Admin, &["on"]);
        assert_eq!(
            fixture.run(sender, Mode::Admin, &["iteminteract", "on"]),
            TransitionOutcome::Unchanged
        );
        assert!(
            fixture
                .host
                .world()
                .messages_to(player)
                .contains(&"§cAdminMode does not allow item interaction.")
        );
    }

    #[test]
    fn reload_replaces_group_policy() {
        let mut fixture = Fixture::new();
        let path = fixture.dir.path().join("modmode.toml");
        let mut edited = ModModeConfig::default();
        edited.groups.moderator.name = "Helpers".to_owned();
        std::fs::write(&path, toml::to_string_pretty(&edited).unwrap()).unwrap();

        fixture.run(CommandSender::Console, Mode::Moderator, &["reload"]);

        assert_eq!(fixture.config.groups.moderator.name, "Helpers");
        assert_eq!(
            fixture.session.groups().get(Mode::Moderator).name,
            "Helpers"
        );
    }

    #[test]
    fn save_writes_the_store() {
        let mut fixture = Fixture::new();
        fixture.run(CommandSender::Console, Mode::Moderator, &["save"]);
        assert_eq!(fixture.host.world().saves, 1);
    }
}
