//! Decides who can see whom and converges the host to that decision.
//!
//! [`VisibilityCoordinator::refresh_all`] recomputes every connected (observer, subject) pair, so
//! it is quadratic in the online population. That is fine for tens to low hundreds of players;
//! [`VisibilityCoordinator::refresh_player`] only touches pairs involving one player and is used
//! when nothing else changed.

use modmode_permission::{Mode, PermissionBackend};
use tracing::debug;
use uuid::Uuid;

use crate::{
    backend::{PresentationBackend, VisibilityBackend},
    config::ModModeConfig,
    group::PresentationGroup,
    session::SessionState,
};

pub struct VisibilityCoordinator<'a> {
    session: &'a mut SessionState,
    config: &'a ModModeConfig,
    permissions: &'a dyn PermissionBackend,
    visibility: &'a mut dyn VisibilityBackend,
    presentation: &'a mut dyn PresentationBackend,
}

impl<'a> VisibilityCoordinator<'a> {
    pub fn new(
        session: &'a mut SessionState,
        config: &'a ModModeConfig,
        permissions: &'a dyn PermissionBackend,
        visibility: &'a mut dyn VisibilityBackend,
        presentation: &'a mut dyn PresentationBackend,
    ) -> Self {
        Self {
            session,
            config,
            permissions,
            visibility,
            presentation,
        }
    }

    /// Whether `subject` is hidden from observers without the see-hidden capability.
    #[must_use]
    pub fn is_hidden(&self, subject: Uuid) -> bool {
        self.visibility.is_vanished(subject) || self.session.active_mode(subject).is_some()
    }

    /// The tier whose see-hidden capability reveals `subject`: its current mode, otherwise the
    /// highest mode it may enter.
    #[must_use]
    pub fn tier_of(&self, subject: Uuid) -> Mode {
        self.session.active_mode(subject).unwrap_or_else(|| {
            Mode::ALL
                .into_iter()
                .rev()
                .find(|&mode| {
                    self.permissions
                        .has_capability(subject, &self.config.group(mode).permission)
                })
                .unwrap_or(Mode::Moderator)
        })
    }

    #[must_use]
    pub fn can_see(&self, observer: Uuid, subject: Uuid) -> bool {
        if observer == subject || !self.is_hidden(subject) {
            return true;
        }
        let tier = self.tier_of(subject);
        self.permissions
            .has_capability(observer, &self.config.group(tier).see_hidden)
    }

    fn apply_pair(&mut self, observer: Uuid, subject: Uuid) {
        if self.can_see(observer, subject) {
            self.visibility.show_player(observer, subject);
        } else {
            self.visibility.hide_player(observer, subject);
        }
    }

    /// Recomputes every pair among `online`.
    pub fn refresh_all(&mut self, online: &[Uuid]) {
        debug!("refreshing visibility of {} players", online.len());
        for &observer in online {
            for &subject in online {
                if observer != subject {
                    self.apply_pair(observer, subject);
                }
            }
        }
        for &observer in online {
            self.visibility.refresh_observer(observer);
        }
    }

    /// Recomputes the pairs in which `player` is either observer or subject.
    pub fn refresh_player(&mut self, player: Uuid, online: &[Uuid]) {
        for &other in online {
            if other == player {
                continue;
            }
            self.apply_pair(player, other);
            self.apply_pair(other, player);
            self.visibility.refresh_observer(other);
        }
        self.visibility.refresh_observer(player);
    }

    /// Puts `player` into the single presentation group matching its mode and vanish state.
    pub fn assign_presentation_group(&mut self, player: Uuid) {
        let mode = self.session.active_mode(player);
        let vanished = self.visibility.is_vanished(player);
        let target = PresentationGroup::for_state(mode, vanished);

        self.session.presentation_mut().assign(player, target);

        match target {
            Some(PresentationGroup::Mode(mode)) => {
                let group = self.session.groups().get(mode);
                self.presentation
                    .set_group_prefix(player, Some(&group.name_color));
                self.presentation.set_collision(player, group.collidable);
            }
            Some(PresentationGroup::Vanished) => {
                self.presentation
                    .set_group_prefix(player, Some(&self.config.vanished_color));
                self.presentation.set_collision(player, false);
            }
            None => {
                self.presentation.set_group_prefix(player, None);
                self.presentation.set_collision(player, true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::*;
    use crate::testing::FakeHost;

    struct Fixture {
        host: FakeHost,
        config: ModModeConfig,
        session: SessionState,
    }

    impl Fixture {
        fn new() -> Self {
            let config = ModModeConfig::default();
            let session = SessionState::new(&config);
            Self {
                host: FakeHost::default(),
                config,
                session,
            }
        }

        fn refresh_all(&mut self) {
            let online = self.host.world().online.clone();
            let permissions = self.host.clone();
            let mut visibility = self.host.clone();
            let mut presentation = self.host.clone();
            VisibilityCoordinator::new(
                &mut self.session,
                &self.config,
                &permissions,
                &mut visibility,
                &mut presentation,
            )
            .refresh_all(&online);
        }
    }

    #[test]
    fn vanished_players_are_hidden_from_regular_players() {
        let mut fixture = Fixture::new();
        let regular = fixture.host.join("regular");
        let hidden = fixture.host.join("hidden");
        fixture.host.world().vanished.insert(hidden);
        fixture.session.apply_state(hidden, None, true);

        fixture.refresh_all();

        let world = fixture.host.world();
        assert!(world.hidden.contains(&(regular, hidden)));
        assert!(!world.hidden.contains(&(hidden, regular)));
    }

    #[test]
    fn see_hidden_depends_on_the_subject_tier() {
        let mut fixture = Fixture::new();
        let moderator = fixture.host.join("moderator");
        let admin = fixture.host.join("admin");
        {
            let mut world = fixture.host.world();
            world.grant(moderator, "modmode.seehidden.moderator");
            world.grant(admin, "modmode.seehidden.moderator");
            world.grant(admin, "modmode.seehidden.admin");
            world.vanished.insert(moderator);
            world.vanished.insert(admin);
        }
        fixture
            .session
            .apply_state(moderator, Some(Mode::Moderator), true);
        fixture.session.apply_state(admin, Some(Mode::Admin), true);

        fixture.refresh_all();

        let world = fixture.host.world();
        assert!(world.hidden.contains(&(moderator, admin)));
        assert!(!world.hidden.contains(&(admin, moderator)));
    }

    #[test]
    fn tier_outside_a_mode_comes_from_entry_capabilities() {
        let mut fixture = Fixture::new();
        let admin = fixture.host.join("admin");
        fixture
            .host
            .world()
            .grant(admin, "modmode.toggle.admin");

        let permissions = fixture.host.clone();
        let mut visibility = fixture.host.clone();
        let mut presentation = fixture.host.clone();
        let coordinator = VisibilityCoordinator::new(
            &mut fixture.session,
            &fixture.config,
            &permissions,
            &mut visibility,
            &mut presentation,
        );
        assert_eq!(coordinator.tier_of(admin), Mode::Admin);
    }

    #[test]
    fn presentation_group_follows_state() {
        let mut fixture = Fixture::new();
        let player = fixture.host.join("player");
        let permissions = fixture.host.clone();
        let mut visibility = fixture.host.clone();
        let mut presentation = fixture.host.clone();

        fixture.host.world().vanished.insert(player);
        let mut coordinator = VisibilityCoordinator::new(
            &mut fixture.session,
            &fixture.config,
            &permissions,
            &mut visibility,
            &mut presentation,
        );
        coordinator.assign_presentation_group(player);

        assert_eq!(
            fixture.session.presentation().group_of(player),
            Some(PresentationGroup::Vanished)
        );
        let world = fixture.host.world();
        assert_eq!(world.prefixes.get(&player), Some(&Some("gray".to_owned())));
        assert_eq!(world.collision.get(&player), Some(&false));
    }

    #[derive(Debug, Clone)]
    struct Population {
        players: Vec<(bool, Option<Mode>, bool, bool)>,
    }

    fn population() -> impl Strategy<Value = Population> {
        let mode = prop_oneof![Just(None), Just(Some(Mode::Moderator)), Just(Some(Mode::Admin))];
        prop::collection::vec((any::<bool>(), mode, any::<bool>(), any::<bool>()), 2..7)
            .prop_map(|players| Population { players })
    }

    proptest! {
        #[test]
        fn refresh_matches_the_visibility_rule(population in population()) {
            let mut fixture = Fixture::new();
            let mut players = Vec::new();
            for (i, &(vanished, mode, sees_moderators, sees_admins)) in
                population.players.iter().enumerate()
            {
                let player = fixture.host.join(&format!("player{i}"));
                {
                    let mut world = fixture.host.world();
                    if vanished {
                        world.vanished.insert(player);
                    }
                    if sees_moderators {
                        world.grant(player, "modmode.seehidden.moderator");
                    }
                    if sees_admins {
                        world.grant(player, "modmode.seehidden.admin");
                    }
                }
                fixture.session.apply_state(player, mode, vanished);
                players.push((player, vanished, mode, sees_moderators, sees_admins));
            }

            fixture.refresh_all();

            let world = fixture.host.world();
            for &(observer, _, _, sees_moderators, sees_admins) in &players {
                for &(subject, vanished, mode, _, _) in &players {
                    if observer == subject {
                        continue;
                    }
                    let hidden = vanished || mode.is_some();
                    let sees_tier = match mode.unwrap_or(Mode::Moderator) {
                        Mode::Moderator => sees_moderators,
                        Mode::Admin => sees_admins,
                    };
                    let expected = !hidden || sees_tier;
                    prop_assert_eq!(!world.hidden.contains(&(observer, subject)), expected);
                }
            }
            let refreshed: BTreeSet<_> = world.refreshed.iter().copied().collect();
            prop_assert_eq!(refreshed.len(), players.len());
        }
    }
}
