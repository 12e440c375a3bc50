use std::collections::{BTreeMap, BTreeSet};

use modmode_permission::Mode;
use uuid::Uuid;

use crate::config::{GroupConfig, ModModeConfig};

/// A named operating mode and the players currently in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModeGroup {
    pub mode: Mode,
    pub name: String,
    pub name_color: String,
    pub collidable: bool,
    pub allow_flight: bool,
    pub interact_with_items: bool,
    pub suppress_join_messages: bool,
    members: BTreeSet<Uuid>,
}

impl ModeGroup {
    fn new(mode: Mode, config: &GroupConfig) -> Self {
        let mut group = Self {
            mode,
            name: String::new(),
            name_color: String::new(),
            collidable: false,
            allow_flight: false,
            interact_with_items: false,
            suppress_join_messages: false,
            members: BTreeSet::new(),
        };
        group.apply_policy(config);
        group
    }

    fn apply_policy(&mut self, config: &GroupConfig) {
        config.name.clone_into(&mut self.name);
        config.color.clone_into(&mut self.name_color);
        self.collidable = config.collidable;
        self.allow_flight = config.allow_flight;
        self.interact_with_items = config.interact_with_items;
        self.suppress_join_messages = config.suppress_join_messages;
    }

    #[must_use]
    pub fn contains(&self, player: Uuid) -> bool {
        self.members.contains(&player)
    }
}

/// One [`ModeGroup`] per [`Mode`]. A player is a member of at most one of them.
#[derive(Clone, Debug)]
pub struct GroupRegistry {
    moderator: ModeGroup,
    admin: ModeGroup,
}

impl GroupRegistry {
    #[must_use]
    pub fn new(config: &ModModeConfig) -> Self {
        Self {
            moderator: ModeGroup::new(Mode::Moderator, config.group(Mode::Moderator)),
            admin: ModeGroup::new(Mode::Admin, config.group(Mode::Admin)),
        }
    }

    #[must_use]
    pub const fn get(&self, mode: Mode) -> &ModeGroup {
        match mode {
            Mode::Moderator => &self.moderator,
            Mode::Admin => &self.admin,
        }
    }

    const fn get_mut(&mut self, mode: Mode) -> &mut ModeGroup {
        match mode {
            Mode::Moderator => &mut self.moderator,
            Mode::Admin => &mut self.admin,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModeGroup> {
        [&self.moderator, &self.admin].into_iter()
    }

    #[must_use]
    pub fn group_of(&self, player: Uuid) -> Option<&ModeGroup> {
        self.iter().find(|group| group.contains(player))
    }

    /// Moves `player` into the group of `mode`, leaving whatever group it was in before.
    pub(crate) fn assign(&mut self, player: Uuid, mode: Option<Mode>) {
        self.moderator.members.remove(&player);
        self.admin.members.remove(&player);
        if let Some(mode) = mode {
            self.get_mut(mode).members.insert(player);
        }
    }

    /// Replaces group policies, keeping memberships.
    pub(crate) fn reload(&mut self, config: &ModModeConfig) {
        for mode in Mode::ALL {
            self.get_mut(mode).apply_policy(config.group(mode));
        }
    }
}

/// Cosmetic and collision bucket derived from a player's mode and vanish state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PresentationGroup {
    Mode(Mode),
    Vanished,
}

impl PresentationGroup {
    /// `None` is the baseline of visible players outside any mode.
    #[must_use]
    pub const fn for_state(mode: Option<Mode>, vanished: bool) -> Option<Self> {
        match (mode, vanished) {
            (Some(mode), _) => Some(Self::Mode(mode)),
            (None, true) => Some(Self::Vanished),
            (None, false) => None,
        }
    }
}

/// Membership of [`PresentationGroup`]s. A player is in at most one.
#[derive(Clone, Debug, Default)]
pub struct PresentationGroups {
    members: BTreeMap<PresentationGroup, BTreeSet<Uuid>>,
}

impl PresentationGroups {
    #[must_use]
    pub fn group_of(&self, player: Uuid) -> Option<PresentationGroup> {
        self.members
            .iter()
            .find_map(|(group, members)| members.contains(&player).then_some(*group))
    }

    #[must_use]
    pub fn members(&self, group: PresentationGroup) -> Option<&BTreeSet<Uuid>> {
        self.members.get(&group)
    }

    /// Removes any previous membership of `player` before adding the new one.
    pub(crate) fn assign(&mut self, player: Uuid, group: Option<PresentationGroup>) {
        self.remove(player);
        if let Some(group) = group {
            self.members.entry(group).or_default().insert(player);
        }
    }

    pub(crate) fn remove(&mut self, player: Uuid) {
        for members in self.members.values_mut() {
            members.remove(&player);
        }
        self.members.retain(|_, members| !members.is_empty());
    }
}
