use modmode_permission::{Mode, PermissionSnapshot};

/// Where a player is in the mode state machine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum TransitionState {
    #[default]
    Inactive,
    Active,
    /// The permission half of the last transition has not been confirmed yet.
    TransitionPending,
}

/// Per-player mod mode state. Created lazily with everything empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlayerModeRecord {
    active_mode: Option<Mode>,
    vanished: bool,
    transition: TransitionState,
    /// Vanish state to restore on the next join, or the pre-entry baseline while in a mode.
    pub logged_out_vanished: bool,
    /// Whether the player held the persistent vanish capability when entering the active mode.
    pub persistent_vanish_at_entry: bool,
    /// The join broadcast held back because the player joined hidden.
    pub suppressed_join_message: Option<String>,
    pub permission_snapshot: PermissionSnapshot,
    /// Opt-in to item pickup and drop while in a mode that allows it. Cleared on exit.
    pub item_interact: bool,
}

impl PlayerModeRecord {
    #[must_use]
    pub const fn active_mode(&self) -> Option<Mode> {
        self.active_mode
    }

    #[must_use]
    pub const fn is_vanished(&self) -> bool {
        self.vanished
    }

    #[must_use]
    pub const fn transition(&self) -> TransitionState {
        self.transition
    }

    #[must_use]
    pub const fn pending_transition(&self) -> bool {
        matches!(self.transition, TransitionState::TransitionPending)
    }

    /// Mode and vanish always change together so no reader sees one without the other.
    pub(crate) const fn set_state(&mut self, mode: Option<Mode>, vanished: bool) {
        self.active_mode = mode;
        self.vanished = vanished;
        if !self.pending_transition() {
            self.settle();
        }
    }

    pub(crate) const fn mark_pending(&mut self) {
        self.transition = TransitionState::TransitionPending;
    }

    /// Leaves [`TransitionState::TransitionPending`] for the state matching the active mode.
    pub(crate) const fn settle(&mut self) {
        self.transition = match self.active_mode {
            Some(_) => TransitionState::Active,
            None => TransitionState::Inactive,
        };
    }
}
