mod backend;
mod node;
mod snapshot;

pub use backend::*;
pub use node::*;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
pub use snapshot::*;

/// A mutually exclusive operating mode a privileged player can switch into.
#[derive(FromPrimitive, ToPrimitive, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Mode {
    Moderator,
    Admin,
}

impl Mode {
    pub const ALL: [Self; 2] = [Self::Moderator, Self::Admin];

    /// The numeric code used when persisting the mode.
    #[must_use]
    pub fn code(self) -> u8 {
        self.to_u8().unwrap_or_default()
    }

    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::from_u8(code)
    }
}
