//! Mod Mode
//!
//! Lets privileged players switch into a restricted operating mode: their regular permissions are
//! stripped and stashed, they are vanished from everyone without the matching see-hidden
//! capability, and their inventory is swapped for a mode one. Leaving the mode undoes all of it.

mod backend;
mod command;
mod config;
mod confirm;
mod engine;
mod error;
mod group;
mod plugin;
mod record;
mod session;
mod visibility;

#[cfg(test)]
mod testing;

pub use backend::*;
pub use command::*;
pub use config::*;
pub use confirm::*;
pub use engine::*;
pub use error::*;
pub use group::*;
pub use plugin::*;
pub use record::*;
pub use session::*;
pub use visibility::*;

// Re-exports of the internal crates
pub mod data {
    pub use modmode_data::*;
}

pub mod permission {
    pub use modmode_permission::*;
}
