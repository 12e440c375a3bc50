mod caches;
mod db;
mod storage;

pub use caches::*;
pub use db::*;
pub use storage::*;
