//! The LMDB environment the mode caches live in.

use std::path::Path;

use anyhow::Context;
use heed::{Env, EnvOpenOptions};
use tracing::info;

use crate::storage::NAMED_DATABASES;

/// An opened store directory. Hand it to [`ModeStorage::new`](crate::ModeStorage::new).
#[derive(Debug, Clone)]
pub struct LocalDb {
    pub(crate) env: Env,
}

impl LocalDb {
    /// Opens the store in `directory`, creating the directory if needed.
    ///
    /// `map_size` is the most the store may ever grow to, in bytes. LMDB rounds it up to a
    /// whole page.
    pub fn open(directory: impl AsRef<Path>, map_size: usize) -> anyhow::Result<Self> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)
            .with_context(|| format!("failed to create {}", directory.display()))?;

        // SAFETY: the environment is opened once per directory and the file is never truncated
        // while mapped.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(NAMED_DATABASES)
                .open(directory)
        }
        .with_context(|| format!("failed to open the mode store in {}", directory.display()))?;

        info!(
            "opened mode store in {} ({} KiB map)",
            directory.display(),
            map_size / 1024
        );

        Ok(Self { env })
    }
}
