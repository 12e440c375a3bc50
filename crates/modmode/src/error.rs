use thiserror::Error;

/// Conditions that keep the mod mode subsystem from activating at all.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("no backends were inserted before the plugin was added")]
    MissingBackends,
    #[error("no permission backend was registered")]
    MissingPermissionBackend,
    #[error("no visibility backend was registered")]
    MissingVisibilityBackend,
    #[error("failed to load configuration: {0:#}")]
    Config(anyhow::Error),
}
