//! Errors raised while loading, saving, or locating configuration.

/// Configuration failure. None of these reach the frame loop; the host decides
/// whether to fall back to [`Config::default`](crate::Config::default).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The platform exposes no per-user configuration directory.
    #[error("no user config directory available on this platform")]
    NoConfigDir,

    /// Reading `config.ron` failed.
    #[error("failed to read config: {0}")]
    Read(#[source] std::io::Error),

    /// Writing `config.ron` (or creating its directory) failed.
    #[error("failed to write config: {0}")]
    Write(#[source] std::io::Error),

    /// The file is not valid RON for [`Config`](crate::Config).
    #[error("failed to parse config: {0}")]
    Parse(#[source] ron::error::SpannedError),

    /// Serializing the config to RON failed.
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] ron::Error),
}
