use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    // ── Profile storage ──
    #[error("invalid profile name {name:?}: {reason}")]
    InvalidProfileName { name: String, reason: &'static str },

    #[error("Profile '{name}' does not exist.")]
    ProfileNotFound { name: String },

    #[error("error loading profile '{name}'")]
    ProfileRead {
        name: String,
        source: std::io::Error,
    },

    #[error("error parsing profile '{name}'")]
    ProfileParse {
        name: String,
        source: serde_yaml_ng::Error,
    },

    #[error("error saving profile '{name}'")]
    ProfileWrite {
        name: String,
        source: std::io::Error,
    },

    #[error("error serializing profile '{name}'")]
    ProfileSerialize {
        name: String,
        source: serde_yaml_ng::Error,
    },

    #[error("failed to render Clash config")]
    Render { source: serde_yaml_ng::Error },

    #[error("failed to create storage directory {path}")]
    StorageDir {
        path: PathBuf,
        source: std::io::Error,
    },
}
