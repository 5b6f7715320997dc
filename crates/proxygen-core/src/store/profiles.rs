use std::path::{Path, PathBuf};

use crate::schema::Profile;
use crate::{Error, Result};

/// One YAML file per profile under a base directory.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    base_path: PathBuf,
}

impl ProfileStore {
    /// Opens the store, creating the directory if needed.
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path).map_err(|e| Error::StorageDir {
            path: base_path.clone(),
            source: e,
        })?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.base_path.join(format!("{name}.yaml")))
    }

    pub fn load(&self, name: &str) -> Result<Profile> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(Error::ProfileNotFound {
                name: name.to_owned(),
            });
        }

        let content = std::fs::read_to_string(&path).map_err(|e| Error::ProfileRead {
            name: name.to_owned(),
            source: e,
        })?;

        serde_yaml_ng::from_str(&content).map_err(|e| Error::ProfileParse {
            name: name.to_owned(),
            source: e,
        })
    }

    /// Writes the profile as block-style YAML, keeping key order.
    pub fn save(&self, name: &str, profile: &Profile) -> Result<()> {
        let path = self.path_for(name)?;
        let content = serde_yaml_ng::to_string(profile).map_err(|e| Error::ProfileSerialize {
            name: name.to_owned(),
            source: e,
        })?;

        std::fs::write(&path, content).map_err(|e| Error::ProfileWrite {
            name: name.to_owned(),
            source: e,
        })?;

        tracing::debug!(profile = name, path = %path.display(), "profile saved");
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        Some("must not be empty")
    } else if name.contains('/') || name.contains('\\') {
        Some("must not contain path separators")
    } else if name.contains("..") {
        Some("must not contain '..'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidProfileName {
            name: name.to_owned(),
            reason,
        }),
        None => Ok(()),
    }
}
