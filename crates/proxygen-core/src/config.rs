use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// proxygen.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxygenConfig {
    #[serde(default)]
    pub image: ImageConfig,
}

/// Container image recipe for the packaged service.
///
/// Every path is relative to the project directory at build time and to
/// `workdir` inside the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Minimal language runtime image
    #[serde(default = "default_base_image")]
    pub base_image: String,
    /// Versioned image distributing the dependency manager executables
    #[serde(default = "default_installer_image")]
    pub installer_image: String,
    /// Executables copied out of `installer_image`
    #[serde(default = "default_installer_binaries")]
    pub installer_binaries: Vec<String>,
    /// Directory the installer executables land in
    #[serde(default = "default_installer_dest")]
    pub installer_dest: String,
    /// Working directory inside the image
    #[serde(default = "default_workdir")]
    pub workdir: String,
    /// Dependency manifest file
    #[serde(default = "default_manifest")]
    pub manifest: String,
    /// Dependency lock file
    #[serde(default = "default_lockfile")]
    pub lockfile: String,
    /// Dependency manager sync invocation, without the frozen/no-project flags
    #[serde(default = "default_sync_command")]
    pub sync_command: Vec<String>,
    /// Extra arguments appended after the mandatory sync flags
    #[serde(default)]
    pub extra_sync_args: Vec<String>,
    /// Isolated dependency environment, relative to `workdir`
    #[serde(default = "default_env_dir")]
    pub env_dir: String,
    /// Application source paths copied after dependency installation
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    /// Module the run command is pointed at
    #[serde(default = "default_entry_module")]
    pub entry_module: String,
    /// Server run command; the entry module is appended as last argument
    #[serde(default = "default_run_command")]
    pub run_command: Vec<String>,
    /// Static environment variables baked into the image
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base_image: default_base_image(),
            installer_image: default_installer_image(),
            installer_binaries: default_installer_binaries(),
            installer_dest: default_installer_dest(),
            workdir: default_workdir(),
            manifest: default_manifest(),
            lockfile: default_lockfile(),
            sync_command: default_sync_command(),
            extra_sync_args: Vec::new(),
            env_dir: default_env_dir(),
            sources: default_sources(),
            entry_module: default_entry_module(),
            run_command: default_run_command(),
            env: BTreeMap::new(),
        }
    }
}

impl ImageConfig {
    /// Absolute path of the isolated environment's executable directory.
    pub fn env_bin_dir(&self) -> String {
        format!(
            "{}/{}/bin",
            self.workdir.trim_end_matches('/'),
            self.env_dir.trim_start_matches("./").trim_end_matches('/')
        )
    }

    /// Default container command: run command followed by the entry module.
    pub fn command(&self) -> Vec<String> {
        let mut cmd = self.run_command.clone();
        cmd.push(self.entry_module.clone());
        cmd
    }
}

impl ProxygenConfig {
    /// Load from proxygen.toml at the given path, or return defaults if not found.
    pub fn load(project_dir: &std::path::Path) -> crate::Result<Self> {
        let config_path = project_dir.join("proxygen.toml");
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })
        } else {
            Ok(Self::default())
        }
    }
}

fn default_base_image() -> String {
    "python:3.12-slim".to_owned()
}

fn default_installer_image() -> String {
    "ghcr.io/astral-sh/uv:0.5.11".to_owned()
}

fn default_installer_binaries() -> Vec<String> {
    vec!["/uv".to_owned(), "/uvx".to_owned()]
}

fn default_installer_dest() -> String {
    "/bin/".to_owned()
}

fn default_workdir() -> String {
    "/app".to_owned()
}

fn default_manifest() -> String {
    "pyproject.toml".to_owned()
}

fn default_lockfile() -> String {
    "uv.lock".to_owned()
}

fn default_sync_command() -> Vec<String> {
    vec!["uv".to_owned(), "sync".to_owned()]
}

fn default_env_dir() -> String {
    ".venv".to_owned()
}

fn default_sources() -> Vec<String> {
    vec!["app".to_owned()]
}

fn default_entry_module() -> String {
    "main.py".to_owned()
}

fn default_run_command() -> Vec<String> {
    vec!["fastapi".to_owned(), "run".to_owned()]
}
