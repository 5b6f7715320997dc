use std::fmt;
use std::path::{Path, PathBuf};

use proxygen_core::{ProfileStore, RulesStore};
use secrecy::SecretString;

use crate::error::SetupError;
use crate::fetch::Fetcher;

const DEFAULT_PROFILE_DIR: &str = "./data/profiles";
const DEFAULT_RULES_DIR: &str = "./data/rules";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

/// Runtime settings read from the environment.
///
/// `.env` in the working directory is loaded first when present. `API_KEY`
/// is required; everything else has a default.
#[derive(Clone)]
pub struct Settings {
    pub api_key: SecretString,
    pub profile_dir: PathBuf,
    pub rules_dir: PathBuf,
    pub host: String,
    pub port: u16,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"[REDACTED]")
            .field("profile_dir", &self.profile_dir)
            .field("rules_dir", &self.rules_dir)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl Settings {
    /// Loads `.env` (if any) and then reads the environment.
    pub fn load() -> Result<Self, SetupError> {
        let dotenv_loaded = dotenvy::dotenv().is_ok();
        tracing::debug!(dotenv = dotenv_loaded, "loading settings");
        Self::from_env()
    }

    /// Like [`Settings::load`], but reads `dir/.env` and resolves relative
    /// storage directories against `dir`.
    pub fn load_in(dir: &Path) -> Result<Self, SetupError> {
        let dotenv_loaded = dotenvy::from_path(dir.join(".env")).is_ok();
        tracing::debug!(dir = %dir.display(), dotenv = dotenv_loaded, "loading settings");

        let mut settings = Self::from_env()?;
        if dir != Path::new(".") {
            settings.profile_dir = rebase(dir, settings.profile_dir);
            settings.rules_dir = rebase(dir, settings.rules_dir);
        }
        Ok(settings)
    }

    pub fn from_env() -> Result<Self, SetupError> {
        let api_key = std::env::var("API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| SetupError::MissingEnvVar("API_KEY".to_owned()))?;

        let port = match optional_env("PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|e| SetupError::InvalidPort { value, source: e })?,
            None => DEFAULT_PORT,
        };

        let settings = Self {
            api_key: SecretString::from(api_key),
            profile_dir: optional_env("PROFILE_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_PROFILE_DIR), PathBuf::from),
            rules_dir: optional_env("RULES_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_RULES_DIR), PathBuf::from),
            host: optional_env("HOST").unwrap_or_else(|| DEFAULT_HOST.to_owned()),
            port,
        };

        tracing::debug!(
            profile_dir = %settings.profile_dir.display(),
            rules_dir = %settings.rules_dir.display(),
            host = %settings.host,
            port = settings.port,
            "settings loaded",
        );
        Ok(settings)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn rebase(dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        dir.join(path)
    } else {
        path
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub api_key: SecretString,
    pub profiles: ProfileStore,
    pub rules: RulesStore,
    pub fetcher: Fetcher,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("api_key", &"[REDACTED]")
            .field("profiles", &self.profiles)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Opens both stores, creating their directories, and builds the
    /// upstream HTTP client.
    pub fn new(settings: &Settings) -> Result<Self, SetupError> {
        Ok(Self {
            api_key: settings.api_key.clone(),
            profiles: ProfileStore::open(&settings.profile_dir)?,
            rules: RulesStore::open(&settings.rules_dir)?,
            fetcher: Fetcher::new().map_err(SetupError::HttpClient)?,
        })
    }
}
