use std::path::{Component, Path, PathBuf};

use serde_yaml_ng::{Mapping, Value};

use crate::clash::ProviderSource;
use crate::schema::RulesFile;
use crate::{Error, Result};

const RULES_FILE: &str = "rules.yaml";
const PROXY_GROUPS_FILE: &str = "proxy-groups.yaml";

/// Read-only access to the rules directory: group templates, rules,
/// rule-provider lists, and override fragments.
///
/// Missing or broken files degrade to empty content with a log line, so a
/// half-configured rules directory still yields a usable config.
#[derive(Debug, Clone)]
pub struct RulesStore {
    rules_dir: PathBuf,
}

impl RulesStore {
    /// Opens the store, creating the directory if needed.
    pub fn open(rules_dir: impl Into<PathBuf>) -> Result<Self> {
        let rules_dir = rules_dir.into();
        std::fs::create_dir_all(&rules_dir).map_err(|e| Error::StorageDir {
            path: rules_dir.clone(),
            source: e,
        })?;
        Ok(Self { rules_dir })
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// Raw `proxy-groups` entries, validated later during generation.
    pub fn proxy_groups(&self) -> Vec<Value> {
        match self.load_yaml(PROXY_GROUPS_FILE).get("proxy-groups") {
            Some(Value::Sequence(groups)) => groups.clone(),
            _ => Vec::new(),
        }
    }

    pub fn rules(&self) -> RulesFile {
        let doc = self.load_yaml(RULES_FILE);
        let rule_providers = match doc.get("rule-providers") {
            Some(Value::Mapping(providers)) => providers.clone(),
            _ => Mapping::new(),
        };
        let rules = match doc.get("rules") {
            Some(Value::Sequence(rules)) => rules.clone(),
            _ => Vec::new(),
        };
        RulesFile {
            rule_providers,
            rules,
        }
    }

    /// Loads an override fragment. A bare name gets a `.yaml` extension.
    pub fn override_config(&self, filename: &str) -> Mapping {
        let clean = filename.trim();
        if clean.is_empty() {
            return Mapping::new();
        }

        let lower = clean.to_lowercase();
        if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            self.load_yaml(clean)
        } else {
            self.load_yaml(&format!("{clean}.yaml"))
        }
    }

    fn load_yaml(&self, filename: &str) -> Mapping {
        let Some(path) = self.resolve(filename) else {
            return Mapping::new();
        };
        if !path.exists() {
            tracing::warn!(path = %path.display(), "configuration file not found");
            return Mapping::new();
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "error reading configuration file");
                return Mapping::new();
            }
        };

        match serde_yaml_ng::from_str::<Value>(&content) {
            Ok(Value::Mapping(doc)) => doc,
            Ok(Value::Null) => Mapping::new(),
            Ok(_) => {
                tracing::error!(path = %path.display(), "configuration file is not a mapping");
                Mapping::new()
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "error parsing configuration file");
                Mapping::new()
            }
        }
    }

    /// Joins `relative` onto the rules directory, refusing paths that
    /// would leave it.
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            tracing::warn!(
                path = %relative.display(),
                "refusing path outside the rules directory"
            );
            return None;
        }
        Some(self.rules_dir.join(relative))
    }
}

impl ProviderSource for RulesStore {
    fn provider_lines(&self, path: &str) -> Vec<String> {
        let clean = path.trim();
        let clean = clean.strip_prefix("./").unwrap_or(clean);

        let Some(path) = self.resolve(clean) else {
            return Vec::new();
        };
        if !path.exists() {
            tracing::warn!(path = %path.display(), "rule provider file not found");
            return Vec::new();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_owned)
                .collect(),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "error loading rule provider file");
                Vec::new()
            }
        }
    }
}
