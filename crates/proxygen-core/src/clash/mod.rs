//! Clash configuration generation.
//!
//! ```text
//! proxies ──┐
//!           ├─ groups: validate → filter expand → catch-all → prune
//! groups ───┘                 │
//!                             └─ targets ─┐
//! rules ──────────────────────────────────┴─ rules: validate → RULE-SET expand
//!                                                    │
//!                                      ClashConfig ──┴─ override merge
//! ```

mod groups;
mod rules;

use std::collections::{HashMap, HashSet};

use serde_yaml_ng::{Mapping, Value};

use crate::schema::{BUILT_IN_TARGETS, ClashConfig, Proxy, RulesFile, proxy_name};
use crate::{Error, Result};

/// Supplies the lines of a file-backed rule provider.
pub trait ProviderSource {
    /// Returns the rule lines stored at `path`, without comments or blanks.
    fn provider_lines(&self, path: &str) -> Vec<String>;
}

impl ProviderSource for HashMap<String, Vec<String>> {
    fn provider_lines(&self, path: &str) -> Vec<String> {
        self.get(path).cloned().unwrap_or_default()
    }
}

/// Builds the full Clash configuration for `proxies`.
///
/// `override_data` is merged shallowly at the top level: existing keys keep
/// their position, new keys are appended.
pub fn generate<P: ProviderSource + ?Sized>(
    proxies: Vec<Proxy>,
    raw_groups: &[Value],
    rules_file: &RulesFile,
    override_data: Option<&Mapping>,
    providers: &P,
) -> Result<Mapping> {
    let ordered_names: Vec<String> = proxies
        .iter()
        .filter_map(proxy_name)
        .map(str::to_owned)
        .collect();

    let proxy_groups = groups::process_groups(raw_groups, &ordered_names);

    let mut valid_targets: HashSet<&str> = ordered_names.iter().map(String::as_str).collect();
    valid_targets.extend(proxy_groups.iter().map(|g| g.name.as_str()));
    valid_targets.extend(BUILT_IN_TARGETS.iter().copied());
    let rules = rules::process_rules(rules_file, &valid_targets, providers);

    tracing::debug!(
        proxies = proxies.len(),
        groups = proxy_groups.len(),
        rules = rules.len(),
        "generated Clash config"
    );

    let config = ClashConfig::new(proxies, proxy_groups, rules);
    let mut rendered = match serde_yaml_ng::to_value(&config) {
        Ok(Value::Mapping(mapping)) => mapping,
        Ok(_) => Mapping::new(),
        Err(e) => return Err(Error::Render { source: e }),
    };

    if let Some(override_data) = override_data.filter(|o| !o.is_empty()) {
        let keys: Vec<&str> = override_data.keys().filter_map(Value::as_str).collect();
        tracing::info!(?keys, "applying override configuration");
        for (key, value) in override_data {
            rendered.insert(key.clone(), value.clone());
        }
    }

    Ok(rendered)
}
