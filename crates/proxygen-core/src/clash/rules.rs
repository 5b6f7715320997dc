use std::collections::{HashMap, HashSet};

use crate::clash::ProviderSource;
use crate::schema::{RuleProvider, RulesFile};

const RULE_SET: &str = "RULE-SET";
const MATCH: &str = "MATCH";
const NO_RESOLVE: &str = "no-resolve";

/// Keeps rules whose target resolves and inlines `RULE-SET` providers.
pub(crate) fn process_rules<P: ProviderSource + ?Sized>(
    rules: &RulesFile,
    valid_targets: &HashSet<&str>,
    providers: &P,
) -> Vec<String> {
    let validated = validate_providers(rules);
    let mut out = Vec::new();

    for rule in &rules.rules {
        let Some(rule) = rule.as_str() else {
            continue;
        };
        if rule.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = rule.split(',').map(str::trim).collect();

        if parts[0] == RULE_SET {
            if parts.len() < 3 {
                tracing::warn!(rule, "invalid RULE-SET format");
                continue;
            }
            let (provider_name, target) = (parts[1], parts[2]);

            if !valid_targets.contains(target) {
                tracing::warn!(rule_target = target, "RULE-SET target invalid, skipping");
                continue;
            }

            let Some(provider) = validated.get(provider_name) else {
                tracing::warn!(provider = provider_name, "provider not found or invalid");
                continue;
            };

            out.extend(expand_rule_set(provider, target, providers));
            continue;
        }

        let target = if parts[0] == MATCH {
            parts.get(1)
        } else {
            parts.get(2)
        };

        match target.filter(|t| !t.is_empty()) {
            Some(target) if !valid_targets.contains(target) => {
                tracing::warn!(rule_target = *target, rule, "rule target invalid or missing, skipping rule");
            }
            _ => out.push(rule.to_owned()),
        }
    }

    out
}

fn validate_providers(rules: &RulesFile) -> HashMap<String, RuleProvider> {
    let mut validated = HashMap::new();
    for (name, data) in &rules.rule_providers {
        let Some(name) = name.as_str() else {
            tracing::warn!(?name, "rule provider name is not a string");
            continue;
        };
        match serde_yaml_ng::from_value::<RuleProvider>(data.clone()) {
            Ok(provider) => {
                validated.insert(name.to_owned(), provider);
            }
            Err(e) => tracing::warn!(provider = name, error = %e, "invalid rule provider"),
        }
    }
    validated
}

/// Turns each provider line into `<line>,<target>`, keeping a trailing
/// `no-resolve` option after the target.
fn expand_rule_set<P: ProviderSource + ?Sized>(
    provider: &RuleProvider,
    target: &str,
    providers: &P,
) -> Vec<String> {
    if provider.path.is_empty() {
        return Vec::new();
    }

    providers
        .provider_lines(&provider.path)
        .iter()
        .map(|line| {
            let mut parts: Vec<&str> = line.split(',').map(str::trim).collect();
            let suffix = match parts.last() {
                Some(last) if last.eq_ignore_ascii_case(NO_RESOLVE) => {
                    parts.pop();
                    ",no-resolve"
                }
                _ => "",
            };
            format!("{},{target}{suffix}", parts.join(","))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml_ng::Value;

    fn rules_file(yaml: &str) -> RulesFile {
        let doc: serde_yaml_ng::Mapping = serde_yaml_ng::from_str(yaml).unwrap();
        RulesFile {
            rule_providers: doc
                .get("rule-providers")
                .and_then(Value::as_mapping)
                .cloned()
                .unwrap_or_default(),
            rules: doc
                .get("rules")
                .and_then(Value::as_sequence)
                .cloned()
                .unwrap_or_default(),
        }
    }

    fn no_providers() -> HashMap<String, Vec<String>> {
        HashMap::new()
    }

    fn targets() -> HashSet<&'static str> {
        ["PROXY", "DIRECT", "REJECT", "node-a"].into_iter().collect()
    }

    #[test]
    fn keeps_rules_with_valid_targets_verbatim() {
        let rules = rules_file(
            "rules:\n\
             - DOMAIN-SUFFIX,google.com,PROXY\n\
             - DOMAIN-SUFFIX,example.com,Missing\n\
             - MATCH,DIRECT\n",
        );
        let out = process_rules(&rules, &targets(), &no_providers());

        assert_eq!(out, ["DOMAIN-SUFFIX,google.com,PROXY", "MATCH,DIRECT"]);
    }

    #[test]
    fn rules_without_target_pass_through() {
        let rules = rules_file("rules:\n- 'IP-CIDR,10.0.0.0/8'\n- MATCH\n- ''\n- 42\n");
        let out = process_rules(&rules, &targets(), &no_providers());

        assert_eq!(out, ["IP-CIDR,10.0.0.0/8", "MATCH"]);
    }

    #[test]
    fn rule_set_expands_provider_lines() {
        let rules = rules_file(
            "rule-providers:\n\
             \x20 ads: {type: file, path: ./providers/ads.list}\n\
             \x20 broken: {type: file}\n\
             rules:\n\
             - RULE-SET,ads,REJECT\n\
             - RULE-SET,broken,REJECT\n\
             - RULE-SET,ads,Nowhere\n\
             - RULE-SET,ads\n",
        );
        let providers: HashMap<String, Vec<String>> = HashMap::from([(
            "./providers/ads.list".to_owned(),
            vec![
                "DOMAIN-SUFFIX,ads.example".to_owned(),
                "IP-CIDR, 1.2.3.0/24 , NO-RESOLVE".to_owned(),
            ],
        )]);
        let out = process_rules(&rules, &targets(), &providers);

        assert_eq!(
            out,
            [
                "DOMAIN-SUFFIX,ads.example,REJECT",
                "IP-CIDR,1.2.3.0/24,REJECT,no-resolve"
            ]
        );
    }
}
