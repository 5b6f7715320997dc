use std::collections::HashSet;

use regex::RegexBuilder;
use serde_yaml_ng::Value;

use crate::schema::{BUILT_IN_TARGETS, CATCH_ALL_GROUP, ProxyGroup};

/// Validates group templates, expands filters, routes unclassified proxies
/// into the catch-all group, then prunes dangling references.
pub(crate) fn process_groups(raw_groups: &[Value], ordered_names: &[String]) -> Vec<ProxyGroup> {
    let name_set: HashSet<&str> = ordered_names.iter().map(String::as_str).collect();
    let mut active: Vec<ProxyGroup> = Vec::new();
    let mut used: HashSet<&str> = HashSet::new();

    for raw in raw_groups {
        let mut group: ProxyGroup = match serde_yaml_ng::from_value(raw.clone()) {
            Ok(group) => group,
            Err(e) => {
                tracing::warn!(error = %e, "invalid proxy group configuration");
                continue;
            }
        };

        if let Some(filter) = group.filter.take().filter(|f| !f.is_empty()) {
            match RegexBuilder::new(&filter).case_insensitive(true).build() {
                Ok(pattern) => {
                    for name in ordered_names.iter().filter(|n| pattern.is_match(n)) {
                        group.proxies.push(name.clone());
                        used.insert(name);
                    }
                }
                Err(e) => {
                    tracing::warn!(group = %group.name, filter = %filter, error = %e, "invalid regex in group filter");
                }
            }
        }

        for proxy in &group.proxies {
            if let Some(name) = name_set.get(proxy.as_str()) {
                used.insert(name);
            }
        }

        dedup_in_order(&mut group.proxies);

        match active.iter_mut().find(|g| g.name == group.name) {
            Some(slot) => *slot = group,
            None => active.push(group),
        }
    }

    let unclassified: Vec<String> = ordered_names
        .iter()
        .filter(|n| !used.contains(n.as_str()))
        .cloned()
        .collect();

    if !unclassified.is_empty() {
        match active.iter_mut().find(|g| g.name == CATCH_ALL_GROUP) {
            Some(catch_all) => {
                tracing::info!(
                    count = unclassified.len(),
                    "adding unclassified proxies to {CATCH_ALL_GROUP} group"
                );
                catch_all.proxies.extend(unclassified);
                dedup_in_order(&mut catch_all.proxies);
            }
            None => {
                tracing::warn!(
                    count = unclassified.len(),
                    "found unclassified proxies but '{CATCH_ALL_GROUP}' group does not exist"
                );
            }
        }
    }

    let mut base_targets: HashSet<String> = name_set.iter().map(|n| (*n).to_owned()).collect();
    base_targets.extend(BUILT_IN_TARGETS.iter().map(|t| (*t).to_owned()));
    prune_groups(&mut active, &base_targets);

    active
}

/// Removes invalid targets until a fixed point is reached.
///
/// Removing one group can invalidate references held by others, so each
/// pass recomputes the target set from the groups still alive.
fn prune_groups(active: &mut Vec<ProxyGroup>, base_targets: &HashSet<String>) {
    loop {
        let valid: HashSet<String> = base_targets
            .iter()
            .cloned()
            .chain(active.iter().map(|g| g.name.clone()))
            .collect();

        let mut doomed: Vec<String> = Vec::new();
        for group in active.iter_mut() {
            if group.removable {
                if let Some(missing) = group.proxies.iter().find(|p| !valid.contains(*p)) {
                    tracing::warn!(
                        group = %group.name,
                        missing = %missing,
                        "removable group references missing target, removing group"
                    );
                    doomed.push(group.name.clone());
                    continue;
                }
            } else {
                group.proxies.retain(|p| valid.contains(p));
            }

            if group.proxies.is_empty() {
                tracing::warn!(group = %group.name, "group is empty, removing group");
                doomed.push(group.name.clone());
            }
        }

        if doomed.is_empty() {
            break;
        }
        active.retain(|g| !doomed.contains(&g.name));
    }
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}
