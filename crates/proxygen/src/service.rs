//! Profile generation and refresh, independent of the HTTP layer.

use proxygen_core::schema::proxy_name;
use proxygen_core::subscription::{is_traffic_node, traffic_node};
use proxygen_core::{Error, Profile, Proxy, SubscriptionInfo, clash};
use serde_yaml_ng::{Mapping, Value};

use crate::error::ApiError;
use crate::state::AppState;

const INVALID_FORMAT: &str =
    "Invalid subscription format. URL must return a Clash YAML configuration.";
const CONVERTER_HINT: &str = " Detected non-YAML content (possibly Base64). Please use a conversion service (Subconverter) to get a '&flag=clash' URL.";

/// A generated config plus the usage recovered from its proxies.
#[derive(Debug, Clone)]
pub struct Generated {
    pub config: Mapping,
    pub subscription: SubscriptionInfo,
}

/// Merges the named profiles, in order, into one Clash config.
///
/// The first missing profile aborts generation with 404.
pub fn generate_profiles(
    state: &AppState,
    names: &[String],
    override_name: Option<&str>,
) -> Result<Generated, ApiError> {
    tracing::info!(profiles = ?names, override_name, "generating profiles");

    let mut proxies: Vec<Proxy> = Vec::new();
    let mut subscription = SubscriptionInfo::default();

    for name in names {
        let profile = state.profiles.load(name).map_err(|e| match e {
            Error::ProfileNotFound { .. } => {
                tracing::warn!(profile = %name, "profile not found");
                ApiError::not_found(format!("Profile '{name}' not found."))
            }
            Error::InvalidProfileName { .. } => ApiError::bad_request(e.to_string()),
            other => {
                tracing::error!(profile = %name, error = %other, "error loading profile");
                ApiError::internal(format!("Error loading profile '{name}'"))
            }
        })?;

        for proxy in &profile.proxies {
            subscription.absorb(proxy_name(proxy).unwrap_or_default());
        }
        proxies.extend(profile.proxies);
    }

    let override_data = override_name
        .filter(|name| !name.trim().is_empty())
        .map(|name| {
            let data = state.rules.override_config(name);
            if data.is_empty() {
                tracing::warn!(
                    override_name = name,
                    "override provided but content is empty or file missing"
                );
            }
            data
        });

    let config = clash::generate(
        proxies,
        &state.rules.proxy_groups(),
        &state.rules.rules(),
        override_data.as_ref(),
        &state.rules,
    )
    .map_err(|e| {
        tracing::error!(error = %e, "failed to render config");
        ApiError::internal("Error generating configuration")
    })?;

    Ok(Generated {
        config,
        subscription,
    })
}

/// Downloads a subscription and stores its proxies under `name`.
///
/// Returns the number of proxies saved.
pub async fn fetch_and_update(state: &AppState, name: &str, url: &str) -> Result<usize, ApiError> {
    tracing::info!(profile = name, url, "fetching profile");

    let fetched = state.fetcher.fetch(url).await?;
    let mut proxies = extract_proxies(&fetched.body, url)?;

    if let Some(header) = fetched.userinfo.as_deref() {
        tracing::info!(header, "found subscription info header");
        if let Some(node) = traffic_node(header) {
            proxies.retain(|p| !is_traffic_node(p));
            proxies.insert(0, node);
        }
    }

    let count = proxies.len();
    state
        .profiles
        .save(name, &Profile { proxies })
        .map_err(|e| match e {
            Error::InvalidProfileName { .. } => ApiError::bad_request(e.to_string()),
            other => {
                tracing::error!(profile = name, error = %other, "error saving profile");
                ApiError::internal(format!("Error saving profile: {other}"))
            }
        })?;

    tracing::info!(profile = name, proxies = count, "profile updated");
    Ok(count)
}

/// Pulls the proxy list out of a downloaded Clash document.
fn extract_proxies(body: &str, url: &str) -> Result<Vec<Proxy>, ApiError> {
    let document = match serde_yaml_ng::from_str::<Value>(body) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse subscription YAML");
            None
        }
    };

    let proxies = match document {
        Some(Value::Mapping(ref map)) if map.contains_key("proxies") => map["proxies"].clone(),
        other => {
            tracing::error!(url, "profile content invalid");
            let mut detail = INVALID_FORMAT.to_owned();
            if matches!(other, None | Some(Value::Null | Value::String(_))) {
                detail.push_str(CONVERTER_HINT);
            }
            return Err(ApiError::bad_request(detail));
        }
    };

    let proxies: Vec<Proxy> = match proxies {
        Value::Null => Vec::new(),
        Value::Sequence(items) => {
            let total = items.len();
            let kept: Vec<Proxy> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Mapping(proxy) => Some(proxy),
                    _ => None,
                })
                .collect();
            if kept.len() != total {
                tracing::warn!(url, dropped = total - kept.len(), "skipped non-mapping proxy entries");
            }
            kept
        }
        _ => {
            tracing::error!(url, "proxies is not a list");
            return Err(ApiError::bad_request(INVALID_FORMAT));
        }
    };

    if proxies.is_empty() {
        tracing::warn!(url, "no proxies found in remote URL");
        return Err(ApiError::not_found("No proxies found in remote URL"));
    }
    Ok(proxies)
}
