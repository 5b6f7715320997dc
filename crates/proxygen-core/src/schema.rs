use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml_ng::{Mapping, Value};

/// A single proxy node. Opaque apart from its `name`.
pub type Proxy = Mapping;

/// Targets every group and rule may reference without declaring them.
pub const BUILT_IN_TARGETS: &[&str] = &["DIRECT", "REJECT", "NO-HYDRA"];

/// Group that collects proxies no other group claimed.
pub const CATCH_ALL_GROUP: &str = "PROXY";

/// Returns the proxy's name when it is a string.
pub fn proxy_name(proxy: &Proxy) -> Option<&str> {
    proxy.get("name").and_then(|v| v.as_str())
}

/// Stored subscription: the proxies fetched from one remote URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub proxies: Vec<Proxy>,
}

/// A `proxy-groups` entry.
///
/// `filter` and `removable` only steer generation and are never emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyGroup {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, deserialize_with = "member_list")]
    pub proxies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub interval: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub tolerance: Option<u64>,
    #[serde(default, skip_serializing)]
    pub filter: Option<String>,
    #[serde(default, skip_serializing)]
    pub removable: bool,
}

/// An explicit `proxies: ~` is an error; only an absent key means empty.
fn member_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Option::<Vec<String>>::deserialize(d)?
        .ok_or_else(|| D::Error::custom("proxies must be a list"))
}

/// Accepts `300` as well as `"300"`.
fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(d)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(text)) => text.trim().parse().map(Some).map_err(D::Error::custom),
    }
}

/// A `rule-providers` entry. Only file-backed providers are expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleProvider {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
}

/// Contents of the rules file, validated entry by entry during generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RulesFile {
    pub rule_providers: Mapping,
    pub rules: Vec<Value>,
}

/// Complete Clash configuration as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClashConfig {
    pub mixed_port: u16,
    pub allow_lan: bool,
    pub mode: String,
    pub log_level: String,
    pub external_controller: String,
    pub proxies: Vec<Proxy>,
    pub proxy_groups: Vec<ProxyGroup>,
    pub rules: Vec<String>,
}

impl ClashConfig {
    pub fn new(proxies: Vec<Proxy>, proxy_groups: Vec<ProxyGroup>, rules: Vec<String>) -> Self {
        Self {
            mixed_port: 7890,
            allow_lan: false,
            mode: "Rule".to_owned(),
            log_level: "info".to_owned(),
            external_controller: ":9090".to_owned(),
            proxies,
            proxy_groups,
            rules,
        }
    }
}
