//! Subscription usage metadata.
//!
//! Providers report usage in a `subscription-userinfo` response header.
//! Stored profiles only keep proxies, so the header is folded into the name
//! of a placeholder node on fetch and recovered from proxy names on serve.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::Serialize;
use serde_yaml_ng::Value;

use crate::schema::{Proxy, proxy_name};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

static TRAFFIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:Traffic|流量).*?([0-9]+(?:\.[0-9]+)?)\s*(GB|G|MB|M).*?([0-9]+(?:\.[0-9]+)?)\s*(GB|G|MB|M)",
    )
    .expect("traffic pattern is valid")
});

static EXPIRE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Expire|到期|过期).*?([0-9]{4}-[0-9]{2}-[0-9]{2})")
        .expect("expire pattern is valid")
});

/// Usage figures recovered from proxy names, in bytes and Unix seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub upload: Option<u64>,
    pub download: Option<u64>,
    pub total: Option<u64>,
    pub expire: Option<i64>,
}

impl SubscriptionInfo {
    /// Collects usage from every proxy name; later matches win.
    pub fn from_proxies<'a>(proxies: impl IntoIterator<Item = &'a Proxy>) -> Self {
        let mut info = Self::default();
        for proxy in proxies {
            info.absorb(proxy_name(proxy).unwrap_or_default());
        }
        info
    }

    /// Updates the figures from one proxy name such as
    /// `Traffic: 74.95 GB / 200 GB | Expire: 2026-01-04`.
    pub fn absorb(&mut self, name: &str) {
        if let Some(caps) = TRAFFIC.captures(name) {
            self.upload = Some(0);
            self.download = Some(to_bytes(&caps[1], &caps[2]));
            self.total = Some(to_bytes(&caps[3], &caps[4]));
        }

        if let Some(caps) = EXPIRE.captures(name) {
            match NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d") {
                Ok(date) => {
                    if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                        self.expire = Some(midnight.and_utc().timestamp());
                    }
                }
                Err(e) => {
                    tracing::warn!(proxy = name, error = %e, "invalid expire date in proxy name");
                }
            }
        }
    }

    /// Renders the `subscription-userinfo` header, once both traffic and
    /// expiry are known.
    pub fn header_value(&self) -> Option<String> {
        let upload = self.upload?;
        let expire = self.expire?;
        Some(format!(
            "upload={upload}; download={}; total={}; expire={expire}",
            self.download.unwrap_or_default(),
            self.total.unwrap_or_default(),
        ))
    }
}

fn to_bytes(value: &str, unit: &str) -> u64 {
    let multiplier = if unit.to_uppercase().contains('G') {
        GIB
    } else {
        MIB
    };
    (value.parse::<f64>().unwrap_or_default() * multiplier) as u64
}

/// Parsed `subscription-userinfo` header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Userinfo {
    pub upload: i64,
    pub download: i64,
    pub total: i64,
    pub expire: i64,
}

impl Userinfo {
    /// Parses `upload=1; download=2; total=3; expire=4`.
    ///
    /// Unknown keys are ignored and absent ones read as zero. Any value that
    /// is not an integer rejects the whole header.
    pub fn parse(header: &str) -> Option<Self> {
        let mut info = Self::default();
        for part in header.split(';') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            let value: i64 = match value.trim().parse() {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(header, error = %e, "failed to parse subscription header");
                    return None;
                }
            };
            match key.trim() {
                "upload" => info.upload = value,
                "download" => info.download = value,
                "total" => info.total = value,
                "expire" => info.expire = value,
                _ => {}
            }
        }
        Some(info)
    }

    /// Human-readable label, e.g. `Traffic: 1.50 GB / 100.00 GB | Expire: 2026-01-04`.
    pub fn label(&self) -> Option<String> {
        let used_gb = (self.upload as f64 + self.download as f64) / GIB;
        let total_gb = self.total as f64 / GIB;
        let mut label = format!("Traffic: {used_gb:.2} GB / {total_gb:.2} GB");

        if self.expire != 0 {
            let Some(expire) = DateTime::from_timestamp(self.expire, 0) else {
                tracing::warn!(expire = self.expire, "subscription expiry out of range");
                return None;
            };
            label.push_str(&format!(" | Expire: {}", expire.format("%Y-%m-%d")));
        }
        Some(label)
    }
}

#[derive(Serialize)]
struct PlaceholderNode<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    server: &'static str,
    port: u16,
    cipher: &'static str,
    password: &'static str,
}

/// Builds a non-functional Shadowsocks node whose name carries the usage
/// reported in `header`.
pub fn traffic_node(header: &str) -> Option<Proxy> {
    let label = Userinfo::parse(header)?.label()?;
    let node = PlaceholderNode {
        name: &label,
        kind: "ss",
        server: "127.0.0.1",
        port: 1234,
        cipher: "aes-128-gcm",
        password: "dummy",
    };
    match serde_yaml_ng::to_value(node) {
        Ok(Value::Mapping(node)) => Some(node),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, "failed to build traffic node");
            None
        }
    }
}

/// Whether the proxy is a usage placeholder rather than a real node.
pub fn is_traffic_node(proxy: &Proxy) -> bool {
    let name = proxy_name(proxy).unwrap_or_default();
    ["Traffic", "流量", "Expire", "到期"]
        .iter()
        .any(|marker| name.contains(marker))
}
