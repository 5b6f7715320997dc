//! Core types and logic for proxygen.
//!
//! This crate defines the `proxygen.toml` schema ([`ProxygenConfig`]),
//! profile and rules storage ([`ProfileStore`], [`RulesStore`]), Clash
//! config generation ([`clash::generate`]), and shared error types.

pub mod clash;
pub mod config;
pub mod error;
pub mod schema;
pub mod store;
pub mod subscription;

pub use config::{ImageConfig, ProxygenConfig};
pub use error::{Error, Result};
pub use schema::{ClashConfig, Profile, Proxy, ProxyGroup, RuleProvider, RulesFile};
pub use store::{ProfileStore, RulesStore};
pub use subscription::SubscriptionInfo;
