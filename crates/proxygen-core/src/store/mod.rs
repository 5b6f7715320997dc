//! Filesystem-backed profile and rules storage.

mod profiles;
mod rules;

pub use profiles::ProfileStore;
pub use rules::RulesStore;
