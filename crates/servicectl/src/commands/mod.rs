//! Subcommand implementations

pub mod key;
pub mod plan;
pub mod status;
pub mod upgrades;
pub mod validate;
