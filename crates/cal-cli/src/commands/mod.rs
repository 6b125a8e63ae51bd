//! CLI subcommand implementations.

pub mod config;
pub mod lookup;
pub mod search;
pub mod session;
