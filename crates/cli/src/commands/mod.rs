//! Subcommand implementations

pub mod forecast;
pub mod stages;
