//! CLI subcommand implementations.

pub mod export;
pub mod mapping;
pub mod push;
pub mod status;
pub mod util;
