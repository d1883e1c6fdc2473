//! Work log sync CLI library.
//!
//! This crate provides the CLI interface for syncing Clockify time entries
//! into BambooHR.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
