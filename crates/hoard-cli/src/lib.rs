//! `hoard` command-line interface.
//!
//! The binary is the composition root: [`bootstrap`] wires the caches, the
//! HTTP adapter, the work queue and the download manager, and the handlers
//! drive them for one command.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod platform;
pub mod presentation;

// Re-export primary types for convenient access
pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::{CacheCommand, Commands, ThumbsCommand};
pub use error::CliError;
pub use parser::Cli;
