//! Command handlers.
//!
//! Each handler takes the bootstrapped [`CliContext`](crate::CliContext) and
//! the parsed arguments of one subcommand.

pub mod cache;
pub mod download;
pub mod thumbs;
