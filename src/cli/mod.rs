//! CLI command handlers
//!
//! Each subcommand is implemented in its own module and exposes an async
//! `handle` entry point.

pub mod check_config;
pub mod classify;
pub mod helpers;
pub mod run;
pub mod summarize;
